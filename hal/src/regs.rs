//! ATmega328P data-space register addresses and bit positions.

/// Size of the register window covered by a [RegisterFile](crate::RegisterFile).
pub const REGISTER_SPACE: usize = 0x100;

// Digital I/O ports
pub const PINB: u8 = 0x23;
pub const DDRB: u8 = 0x24;
pub const PORTB: u8 = 0x25;
pub const PINC: u8 = 0x26;
pub const DDRC: u8 = 0x27;
pub const PORTC: u8 = 0x28;
pub const PIND: u8 = 0x29;
pub const DDRD: u8 = 0x2A;
pub const PORTD: u8 = 0x2B;

// ADC
pub const ADCL: u8 = 0x78;
pub const ADCH: u8 = 0x79;
pub const ADCSRA: u8 = 0x7A;
pub const ADMUX: u8 = 0x7C;

// ADMUX bits
pub const REFS0: u8 = 6;
pub const MUX0: u8 = 0;

// ADCSRA bits
pub const ADEN: u8 = 7;
pub const ADSC: u8 = 6;
pub const ADPS0: u8 = 0;

// USART0
pub const UCSR0A: u8 = 0xC0;
pub const UCSR0B: u8 = 0xC1;
pub const UCSR0C: u8 = 0xC2;
pub const UBRR0L: u8 = 0xC4;
pub const UBRR0H: u8 = 0xC5;
pub const UDR0: u8 = 0xC6;

// UCSR0A bits
pub const RXC0: u8 = 7;
pub const UDRE0: u8 = 5;

// UCSR0B bits
pub const RXEN0: u8 = 4;
pub const TXEN0: u8 = 3;
pub const UCSZ02: u8 = 2;

// UCSR0C bits
pub const UMSEL00: u8 = 6;
pub const UPM00: u8 = 4;
pub const USBS0: u8 = 3;
pub const UCSZ00: u8 = 1;
pub const UCPOL0: u8 = 0;
