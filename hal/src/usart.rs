//! Polled USART0.
//!
//! Frame formats are described by [FrameFormat]; the usual `SERIAL_8N1` style presets are
//! provided as constants.

use crate::delay::CPU_FREQUENCY_HZ;
use crate::regs::*;
use crate::{HalError, HalResult, RegisterFile};
use log::{debug, trace};
use std::fmt::{Debug, Formatter};
use std::hint::spin_loop;

/// Longest line [Usart::read_line] will receive.
pub const MAX_LINE: usize = 255;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UsartMode {
    Asynchronous,
    Synchronous,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

/// Clock edge used for sampling in synchronous mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClockPolarity {
    RisingEdge,
    FallingEdge,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameFormat {
    pub mode: UsartMode,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub data_bits: DataBits,
    pub clock_polarity: ClockPolarity,
}

impl FrameFormat {
    pub const fn asynchronous(data_bits: DataBits, parity: Parity, stop_bits: StopBits) -> Self {
        FrameFormat {
            mode: UsartMode::Asynchronous,
            parity,
            stop_bits,
            data_bits,
            clock_polarity: ClockPolarity::FallingEdge,
        }
    }

    /// Looks up a preset by name, with or without the `SERIAL_` prefix (`"8N1"`, `"SERIAL_7E2"`).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let short = name.strip_prefix("SERIAL_").unwrap_or(name);
        PRESETS
            .iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(short))
            .map(|(_, format)| *format)
    }

    /// Value for `UCSR0C`.
    pub const fn control_c(&self) -> u8 {
        let mode = match self.mode {
            UsartMode::Asynchronous => 0,
            UsartMode::Synchronous => 1 << UMSEL00,
        };
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even => 2 << UPM00,
            Parity::Odd => 3 << UPM00,
        };
        let stop = match self.stop_bits {
            StopBits::One => 0,
            StopBits::Two => 1 << USBS0,
        };
        let polarity = match self.clock_polarity {
            ClockPolarity::RisingEdge => 0,
            ClockPolarity::FallingEdge => 1 << UCPOL0,
        };
        mode | parity | stop | polarity | self.character_size() << UCSZ00
    }

    /// The UCSZ0[1:0] character size code. UCSZ02 stays clear, there's no nine-bit format.
    const fn character_size(&self) -> u8 {
        match self.data_bits {
            DataBits::Five => 0,
            DataBits::Six => 1,
            DataBits::Seven => 2,
            DataBits::Eight => 3,
        }
    }
}

macro_rules! frame_presets {
    ($($name:ident, $short:literal => $data:ident, $parity:ident, $stop:ident;)*) => {
        $(
            pub const $name: FrameFormat =
                FrameFormat::asynchronous(DataBits::$data, Parity::$parity, StopBits::$stop);
        )*

        const PRESETS: &[(&str, FrameFormat)] = &[$(($short, $name)),*];
    };
}

frame_presets! {
    SERIAL_5N1, "5N1" => Five, None, One;
    SERIAL_5N2, "5N2" => Five, None, Two;
    SERIAL_5E1, "5E1" => Five, Even, One;
    SERIAL_5E2, "5E2" => Five, Even, Two;
    SERIAL_5O1, "5O1" => Five, Odd, One;
    SERIAL_5O2, "5O2" => Five, Odd, Two;
    SERIAL_6N1, "6N1" => Six, None, One;
    SERIAL_6N2, "6N2" => Six, None, Two;
    SERIAL_6E1, "6E1" => Six, Even, One;
    SERIAL_6E2, "6E2" => Six, Even, Two;
    SERIAL_6O1, "6O1" => Six, Odd, One;
    SERIAL_6O2, "6O2" => Six, Odd, Two;
    SERIAL_7N1, "7N1" => Seven, None, One;
    SERIAL_7N2, "7N2" => Seven, None, Two;
    SERIAL_7E1, "7E1" => Seven, Even, One;
    SERIAL_7E2, "7E2" => Seven, Even, Two;
    SERIAL_7O1, "7O1" => Seven, Odd, One;
    SERIAL_7O2, "7O2" => Seven, Odd, Two;
    SERIAL_8N1, "8N1" => Eight, None, One;
    SERIAL_8N2, "8N2" => Eight, None, Two;
    SERIAL_8E1, "8E1" => Eight, Even, One;
    SERIAL_8E2, "8E2" => Eight, Even, Two;
    SERIAL_8O1, "8O1" => Eight, Odd, One;
    SERIAL_8O2, "8O2" => Eight, Odd, Two;
}

/// Computes `UBRR0` for normal-speed asynchronous mode.
///
/// # Errors
/// - `HalError::InvalidArgument` if the baud rate is zero, too fast for the clock, or so slow the
///   divisor doesn't fit the 12-bit register.
pub fn baud_divisor(baud: u32) -> HalResult<u16> {
    if baud == 0 {
        return Err(HalError::InvalidArgument);
    }
    let divisor = CPU_FREQUENCY_HZ as u64 / (16 * baud as u64);
    if divisor == 0 || divisor - 1 > 0x0FFF {
        return Err(HalError::InvalidArgument);
    }
    Ok((divisor - 1) as u16)
}

pub struct Usart<'a, R: RegisterFile> {
    registers: &'a R,
}

impl<'a, R: RegisterFile> Usart<'a, R> {
    pub fn new(registers: &'a R) -> Self {
        Usart { registers }
    }

    /// Sets the baud rate and frame format and enables both receiver and transmitter.
    pub fn init(&self, baud: u32, format: FrameFormat) -> HalResult<()> {
        let divisor = baud_divisor(baud)?;
        debug!("USART0 at {} baud ({:?}), UBRR0 = {}", baud, format, divisor);

        self.registers.write(UBRR0H, (divisor >> 8) as u8);
        self.registers.write(UBRR0L, divisor as u8);
        self.registers.write(UCSR0B, (1 << RXEN0) | (1 << TXEN0));
        self.registers.write(UCSR0C, format.control_c());
        Ok(())
    }

    /// Waits for the transmit buffer to empty, then queues `byte`.
    pub fn write_byte(&self, byte: u8) {
        while self.registers.read(UCSR0A) & (1 << UDRE0) == 0 {
            spin_loop();
        }
        self.registers.write(UDR0, byte);
    }

    pub fn write_bytes(&self, bytes: &[u8]) {
        trace!("USART0 TX {} bytes", bytes.len());
        for &byte in bytes {
            self.write_byte(byte);
        }
    }

    /// Waits for a received byte.
    pub fn read_byte(&self) -> u8 {
        while self.registers.read(UCSR0A) & (1 << RXC0) == 0 {
            spin_loop();
        }
        self.registers.read(UDR0)
    }

    /// Receives into `buf` until a line feed or until `buf` (at most [MAX_LINE] bytes) is full.
    ///
    /// The line feed is stored but not counted, so the return value is the length of the line
    /// without its terminator.
    pub fn read_line(&self, buf: &mut [u8]) -> usize {
        let limit = buf.len().min(MAX_LINE);
        let mut count = 0;
        while count < limit {
            let byte = self.read_byte();
            buf[count] = byte;
            if byte == b'\n' {
                break;
            }
            count += 1;
        }
        trace!("USART0 RX line of {} bytes", count);
        count
    }
}

impl<R: RegisterFile> std::fmt::Write for Usart<'_, R> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

impl<R: RegisterFile> Debug for Usart<'_, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Usart0({:?})", self.registers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRegisters;
    use std::collections::VecDeque;
    use std::fmt::Write;

    fn ready_sim() -> SimRegisters {
        let sim = SimRegisters::new();
        sim.on_read(UCSR0A, |value| value | (1 << UDRE0) | (1 << RXC0));
        sim
    }

    #[test]
    fn divisor_for_common_rates() {
        assert_eq!(baud_divisor(9600), Ok(103));
        assert_eq!(baud_divisor(57600), Ok(16));
        assert_eq!(baud_divisor(0), Err(HalError::InvalidArgument));
        assert_eq!(baud_divisor(2_000_000), Err(HalError::InvalidArgument));
        assert_eq!(baud_divisor(100), Err(HalError::InvalidArgument));
    }

    #[test]
    fn presets_match_register_layout() {
        // UCPOL0 set, UCSZ01:0 = 11
        assert_eq!(SERIAL_8N1.control_c(), 0b0000_0111);
        // UPM01:0 = 11, USBS0, UCSZ = 10
        assert_eq!(SERIAL_7O2.control_c(), 0b0011_1101);
        assert_eq!(FrameFormat::from_name("8e1"), Some(SERIAL_8E1));
        assert_eq!(FrameFormat::from_name("SERIAL_5N2"), Some(SERIAL_5N2));
        assert_eq!(FrameFormat::from_name("9N1"), None);
    }

    #[test]
    fn init_programs_baud_and_format() {
        let sim = SimRegisters::new();
        let usart = Usart::new(&sim);
        usart.init(9600, SERIAL_8N1).unwrap();

        assert_eq!(sim.peek(UBRR0H), 0);
        assert_eq!(sim.peek(UBRR0L), 103);
        assert_eq!(sim.peek(UCSR0B), (1 << RXEN0) | (1 << TXEN0));
        assert_eq!(sim.peek(UCSR0C), SERIAL_8N1.control_c());
    }

    #[test]
    fn init_only_enables_receiver_and_transmitter() {
        for (name, format) in PRESETS {
            let sim = SimRegisters::new();
            sim.poke(UCSR0B, 0xFF);
            Usart::new(&sim).init(9600, *format).unwrap();
            assert_eq!(sim.peek(UCSR0B), (1 << RXEN0) | (1 << TXEN0), "{}", name);
            assert_eq!(sim.peek(UCSR0B) & (1 << UCSZ02), 0, "{}", name);
        }
    }

    #[test]
    fn write_waits_for_empty_buffer() {
        let sim = SimRegisters::new();
        let mut polls = 0;
        sim.on_read(UCSR0A, move |value| {
            polls += 1;
            if polls % 3 == 0 {
                value | (1 << UDRE0)
            } else {
                value & !(1 << UDRE0)
            }
        });
        let mut usart = Usart::new(&sim);
        write!(usart, "ok").unwrap();
        assert_eq!(sim.writes_to(UDR0), b"ok".to_vec());
    }

    #[test]
    fn read_line_stops_at_line_feed() {
        let sim = ready_sim();
        let mut rx: VecDeque<u8> = b"hello\nworld".iter().copied().collect();
        sim.on_read(UDR0, move |_| rx.pop_front().unwrap_or(0));
        let usart = Usart::new(&sim);

        let mut buf = [0u8; 32];
        let len = usart.read_line(&mut buf);
        assert_eq!(len, 5);
        assert_eq!(&buf[..6], b"hello\n");
    }

    #[test]
    fn read_line_is_bounded_by_buffer() {
        let sim = ready_sim();
        sim.on_read(UDR0, |_| b'x');
        let usart = Usart::new(&sim);

        let mut buf = [0u8; 4];
        assert_eq!(usart.read_line(&mut buf), 4);
        assert_eq!(&buf, b"xxxx");
    }
}
