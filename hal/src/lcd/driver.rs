use crate::lcd::{is_long_command, CursorDirection, HD44780Driver, Row};
use crate::port::{PinId, Port, PortExt};
use crate::{HalError, HalResult, RegisterFile};
use embedded_hal::delay::DelayNs;
use log::{debug, trace, warn};
use std::fmt::{Debug, Formatter};

/// Wait before raising Enable, letting RS and the data lines settle.
const BUS_SETTLE_US: u32 = 40;
/// Enable high time. The controller latches on the falling edge.
const ENABLE_PULSE_US: u32 = 40;
/// Wait after switching RS.
const MODE_SETTLE_US: u32 = 1;
/// Execution time of ordinary instructions and data writes.
const EXECUTION_US: u32 = 40;
/// Execution time of clear display and return home.
const LONG_EXECUTION_US: u32 = 1600;
/// Wait after power-on before talking to the controller (datasheet minimum is 15 ms).
const POWER_ON_MS: u32 = 100;
const RESET_SECOND_PULSE_MS: u32 = 5;
const RESET_THIRD_PULSE_US: u32 = 100;
const READY_MS: u32 = 50;

/// Wiring of one display: RS, Enable and D4..D7.
///
/// The four data lines share one port so a nibble goes out in a single masked write of that
/// port. Building the pins touches no hardware.
#[derive(Debug, Eq, PartialEq)]
pub struct LcdPins {
    rs: PinId,
    enable: PinId,
    data_port: Port,
    data_bits: [u8; 4],
}

impl LcdPins {
    /// # Parameters
    ///
    /// - `rs`: Register select output.
    /// - `enable`: Enable output.
    /// - `data_port`: Port carrying the data bus.
    /// - `data_bits`: Bit offsets of D4, D5, D6 and D7 within `data_port`.
    ///
    /// # Errors
    /// - `HalError::InvalidWiring` if a data bit is out of range or used twice, if RS and Enable
    ///   are the same pin, or if either of them sits on a data line.
    pub fn new(rs: PinId, enable: PinId, data_port: Port, data_bits: [u8; 4]) -> HalResult<Self> {
        if data_bits.iter().any(|&bit| bit > 7) {
            return Err(HalError::InvalidWiring("data bit offset out of range"));
        }
        let data_mask = data_bits.iter().fold(0u8, |mask, &bit| mask | 1 << bit);
        if data_mask.count_ones() != 4 {
            return Err(HalError::InvalidWiring("data bits must be distinct"));
        }
        if rs == enable {
            return Err(HalError::InvalidWiring("RS and Enable share a pin"));
        }
        if [rs, enable]
            .iter()
            .any(|pin| pin.port() == data_port && pin.mask() & data_mask != 0)
        {
            return Err(HalError::InvalidWiring("control line overlaps the data bus"));
        }

        Ok(LcdPins {
            rs,
            enable,
            data_port,
            data_bits,
        })
    }

    pub fn rs(&self) -> PinId {
        self.rs
    }

    pub fn enable(&self) -> PinId {
        self.enable
    }

    pub fn data_port(&self) -> Port {
        self.data_port
    }

    pub fn data_bits(&self) -> [u8; 4] {
        self.data_bits
    }

    /// Bits of the data port that belong to the bus.
    pub fn data_mask(&self) -> u8 {
        self.nibble_bits(0b1111)
    }

    /// Spreads the low four bits of `nibble` onto the data port bits (bit 0 goes to D4).
    pub fn nibble_bits(&self, nibble: u8) -> u8 {
        self.data_bits
            .iter()
            .enumerate()
            .filter(|&(i, _)| nibble & (1 << i) != 0)
            .fold(0, |value, (_, &bit)| value | 1 << bit)
    }

    /// Inverse of [Self::nibble_bits]: collects D4..D7 from a port value.
    pub fn nibble_from_port(&self, value: u8) -> u8 {
        self.data_bits
            .iter()
            .enumerate()
            .filter(|&(_, &bit)| value & (1 << bit) != 0)
            .fold(0, |nibble, (i, _)| nibble | 1 << i)
    }
}

/// HD44780 over a 4-bit bus, driven directly through port registers.
///
/// Constructed by [Lcd::init], which runs the power-on sequence, so every `Lcd` refers to an
/// initialized controller. There is no way to run the sequence again; send
/// [DISPLAY_CLEAR](crate::lcd::DISPLAY_CLEAR) to reset the contents instead.
pub struct Lcd<'a, R: RegisterFile, D: DelayNs> {
    registers: &'a R,
    pins: LcdPins,
    delay: D,
}

impl<'a, R: RegisterFile, D: DelayNs> Lcd<'a, R, D> {
    /// Configures the pins and brings the controller into 4-bit, 2-line mode with the display,
    /// cursor and blinking on and the cursor moving right after each character.
    ///
    /// Blocks for roughly 160 ms.
    pub fn init(registers: &'a R, pins: LcdPins, delay: D) -> Self {
        let mut lcd = Lcd {
            registers,
            pins,
            delay,
        };
        lcd.power_on();
        lcd
    }

    pub fn pins(&self) -> &LcdPins {
        &self.pins
    }

    fn power_on(&mut self) {
        debug!("Initializing LCD: {:?}", self.pins);
        let (rs, enable) = (self.pins.rs, self.pins.enable);
        let (data_port, data_mask) = (self.pins.data_port, self.pins.data_mask());

        self.registers.configure_as_output(enable.port(), enable.mask());
        self.registers.configure_as_output(rs.port(), rs.mask());
        self.registers.configure_as_output(data_port, data_mask);
        self.registers.clear_bit(enable);
        self.registers.clear_bit(rs);
        self.registers.port_mask_write(data_port, data_mask, 0);

        self.delay.delay_ms(POWER_ON_MS);

        // The controller may be in 8-bit mode or halfway through a 4-bit transfer, so these are
        // single pulses rather than nibble pairs.
        self.write_nibble(0x3);
        self.strobe_enable();
        self.delay.delay_ms(RESET_SECOND_PULSE_MS);
        self.strobe_enable();
        self.delay.delay_us(RESET_THIRD_PULSE_US);
        self.strobe_enable();

        self.send_nibble(0x2);
        debug!("LCD in 4-bit mode");

        self.function_set(false, true, false);
        self.clear_display();
        self.set_display_control(true, true, true);
        self.set_entry_mode(CursorDirection::Right, false);

        self.delay.delay_ms(READY_MS);
        debug!("LCD ready");
    }

    /// Pulses Enable. The only place data actually reaches the controller.
    fn strobe_enable(&mut self) {
        self.delay.delay_us(BUS_SETTLE_US);
        self.registers.set_bit(self.pins.enable);
        self.delay.delay_us(ENABLE_PULSE_US);
        self.registers.clear_bit(self.pins.enable);
    }

    /// Puts a nibble on D4..D7 without touching the other bits of the data port.
    fn write_nibble(&mut self, nibble: u8) {
        let bits = self.pins.nibble_bits(nibble);
        self.registers
            .port_mask_write(self.pins.data_port, self.pins.data_mask(), bits);
    }

    fn send_nibble(&mut self, nibble: u8) {
        self.write_nibble(nibble);
        self.strobe_enable();
    }

    fn send_byte(&mut self, byte: u8, rs: bool) {
        if rs {
            self.registers.set_bit(self.pins.rs);
        } else {
            self.registers.clear_bit(self.pins.rs);
        }
        self.delay.delay_us(MODE_SETTLE_US);

        let high_nibble = byte >> 4;
        let low_nibble = byte & 0x0F;
        trace!("Writing HN: {:04b}", high_nibble);
        self.send_nibble(high_nibble);
        trace!("Writing LN: {:04b}", low_nibble);
        self.send_nibble(low_nibble);
    }

    /// Sends an instruction and waits for it to execute: 1.6 ms for clear and home, 40 us
    /// for everything else.
    pub fn send_command(&mut self, command: u8) {
        trace!("Sending command: {:08b}", command);
        self.send_byte(command, false);
        if is_long_command(command) {
            self.delay.delay_us(LONG_EXECUTION_US);
        } else {
            self.delay.delay_us(EXECUTION_US);
        }
    }

    /// Writes a character at the cursor, which then moves per the entry mode.
    pub fn send_char(&mut self, byte: u8) {
        trace!("Sending data: {:08b}", byte);
        self.send_byte(byte, true);
        self.delay.delay_us(EXECUTION_US);
    }

    /// Writes each byte at the cursor. A NUL byte ends the string early.
    pub fn send_string(&mut self, bytes: &[u8]) {
        for &byte in bytes.iter().take_while(|&&byte| byte != 0) {
            self.send_char(byte);
        }
    }

    pub fn write_char_at(&mut self, byte: u8, row: Row, column: u8) {
        self.send_command(row.cursor_command(column));
        self.send_char(byte);
    }

    pub fn write_string_at(&mut self, bytes: &[u8], row: Row, column: u8) {
        self.send_command(row.cursor_command(column));
        self.send_string(bytes);
    }

    pub fn command(&mut self, command: u8) {
        self.send_command(command);
    }

    pub fn print_char(&mut self, byte: u8) {
        self.send_char(byte);
    }

    /// Like [Self::write_char_at] with a numeric row. Rows other than 1 and 2 write nothing.
    pub fn print_char_at(&mut self, byte: u8, row: u8, column: u8) {
        match Row::from_index(row) {
            Some(row) => self.write_char_at(byte, row, column),
            None => warn!("Row {} doesn't exist, character dropped", row),
        }
    }

    pub fn print_str(&mut self, bytes: &[u8]) {
        self.send_string(bytes);
    }

    /// Like [Self::write_string_at] with a numeric row. Rows other than 1 and 2 write nothing.
    pub fn print_str_at(&mut self, bytes: &[u8], row: u8, column: u8) {
        match Row::from_index(row) {
            Some(row) => self.write_string_at(bytes, row, column),
            None => warn!("Row {} doesn't exist, string dropped", row),
        }
    }
}

impl<R: RegisterFile, D: DelayNs> HD44780Driver for Lcd<'_, R, D> {
    fn send_command(&mut self, command: u8) {
        Lcd::send_command(self, command)
    }

    fn send_data(&mut self, data: u8) {
        self.send_char(data)
    }
}

impl<R: RegisterFile, D: DelayNs> std::fmt::Write for Lcd<'_, R, D> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        for c in s.chars() {
            if c.is_ascii() {
                self.send_char(c as u8);
            } else {
                warn!("Non-ASCII character: {}", c);
                self.send_char(b'?');
            }
        }
        Ok(())
    }
}

impl<R: RegisterFile, D: DelayNs> Debug for Lcd<'_, R, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lcd({:?}, {:?})", self.registers, self.pins)
    }
}
