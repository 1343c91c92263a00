//! Digital I/O using Arduino Uno pin numbers.
//!
//! Pins 0 to 7 are `PORTD`, pins 8 to 13 are `PORTB`.

use crate::port::{PinId, Port, PortExt};
use crate::{HalError, HalResult, RegisterFile};
use bitvec::vec::BitVec;
use log::trace;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::AtomicU8;

pub const PIN_COUNT: usize = 14;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum PinMode {
    #[default] Input,
    InputPullUp,
    Output,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

/// Maps an Arduino pin number to its port and bit.
///
/// # Errors
/// - `HalError::InvalidPin` for numbers above 13.
pub fn arduino_pin(number: u8) -> HalResult<PinId> {
    match number {
        0..=7 => PinId::new(Port::D, number),
        8..=13 => PinId::new(Port::B, number - 8),
        _ => Err(HalError::InvalidPin(number)),
    }
}

pub struct Gpio<'a, R: RegisterFile> {
    registers: &'a R,
    used_pins: BitVec<AtomicU8>,
}

impl<'a, R: RegisterFile> Gpio<'a, R> {
    pub fn new(registers: &'a R) -> Self {
        Gpio {
            registers,
            used_pins: BitVec::repeat(false, PIN_COUNT),
        }
    }

    /// Takes ownership of a pin until the returned handle is dropped.
    ///
    /// # Errors
    /// - `HalError::InvalidPin` if the pin doesn't exist.
    /// - `HalError::AlreadyInUse` if the pin is already claimed.
    pub fn claim(&self, number: u8) -> HalResult<GpioPin<'_, 'a, R>> {
        let pin = arduino_pin(number)?;
        let index = number as usize;

        if self.used_pins[index] {
            return Err(HalError::AlreadyInUse);
        }
        self.used_pins.set_aliased(index, true);

        Ok(GpioPin {
            gpio: self,
            number,
            pin,
        })
    }
}

impl<R: RegisterFile> Debug for Gpio<'_, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Gpio({:?})", self.registers)
    }
}

pub struct GpioPin<'g, 'a, R: RegisterFile> {
    gpio: &'g Gpio<'a, R>,
    number: u8,
    pin: PinId,
}

impl<R: RegisterFile> GpioPin<'_, '_, R> {
    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn pin(&self) -> PinId {
        self.pin
    }

    pub fn set_mode(&self, mode: PinMode) {
        let registers = self.gpio.registers;
        let (port, mask) = (self.pin.port(), self.pin.mask());
        trace!("Pin {} ({}) mode: {:?}", self.number, self.pin, mode);

        match mode {
            PinMode::Input => {
                registers.configure_as_input(port, mask);
                registers.clear_bit(self.pin);
            }
            PinMode::InputPullUp => {
                registers.configure_as_input(port, mask);
                registers.set_bit(self.pin);
            }
            PinMode::Output => registers.configure_as_output(port, mask),
        }
    }

    pub fn write(&self, level: Level) {
        match level {
            Level::High => self.gpio.registers.set_bit(self.pin),
            Level::Low => self.gpio.registers.clear_bit(self.pin),
        }
    }

    /// Reads the pin's bit of `PINx` without shifting it down.
    ///
    /// The result is `0` for low and `1 << bit` for high, so compare it against zero rather than
    /// against `1`. Use [Self::is_high] for a plain boolean.
    pub fn read(&self) -> u8 {
        self.gpio.registers.read_input(self.pin.port()) & self.pin.mask()
    }

    pub fn is_high(&self) -> bool {
        self.read() != 0
    }
}

impl<R: RegisterFile> Debug for GpioPin<'_, '_, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.gpio, self.number)
    }
}

impl<R: RegisterFile> Drop for GpioPin<'_, '_, R> {
    fn drop(&mut self) {
        self.gpio.used_pins.set_aliased(self.number as usize, false);
    }
}
