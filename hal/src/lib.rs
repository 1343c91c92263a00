//! Register-level peripheral drivers for ATmega328P-class microcontrollers.
//!
//! Every driver talks to the chip through a [RegisterFile], so the same code runs against a
//! memory-mapped register image ([raw::MappedRegisters]) or the recording simulator used by the
//! tests ([sim::SimRegisters]).

pub mod adc;
pub mod delay;
pub mod gpio;
pub mod lcd;
pub mod port;
pub mod raw;
pub mod regs;
pub mod sim;
pub mod usart;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum HalError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("no such pin: {0}")]
    InvalidPin(u8),
    #[error("invalid wiring: {0}")]
    InvalidWiring(&'static str),
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for HalError {
    fn from(err: std::io::Error) -> Self {
        HalError::Io(err.kind())
    }
}

pub type HalResult<T> = Result<T, HalError>;

/// Byte-wide access to the MCU data space (I/O and extended I/O registers).
///
/// Addresses are data-space addresses as listed in the datasheet register summary, e.g. `0x25`
/// for `PORTB`. See [regs] for the ones the drivers use.
pub trait RegisterFile: Debug {
    /// Reads the register at the given address.
    fn read(&self, address: u8) -> u8;

    /// Writes the register at the given address.
    fn write(&self, address: u8, value: u8);

    /// Sets the masked bits, leaving the others untouched.
    fn set_bits(&self, address: u8, mask: u8) {
        let value = self.read(address);
        self.write(address, value | mask);
    }

    /// Clears the masked bits, leaving the others untouched.
    fn clear_bits(&self, address: u8, mask: u8) {
        let value = self.read(address);
        self.write(address, value & !mask);
    }

    /// Replaces the masked bits with the corresponding bits of `value` in a single
    /// read-modify-write. Bits outside of `mask` keep their current state.
    fn mask_write(&self, address: u8, mask: u8, value: u8) {
        let current = self.read(address);
        self.write(address, (current & !mask) | (value & mask));
    }
}
