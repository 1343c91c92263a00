//! Port registers and pin identities.
//!
//! Each digital port owns three registers: `PINx` (input levels), `DDRx` (direction, 1 = output)
//! and `PORTx` (output latch, or pull-up enable for inputs). The mapping is an explicit table, so
//! nothing relies on the registers sitting at fixed offsets from each other.

use crate::regs::*;
use crate::{HalError, HalResult, RegisterFile};
use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Port {
    B,
    C,
    D,
}

impl Port {
    /// The `PINx` register, reading the current pin levels.
    pub const fn input_register(self) -> u8 {
        match self {
            Port::B => PINB,
            Port::C => PINC,
            Port::D => PIND,
        }
    }

    /// The `DDRx` register paired with this port.
    pub const fn direction_register(self) -> u8 {
        match self {
            Port::B => DDRB,
            Port::C => DDRC,
            Port::D => DDRD,
        }
    }

    /// The `PORTx` output register.
    pub const fn output_register(self) -> u8 {
        match self {
            Port::B => PORTB,
            Port::C => PORTC,
            Port::D => PORTD,
        }
    }
}

/// A single bit of a port.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PinId {
    port: Port,
    bit: u8,
}

impl PinId {
    /// # Errors
    /// - `HalError::InvalidArgument` if `bit` is not in `0..8`.
    pub fn new(port: Port, bit: u8) -> HalResult<Self> {
        if bit > 7 {
            return Err(HalError::InvalidArgument);
        }
        Ok(PinId { port, bit })
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn bit(&self) -> u8 {
        self.bit
    }

    pub fn mask(&self) -> u8 {
        1 << self.bit
    }
}

impl Display for PinId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{:?}{}", self.port, self.bit)
    }
}

/// Port-level operations on top of a [RegisterFile].
pub trait PortExt: RegisterFile {
    fn configure_as_output(&self, port: Port, mask: u8) {
        self.set_bits(port.direction_register(), mask);
    }

    fn configure_as_input(&self, port: Port, mask: u8) {
        self.clear_bits(port.direction_register(), mask);
    }

    fn set_bit(&self, pin: PinId) {
        self.set_bits(pin.port().output_register(), pin.mask());
    }

    fn clear_bit(&self, pin: PinId) {
        self.clear_bits(pin.port().output_register(), pin.mask());
    }

    /// Writes the masked bits of the output register in one operation.
    fn port_mask_write(&self, port: Port, mask: u8, value: u8) {
        self.mask_write(port.output_register(), mask, value);
    }

    fn read_input(&self, port: Port) -> u8 {
        self.read(port.input_register())
    }
}

impl<T: ?Sized + RegisterFile> PortExt for T {}
