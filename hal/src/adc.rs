//! Single-shot polled ADC conversions.

use crate::regs::*;
use crate::{HalError, HalResult, RegisterFile};
use log::trace;
use std::fmt::{Debug, Formatter};
use std::hint::spin_loop;

/// ADC0 to ADC7 plus the internal temperature sensor (channel 8).
pub const CHANNEL_COUNT: u8 = 9;

const MUX_MASK: u8 = 0b1111 << MUX0;
/// ADPS2..0 = 0b111, dividing the CPU clock by 128 (125 kHz at 16 MHz).
const PRESCALER_128: u8 = 0b111 << ADPS0;

pub struct Adc<'a, R: RegisterFile> {
    registers: &'a R,
}

impl<'a, R: RegisterFile> Adc<'a, R> {
    pub fn new(registers: &'a R) -> Self {
        Adc { registers }
    }

    /// Selects AVcc as reference, enables the ADC with a /128 prescaler and throws away the first
    /// conversion, which the datasheet marks as less accurate.
    pub fn init(&self) {
        self.registers.set_bits(ADMUX, 1 << REFS0);
        self.registers.set_bits(ADCSRA, (1 << ADEN) | PRESCALER_128);
        self.convert();
    }

    /// Converts the given channel and returns the 10-bit result.
    ///
    /// Blocks until any conversion already running and the new one have finished.
    ///
    /// # Errors
    /// - `HalError::InvalidArgument` if `channel` is not below [CHANNEL_COUNT].
    pub fn read(&self, channel: u8) -> HalResult<u16> {
        if channel >= CHANNEL_COUNT {
            return Err(HalError::InvalidArgument);
        }

        self.wait_idle();
        self.registers.mask_write(ADMUX, MUX_MASK, channel << MUX0);
        let value = self.convert();
        trace!("ADC channel {}: {}", channel, value);
        Ok(value)
    }

    fn convert(&self) -> u16 {
        self.registers.set_bits(ADCSRA, 1 << ADSC);
        self.wait_idle();
        // ADCL must be read first; reading it locks ADCH until ADCH is read.
        let low = self.registers.read(ADCL);
        let high = self.registers.read(ADCH);
        u16::from(low) | u16::from(high) << 8
    }

    fn wait_idle(&self) {
        while self.registers.read(ADCSRA) & (1 << ADSC) != 0 {
            spin_loop();
        }
    }
}

impl<R: RegisterFile> Debug for Adc<'_, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Adc({:?})", self.registers)
    }
}
