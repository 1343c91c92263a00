//! Blocking delays.
//!
//! Every driver takes its waits through [DelayNs], so tests can swap in
//! [SimDelay](crate::sim::SimDelay) and check timing without actually waiting.

use embedded_hal::delay::DelayNs;
use std::hint::spin_loop;
use std::thread::sleep;
use std::time::Duration;

/// CPU clock of the target board (F_CPU).
pub const CPU_FREQUENCY_HZ: u32 = 16_000_000;

/// Busy-wait delay estimated from a CPU clock.
///
/// This is a host approximation: the iteration count assumes a fixed cost per loop pass, which
/// the host CPU doesn't honor, so use [SleepDelay] where wall-clock accuracy matters. Rounds up,
/// so the iteration count never covers less than requested.
#[derive(Copy, Clone, Debug)]
pub struct BusyDelay {
    cpu_frequency_hz: u32,
}

impl BusyDelay {
    /// Cycles one pass of the wait loop is assumed to cost.
    const CYCLES_PER_ITERATION: u64 = 4;

    pub fn new(cpu_frequency_hz: u32) -> Self {
        BusyDelay { cpu_frequency_hz }
    }

    pub fn cpu_frequency_hz(&self) -> u32 {
        self.cpu_frequency_hz
    }

    /// Number of loop iterations covering at least `ns` nanoseconds.
    pub fn iterations_for_ns(&self, ns: u32) -> u64 {
        let cycles = (ns as u64 * self.cpu_frequency_hz as u64).div_ceil(1_000_000_000);
        cycles.div_ceil(Self::CYCLES_PER_ITERATION)
    }
}

impl Default for BusyDelay {
    fn default() -> Self {
        Self::new(CPU_FREQUENCY_HZ)
    }
}

impl DelayNs for BusyDelay {
    fn delay_ns(&mut self, ns: u32) {
        for _ in 0..self.iterations_for_ns(ns) {
            spin_loop();
        }
    }
}

/// Delay backed by the host scheduler.
#[derive(Copy, Clone, Debug, Default)]
pub struct SleepDelay;

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        sleep(Duration::from_nanos(ns as u64));
    }
}
