//! Recording register file for host-side testing.
//!
//! [SimRegisters] keeps the register image in memory and appends every write, together with every
//! delay taken through [SimDelay], to a single ordered event log. Busy-wait loops are driven by
//! read hooks that decide what a polled status register reads back.

use crate::lcd::LcdPins;
use crate::regs::REGISTER_SPACE;
use crate::RegisterFile;
use embedded_hal::delay::DelayNs;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SimEvent {
    Write { address: u8, value: u8 },
    Delay { ns: u64 },
}

type ReadHook = Box<dyn FnMut(u8) -> u8>;

pub struct SimRegisters {
    memory: RefCell<[u8; REGISTER_SPACE]>,
    baseline: RefCell<[u8; REGISTER_SPACE]>,
    events: RefCell<Vec<SimEvent>>,
    hooks: RefCell<HashMap<u8, ReadHook>>,
}

impl SimRegisters {
    pub fn new() -> Self {
        SimRegisters {
            memory: RefCell::new([0; REGISTER_SPACE]),
            baseline: RefCell::new([0; REGISTER_SPACE]),
            events: RefCell::new(Vec::new()),
            hooks: RefCell::new(HashMap::new()),
        }
    }

    /// Installs a hook run on every [RegisterFile::read] of `address`.
    ///
    /// The hook gets the stored value and returns the value the driver observes, which is also
    /// stored back.
    pub fn on_read(&self, address: u8, hook: impl FnMut(u8) -> u8 + 'static) {
        self.hooks.borrow_mut().insert(address, Box::new(hook));
    }

    /// Sets a register without logging a write.
    pub fn poke(&self, address: u8, value: u8) {
        self.memory.borrow_mut()[address as usize] = value;
    }

    /// Reads a register without running its hook.
    pub fn peek(&self, address: u8) -> u8 {
        self.memory.borrow()[address as usize]
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.events.borrow().clone()
    }

    /// Drops the event log. The current register image becomes the starting point for decoding.
    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
        *self.baseline.borrow_mut() = *self.memory.borrow();
    }

    /// Every value written to `address`, in order.
    pub fn writes_to(&self, address: u8) -> Vec<u8> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match *event {
                SimEvent::Write { address: a, value } if a == address => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Total time spent in delays since the log was last cleared.
    pub fn elapsed_ns(&self) -> u64 {
        self.events
            .borrow()
            .iter()
            .map(|event| match *event {
                SimEvent::Delay { ns } => ns,
                SimEvent::Write { .. } => 0,
            })
            .sum()
    }

    /// A delay provider that records into this register file's event log.
    pub fn delay(&self) -> SimDelay<'_> {
        SimDelay { registers: self }
    }

    fn log(&self, event: SimEvent) {
        self.events.borrow_mut().push(event);
    }

    /// Decodes the event log as seen by an HD44780 wired to `pins`.
    pub fn lcd_trace(&self, pins: &LcdPins) -> LcdTrace {
        let mut shadow = *self.baseline.borrow();
        let enable = pins.enable();
        let rs = pins.rs();
        let data_register = pins.data_port().output_register();
        let mut enable_high = shadow[enable.port().output_register() as usize] & enable.mask() != 0;

        let mut transfers = Vec::new();
        for event in self.events.borrow().iter() {
            match *event {
                SimEvent::Delay { ns } => transfers.push(LcdTransfer::Delay { ns }),
                SimEvent::Write { address, value } => {
                    shadow[address as usize] = value;
                    if address != enable.port().output_register() {
                        continue;
                    }
                    let high = value & enable.mask() != 0;
                    if high && !enable_high {
                        transfers.push(LcdTransfer::EnableRise);
                    } else if !high && enable_high {
                        transfers.push(LcdTransfer::Latch(Latch {
                            rs: shadow[rs.port().output_register() as usize] & rs.mask() != 0,
                            nibble: pins.nibble_from_port(shadow[data_register as usize]),
                        }));
                    }
                    enable_high = high;
                }
            }
        }
        LcdTrace { transfers }
    }
}

impl Default for SimRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SimRegisters {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimRegisters({} events)", self.events.borrow().len())
    }
}

impl RegisterFile for SimRegisters {
    fn read(&self, address: u8) -> u8 {
        let stored = self.peek(address);
        let value = match self.hooks.borrow_mut().get_mut(&address) {
            Some(hook) => hook(stored),
            None => stored,
        };
        self.poke(address, value);
        value
    }

    fn write(&self, address: u8, value: u8) {
        self.poke(address, value);
        self.log(SimEvent::Write { address, value });
    }
}

/// [DelayNs] that returns immediately and logs the requested duration.
#[derive(Debug)]
pub struct SimDelay<'a> {
    registers: &'a SimRegisters,
}

impl DelayNs for SimDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.registers.log(SimEvent::Delay { ns: ns as u64 });
    }

    fn delay_us(&mut self, us: u32) {
        self.registers.log(SimEvent::Delay { ns: us as u64 * 1_000 });
    }

    fn delay_ms(&mut self, ms: u32) {
        self.registers.log(SimEvent::Delay { ns: ms as u64 * 1_000_000 });
    }
}

/// A nibble latched by the controller on the falling edge of Enable.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Latch {
    pub rs: bool,
    pub nibble: u8,
}

/// A full byte reassembled from two consecutive latches.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LcdByte {
    pub rs: bool,
    pub value: u8,
}

impl LcdByte {
    pub fn command(value: u8) -> Self {
        LcdByte { rs: false, value }
    }

    pub fn data(value: u8) -> Self {
        LcdByte { rs: true, value }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LcdTransfer {
    EnableRise,
    Latch(Latch),
    Delay { ns: u64 },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LcdTrace {
    transfers: Vec<LcdTransfer>,
}

impl LcdTrace {
    pub fn transfers(&self) -> &[LcdTransfer] {
        &self.transfers
    }

    pub fn latches(&self) -> Vec<Latch> {
        self.transfers
            .iter()
            .filter_map(|transfer| match transfer {
                LcdTransfer::Latch(latch) => Some(*latch),
                _ => None,
            })
            .collect()
    }

    pub fn enable_pulses(&self) -> usize {
        self.transfers
            .iter()
            .filter(|transfer| matches!(transfer, LcdTransfer::EnableRise))
            .count()
    }

    /// Pairs latches high nibble first. Only meaningful once the controller is in 4-bit mode.
    pub fn bytes(&self) -> Vec<LcdByte> {
        self.latches()
            .chunks_exact(2)
            .map(|pair| LcdByte {
                rs: pair[0].rs,
                value: pair[0].nibble << 4 | pair[1].nibble,
            })
            .collect()
    }

    /// Sum of the delays after the last latch, i.e. what the caller waited before returning.
    pub fn trailing_delay_ns(&self) -> u64 {
        self.transfers
            .iter()
            .rev()
            .take_while(|transfer| !matches!(transfer, LcdTransfer::Latch(_)))
            .map(|transfer| match transfer {
                LcdTransfer::Delay { ns } => *ns,
                _ => 0,
            })
            .sum()
    }
}
