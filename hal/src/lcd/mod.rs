//! HD44780-compatible character LCD, 16x2, driven over a 4-bit parallel bus.
//!
//! The controller is write-only in this driver: the R/W line is expected to be tied to ground and
//! the busy flag is never read. Every transfer is followed by a fixed wait long enough for the
//! slowest instruction of its kind, so a call returns only once the controller is ready again.

mod driver;

pub use driver::*;

use crate::{HalError, HalResult};
use std::fmt::Debug;

// Display
pub const DISPLAY_ON: u8 = 0x0C;
pub const DISPLAY_OFF: u8 = 0x0A;
pub const DISPLAY_CLEAR: u8 = 0x01;

// Cursor control
pub const CURSOR_ON: u8 = 0x0E;
pub const CURSOR_OFF: u8 = 0x0C;
pub const CURSOR_SHIFT_LEFT: u8 = 0x10;
pub const CURSOR_SHIFT_RIGHT: u8 = 0x14;
pub const CURSOR_HOME: u8 = 0x02;
pub const CURSOR_BLINK: u8 = 0x0D;
pub const CURSOR_BLINK_ALTERNATE: u8 = 0x0F;

// Cursor movement after a character is written
pub const CURSOR_LEFT_ON_INPUT: u8 = 0x04;
pub const CURSOR_RIGHT_ON_INPUT: u8 = 0x06;

// Display shift after a character is written
pub const TEXT_LEFT_ON_INPUT: u8 = 0x07;
pub const TEXT_RIGHT_ON_INPUT: u8 = 0x05;

// Display shift on command
pub const SHIFT_TEXT_LEFT: u8 = 0x08;
pub const SHIFT_TEXT_RIGHT: u8 = 0x1C;

/// Visible characters per line.
pub const COLUMNS: u8 = 16;

/// Whether a command needs the long (clear/home) execution time.
pub fn is_long_command(command: u8) -> bool {
    // 0x01 clear, 0x02 and 0x03 return home (bit 0 is don't-care)
    matches!(command, 0x01..=0x03)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}

/// A display line. Rows are 1-indexed to match the column numbering.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Row {
    One,
    Two,
}

impl Row {
    /// Returns `None` for anything but 1 and 2.
    pub fn from_index(row: u8) -> Option<Row> {
        match row {
            1 => Some(Row::One),
            2 => Some(Row::Two),
            _ => None,
        }
    }

    /// "Set DDRAM address" command for the first column of this row.
    pub const fn base_command(self) -> u8 {
        match self {
            Row::One => 0x80,
            Row::Two => 0xC0,
        }
    }

    /// "Set DDRAM address" command for a 1-indexed column.
    ///
    /// The column isn't checked: columns past [COLUMNS] address the off-screen part of the line,
    /// so `column` 17 on row one yields `0x90`. Column 0 wraps to the byte before the base.
    pub const fn cursor_command(self, column: u8) -> u8 {
        self.base_command().wrapping_add(column.wrapping_sub(1))
    }
}

/// Instruction set of the HD44780, on top of the two raw transfers.
pub trait HD44780Driver: Debug {
    /// Sends an instruction byte (RS low) and waits for it to execute.
    fn send_command(&mut self, command: u8);

    /// Sends a data byte (RS high) and waits for it to be written.
    fn send_data(&mut self, data: u8);

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) {
        self.send_command(DISPLAY_CLEAR)
    }

    /// Sets the cursor to the home position and undoes any display shift.
    fn return_home(&mut self) {
        self.send_command(CURSOR_HOME)
    }

    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) {
        let mut command = 0b00000100;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    fn set_display_control(&mut self, display_on: bool, cursor_on: bool, blink_on: bool) {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Moves the cursor or shifts the whole display by one position.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) {
        let mut command = 0b00010000;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    fn function_set(&mut self, eight_bit: bool, two_lines: bool, alt_font: bool) {
        let mut command = 0b00100000;
        if eight_bit {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        if alt_font {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// # Errors
    /// - `HalError::InvalidArgument` if the address doesn't fit in 7 bits.
    fn set_ddram_address(&mut self, address: u8) -> HalResult<()> {
        if address > 0b01111111 {
            return Err(HalError::InvalidArgument);
        }
        self.send_command(0b10000000 | address);
        Ok(())
    }
}
