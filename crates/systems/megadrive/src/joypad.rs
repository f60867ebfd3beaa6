//! 3-button control pad ports
//!
//! Each port has a data register and a control register. Control bits set to
//! 1 mark pins the 68000 drives; writes to data only reach those pins. Data
//! bit 6 (TH) selects which half of the pad a read returns:
//!
//! | TH | bit 5 | bit 4 | bit 3 | bit 2 | bit 1 | bit 0 |
//! |----|-------|-------|-------|-------|-------|-------|
//! | 1  | C     | B     | Right | Left  | Down  | Up    |
//! | 0  | Start | A     | -     | -     | Down  | Up    |
//!
//! Buttons are active-low: a pressed button reads as 0.

use emu_core::logging::{log, LogCategory, LogLevel};

/// TH select line
pub const TH: u8 = 0x40;

/// Control pad button identifiers passed to the host input query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    C,
    Start,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::C,
        Button::Start,
    ];

    /// Bit for this button in a held-button mask
    pub fn mask(self) -> u8 {
        1 << self as u8
    }
}

/// One I/O port's register pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Joypad {
    pub control: u8,
    pub data: u8,
}

impl Joypad {
    /// Store only the bits `control` marks as outputs
    pub fn write_data(&mut self, value: u8) {
        self.data = value & self.control;
    }

    pub fn write_control(&mut self, value: u8) {
        self.control = value;
    }

    /// Read the data register with the pad's lines merged in.
    pub fn read_data(&self, read_input: &mut dyn FnMut(Button) -> bool) -> u8 {
        let mut released = |button: Button, bit: u8| u8::from(!read_input(button)) << bit;

        let lines = if self.data & TH != 0 {
            released(Button::C, 5)
                | released(Button::B, 4)
                | released(Button::Right, 3)
                | released(Button::Left, 2)
                | released(Button::Down, 1)
                | released(Button::Up, 0)
        } else {
            released(Button::Start, 5)
                | released(Button::A, 4)
                | released(Button::Down, 1)
                | released(Button::Up, 0)
        };

        log(LogCategory::IO, LogLevel::Trace, || {
            format!(
                "Joypad read: data={:02X} control={:02X} lines={:02X}",
                self.data, self.control, lines
            )
        });

        self.data | lines
    }
}
