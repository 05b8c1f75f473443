//! Keypad matrix on port 0xB5.
//!
//! Writing bits 4-6 selects the Y pad, X pad or face buttons; reads return
//! the select bits with the pressed keys of every selected group OR-ed into
//! the low nibble. The host sets button state at any time; the machine
//! samples it once per frame.

use bitflags::bitflags;

pub const PORT_KEYPAD: u8 = 0xB5;

const SELECT_Y: u8 = 0x10;
const SELECT_X: u8 = 0x20;
const SELECT_BUTTONS: u8 = 0x40;

bitflags! {
    /// Host buttons, grouped by keypad nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u16 {
        const Y1 = 1 << 0;
        const Y2 = 1 << 1;
        const Y3 = 1 << 2;
        const Y4 = 1 << 3;
        const X1 = 1 << 4;
        const X2 = 1 << 5;
        const X3 = 1 << 6;
        const X4 = 1 << 7;
        const START = 1 << 9;
        const A = 1 << 10;
        const B = 1 << 11;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Keypad {
    /// Host state, updated whenever the host likes.
    held: Buttons,
    /// State visible to the guest, taken at the last sample.
    latched: Buttons,
    select: u8,
}

impl Keypad {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_buttons(&mut self, buttons: Buttons) {
        self.held = buttons;
    }

    pub fn press(&mut self, buttons: Buttons) {
        self.held |= buttons;
    }

    pub fn release(&mut self, buttons: Buttons) {
        self.held &= !buttons;
    }

    #[must_use]
    pub const fn buttons(&self) -> Buttons {
        self.held
    }

    /// Latch the host state. Returns buttons pressed since the last sample.
    pub fn sample(&mut self) -> Buttons {
        let pressed = self.held & !self.latched;
        self.latched = self.held;
        pressed
    }

    #[must_use]
    pub fn read_port(&self) -> u8 {
        let bits = self.latched.bits();
        let mut keys = 0u8;
        if self.select & SELECT_Y != 0 {
            keys |= (bits & 0xF) as u8;
        }
        if self.select & SELECT_X != 0 {
            keys |= ((bits >> 4) & 0xF) as u8;
        }
        if self.select & SELECT_BUTTONS != 0 {
            keys |= ((bits >> 8) & 0xF) as u8;
        }
        self.select | keys
    }

    pub fn write_port(&mut self, value: u8) {
        self.select = value & (SELECT_Y | SELECT_X | SELECT_BUTTONS);
    }

    pub fn reset(&mut self) {
        self.latched = Buttons::empty();
        self.select = 0;
    }
}
