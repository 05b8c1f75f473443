//! Peripheral interface shared by the display timing, sound, serial and
//! cartridge collaborators.

use crate::interrupt::InterruptFlags;

/// Interrupt lines a peripheral wants changed after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterruptRequest {
    pub raise: InterruptFlags,
    pub lower: InterruptFlags,
}

impl InterruptRequest {
    pub const NONE: Self = Self {
        raise: InterruptFlags::empty(),
        lower: InterruptFlags::empty(),
    };

    #[must_use]
    pub const fn raise(lines: InterruptFlags) -> Self {
        Self {
            raise: lines,
            lower: InterruptFlags::empty(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raise.is_empty() && self.lower.is_empty()
    }
}

/// A device stepped by the scheduler and reached through I/O ports.
pub trait Peripheral: Send {
    /// Advance by `cycles` CPU cycles.
    fn step(&mut self, cycles: u32) -> InterruptRequest {
        let _ = cycles;
        InterruptRequest::NONE
    }

    fn read_port(&mut self, port: u8) -> u8;

    fn write_port(&mut self, port: u8, value: u8);

    /// Return to power-on state.
    fn reset(&mut self) {}
}

/// Stand-in for a device that is not emulated: ignores writes and reads a
/// fixed value.
#[derive(Debug, Clone, Copy)]
pub struct Unconnected {
    value: u8,
}

impl Unconnected {
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self { value }
    }
}

impl Peripheral for Unconnected {
    fn read_port(&mut self, _port: u8) -> u8 {
        self.value
    }

    fn write_port(&mut self, _port: u8, _value: u8) {}
}
