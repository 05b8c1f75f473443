//! Hardware interrupt controller (ports 0xB0, 0xB2, 0xB4, 0xB6).
//!
//! Eight level-style lines latch into a status register when their enable
//! bit is set. The scheduler services the highest pending line while the
//! CPU has interrupts enabled; software clears lines by writing 1s to the
//! acknowledge port.

use bitflags::bitflags;

use crate::config::Capabilities;
use crate::peripheral::InterruptRequest;

pub const PORT_BASE: u8 = 0xB0;
pub const PORT_ENABLE: u8 = 0xB2;
pub const PORT_STATUS: u8 = 0xB4;
pub const PORT_ACKNOWLEDGE: u8 = 0xB6;

bitflags! {
    /// Interrupt lines, by status/enable bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InterruptFlags: u8 {
        const SERIAL_SEND = 1 << 0;
        const KEY = 1 << 1;
        const CARTRIDGE = 1 << 2;
        const SERIAL_RECEIVE = 1 << 3;
        const LINE_COMPARE = 1 << 4;
        const VBLANK_TIMER = 1 << 5;
        const VBLANK = 1 << 6;
        const HBLANK_TIMER = 1 << 7;
    }
}

/// Interrupt controller state.
#[derive(Debug, Clone)]
pub struct InterruptController {
    base: u8,
    enable: InterruptFlags,
    status: InterruptFlags,
    base_mask: u8,
    base_fixed: u8,
}

impl InterruptController {
    #[must_use]
    pub fn new(caps: &Capabilities) -> Self {
        Self {
            base: 0,
            enable: InterruptFlags::empty(),
            status: InterruptFlags::empty(),
            base_mask: caps.interrupt_base_mask,
            base_fixed: caps.interrupt_base_fixed,
        }
    }

    pub fn reset(&mut self) {
        self.base = 0;
        self.enable = InterruptFlags::empty();
        self.status = InterruptFlags::empty();
    }

    /// Latch lines. Lines whose enable bit is clear are dropped.
    pub fn raise(&mut self, lines: InterruptFlags) {
        self.status |= lines & self.enable;
    }

    /// Clear lines from the status register.
    pub fn lower(&mut self, lines: InterruptFlags) {
        self.status &= !lines;
    }

    /// Apply a peripheral's request: raise first, then lower.
    pub fn apply(&mut self, request: InterruptRequest) {
        self.raise(request.raise);
        self.lower(request.lower);
    }

    /// Highest-numbered line that is both enabled and pending.
    #[must_use]
    pub fn highest_pending(&self) -> Option<u8> {
        let active = (self.status & self.enable).bits();
        (0..8u8).rev().find(|&bit| active & (1 << bit) != 0)
    }

    /// CPU vector for a line: the written base ORed with the line number.
    ///
    /// The base keeps whatever bits the model's write mask let through, so on
    /// the Color bits 1-2 of the base also land in the vector.
    #[must_use]
    pub const fn vector(&self, line: u8) -> u8 {
        self.base | (line & 7)
    }

    #[must_use]
    pub const fn status(&self) -> InterruptFlags {
        self.status
    }

    #[must_use]
    pub const fn enabled(&self) -> InterruptFlags {
        self.enable
    }

    /// Vector base as read back from port 0xB0.
    #[must_use]
    pub const fn base(&self) -> u8 {
        self.base | self.base_fixed
    }

    #[must_use]
    pub fn read_port(&self, port: u8) -> u8 {
        match port {
            PORT_BASE => self.base(),
            PORT_ENABLE => self.enable.bits(),
            PORT_STATUS => self.status.bits(),
            _ => 0,
        }
    }

    pub fn write_port(&mut self, port: u8, value: u8) {
        match port {
            PORT_BASE => self.base = value & self.base_mask,
            PORT_ENABLE => self.enable = InterruptFlags::from_bits_retain(value),
            PORT_ACKNOWLEDGE => self.lower(InterruptFlags::from_bits_retain(value)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> InterruptController {
        let mut ic = InterruptController::new(&Capabilities::WONDERSWAN);
        ic.write_port(PORT_ENABLE, 0xFF);
        ic
    }

    #[test]
    fn raise_requires_enable() {
        let mut ic = InterruptController::new(&Capabilities::WONDERSWAN);
        ic.raise(InterruptFlags::VBLANK);
        assert!(ic.status().is_empty());

        ic.write_port(PORT_ENABLE, InterruptFlags::VBLANK.bits());
        ic.raise(InterruptFlags::VBLANK | InterruptFlags::KEY);
        assert_eq!(ic.status(), InterruptFlags::VBLANK);
    }

    #[test]
    fn highest_line_wins() {
        let mut ic = controller();
        ic.raise(InterruptFlags::CARTRIDGE | InterruptFlags::VBLANK_TIMER);
        assert_eq!(ic.highest_pending(), Some(5));

        ic.write_port(PORT_ACKNOWLEDGE, InterruptFlags::VBLANK_TIMER.bits());
        assert_eq!(ic.highest_pending(), Some(2));

        ic.write_port(PORT_ACKNOWLEDGE, 0xFF);
        assert_eq!(ic.highest_pending(), None);
    }

    #[test]
    fn vector_ors_line_into_written_base() {
        let mut color = InterruptController::new(&Capabilities::WONDERSWAN_COLOR);
        color.write_port(PORT_BASE, 0x26);
        assert_eq!(color.vector(6), 0x26);
        assert_eq!(color.vector(1), 0x27);
        assert_eq!(color.vector(0), 0x26);

        let mut mono = InterruptController::new(&Capabilities::WONDERSWAN);
        mono.write_port(PORT_BASE, 0x26);
        assert_eq!(mono.vector(1), 0x21);
        assert_eq!(mono.vector(6), 0x26);
    }

    #[test]
    fn base_read_back_per_model() {
        let mut mono = InterruptController::new(&Capabilities::WONDERSWAN);
        mono.write_port(PORT_BASE, 0xFF);
        assert_eq!(mono.read_port(PORT_BASE), 0xFB);
        mono.write_port(PORT_BASE, 0x20);
        assert_eq!(mono.read_port(PORT_BASE), 0x23);

        let mut color = InterruptController::new(&Capabilities::WONDERSWAN_COLOR);
        color.write_port(PORT_BASE, 0xFF);
        assert_eq!(color.read_port(PORT_BASE), 0xFF);
        color.write_port(PORT_BASE, 0x20);
        assert_eq!(color.read_port(PORT_BASE), 0x21);
    }

    #[test]
    fn request_raises_then_lowers() {
        let mut ic = controller();
        ic.raise(InterruptFlags::LINE_COMPARE);
        ic.apply(InterruptRequest {
            raise: InterruptFlags::HBLANK_TIMER,
            lower: InterruptFlags::LINE_COMPARE,
        });
        assert_eq!(ic.status(), InterruptFlags::HBLANK_TIMER);
    }
}
