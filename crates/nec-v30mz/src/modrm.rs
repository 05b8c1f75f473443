//! ModRM operand decoding.

use emu_core::Bus;

use crate::cpu::V30MZ;
use crate::registers::Segment;

/// A decoded ModRM byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    /// Bits 6-7: addressing mode (3 = register operand).
    pub mode: u8,
    /// Bits 3-5: register operand or sub-opcode.
    pub reg: u8,
    /// Bits 0-2: register or memory form.
    pub rm: u8,
}

impl ModRm {
    #[must_use]
    pub const fn new(byte: u8) -> Self {
        Self {
            mode: byte >> 6,
            reg: (byte >> 3) & 7,
            rm: byte & 7,
        }
    }

    /// True when the rm field names a register rather than memory.
    #[must_use]
    pub const fn is_register(self) -> bool {
        self.mode == 3
    }
}

/// Where an rm operand lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Register index (byte or word register set chosen by the instruction).
    Register(u8),
    /// Memory at `segment:offset`, segment already resolved for overrides.
    Memory { segment: Segment, offset: u16 },
}

impl Location {
    /// Offset of a memory operand, `None` for registers.
    #[must_use]
    pub const fn offset(self) -> Option<u16> {
        match self {
            Self::Register(_) => None,
            Self::Memory { offset, .. } => Some(offset),
        }
    }

    /// The same operand `delta` bytes further on, wrapping in its segment.
    #[must_use]
    pub const fn advance(self, delta: u16) -> Self {
        match self {
            Self::Register(index) => Self::Register(index),
            Self::Memory { segment, offset } => Self::Memory {
                segment,
                offset: offset.wrapping_add(delta),
            },
        }
    }
}

impl V30MZ {
    /// Fetch a ModRM byte and resolve its rm operand.
    pub(crate) fn decode_modrm<B: Bus>(&mut self, bus: &mut B) -> (ModRm, Location) {
        let modrm = ModRm::new(self.fetch8(bus));
        let loc = self.resolve(bus, modrm);
        (modrm, loc)
    }

    /// Resolve the rm operand of `modrm`, fetching any displacement.
    ///
    /// Forms based on BP default to SS; everything else defaults to DS. A
    /// segment prefix replaces the default in both cases.
    pub(crate) fn resolve<B: Bus>(&mut self, bus: &mut B, modrm: ModRm) -> Location {
        if modrm.is_register() {
            return Location::Register(modrm.rm);
        }

        let r = &self.regs;
        let (base, default) = match modrm.rm {
            0 => (r.bx.wrapping_add(r.si), Segment::Ds),
            1 => (r.bx.wrapping_add(r.di), Segment::Ds),
            2 => (r.bp.wrapping_add(r.si), Segment::Ss),
            3 => (r.bp.wrapping_add(r.di), Segment::Ss),
            4 => (r.si, Segment::Ds),
            5 => (r.di, Segment::Ds),
            6 if modrm.mode == 0 => (0, Segment::Ds),
            6 => (r.bp, Segment::Ss),
            _ => (r.bx, Segment::Ds),
        };

        let displacement = match (modrm.mode, modrm.rm) {
            (0, 6) | (2, _) => self.fetch16(bus),
            (1, _) => self.fetch8(bus) as i8 as u16,
            _ => 0,
        };

        Location::Memory {
            segment: self.segment_override().unwrap_or(default),
            offset: base.wrapping_add(displacement),
        }
    }
}
