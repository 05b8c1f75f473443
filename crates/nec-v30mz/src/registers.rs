//! V30MZ register set.

use crate::flags::Flags;

/// 8-bit register encodings, in ModRM order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    Al = 0,
    Cl = 1,
    Dl = 2,
    Bl = 3,
    Ah = 4,
    Ch = 5,
    Dh = 6,
    Bh = 7,
}

impl Reg8 {
    /// Decode the 3-bit register field of a ModRM byte or opcode.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index & 7 {
            0 => Self::Al,
            1 => Self::Cl,
            2 => Self::Dl,
            3 => Self::Bl,
            4 => Self::Ah,
            5 => Self::Ch,
            6 => Self::Dh,
            _ => Self::Bh,
        }
    }
}

/// 16-bit register encodings, in ModRM order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    Ax = 0,
    Cx = 1,
    Dx = 2,
    Bx = 3,
    Sp = 4,
    Bp = 5,
    Si = 6,
    Di = 7,
}

impl Reg16 {
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index & 7 {
            0 => Self::Ax,
            1 => Self::Cx,
            2 => Self::Dx,
            3 => Self::Bx,
            4 => Self::Sp,
            5 => Self::Bp,
            6 => Self::Si,
            _ => Self::Di,
        }
    }
}

/// Segment registers, in ModRM order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Es = 0,
    Cs = 1,
    Ss = 2,
    Ds = 3,
}

impl Segment {
    /// Decode a 2-bit segment field (the V30MZ has four segment registers).
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index & 3 {
            0 => Self::Es,
            1 => Self::Cs,
            2 => Self::Ss,
            _ => Self::Ds,
        }
    }
}

/// V30MZ registers.
///
/// The general registers are stored whole; byte access goes through
/// [`Registers::get8`]/[`Registers::set8`], which only ever touch their own
/// half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub ax: u16,
    pub cx: u16,
    pub dx: u16,
    pub bx: u16,
    pub sp: u16,
    pub bp: u16,
    pub si: u16,
    pub di: u16,

    pub es: u16,
    pub cs: u16,
    pub ss: u16,
    pub ds: u16,

    /// Instruction pointer (offset into CS).
    pub ip: u16,
    pub flags: Flags,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    /// Power-on state: execution starts at FFFF:0000.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ax: 0,
            cx: 0,
            dx: 0,
            bx: 0,
            sp: 0,
            bp: 0,
            si: 0,
            di: 0,
            es: 0,
            cs: 0xFFFF,
            ss: 0,
            ds: 0,
            ip: 0,
            flags: Flags::new(),
        }
    }

    #[must_use]
    pub const fn get16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::Ax => self.ax,
            Reg16::Cx => self.cx,
            Reg16::Dx => self.dx,
            Reg16::Bx => self.bx,
            Reg16::Sp => self.sp,
            Reg16::Bp => self.bp,
            Reg16::Si => self.si,
            Reg16::Di => self.di,
        }
    }

    pub fn set16(&mut self, reg: Reg16, value: u16) {
        match reg {
            Reg16::Ax => self.ax = value,
            Reg16::Cx => self.cx = value,
            Reg16::Dx => self.dx = value,
            Reg16::Bx => self.bx = value,
            Reg16::Sp => self.sp = value,
            Reg16::Bp => self.bp = value,
            Reg16::Si => self.si = value,
            Reg16::Di => self.di = value,
        }
    }

    #[must_use]
    pub const fn get8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::Al => self.ax as u8,
            Reg8::Cl => self.cx as u8,
            Reg8::Dl => self.dx as u8,
            Reg8::Bl => self.bx as u8,
            Reg8::Ah => (self.ax >> 8) as u8,
            Reg8::Ch => (self.cx >> 8) as u8,
            Reg8::Dh => (self.dx >> 8) as u8,
            Reg8::Bh => (self.bx >> 8) as u8,
        }
    }

    pub fn set8(&mut self, reg: Reg8, value: u8) {
        let (word, high) = match reg {
            Reg8::Al => (&mut self.ax, false),
            Reg8::Cl => (&mut self.cx, false),
            Reg8::Dl => (&mut self.dx, false),
            Reg8::Bl => (&mut self.bx, false),
            Reg8::Ah => (&mut self.ax, true),
            Reg8::Ch => (&mut self.cx, true),
            Reg8::Dh => (&mut self.dx, true),
            Reg8::Bh => (&mut self.bx, true),
        };
        *word = if high {
            (*word & 0x00FF) | (u16::from(value) << 8)
        } else {
            (*word & 0xFF00) | u16::from(value)
        };
    }

    #[must_use]
    pub const fn segment(&self, seg: Segment) -> u16 {
        match seg {
            Segment::Es => self.es,
            Segment::Cs => self.cs,
            Segment::Ss => self.ss,
            Segment::Ds => self.ds,
        }
    }

    pub fn set_segment(&mut self, seg: Segment, value: u16) {
        match seg {
            Segment::Es => self.es = value,
            Segment::Cs => self.cs = value,
            Segment::Ss => self.ss = value,
            Segment::Ds => self.ds = value,
        }
    }

    #[must_use]
    pub const fn al(&self) -> u8 {
        self.ax as u8
    }

    pub fn set_al(&mut self, value: u8) {
        self.set8(Reg8::Al, value);
    }

    #[must_use]
    pub const fn ah(&self) -> u8 {
        (self.ax >> 8) as u8
    }

    pub fn set_ah(&mut self, value: u8) {
        self.set8(Reg8::Ah, value);
    }

    /// 20-bit physical address of CS:IP.
    #[must_use]
    pub const fn code_address(&self) -> u32 {
        physical(self.cs, self.ip)
    }
}

/// Combine a segment and offset into a 20-bit physical address.
#[must_use]
pub const fn physical(segment: u16, offset: u16) -> u32 {
    (((segment as u32) << 4) + offset as u32) & 0xF_FFFF
}
