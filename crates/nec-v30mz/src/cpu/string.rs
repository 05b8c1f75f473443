//! Block (string) instructions and their repeat prefixes.
//!
//! A repeated instruction runs one element per step. While it has more to
//! do it rewinds IP onto its own opcode and keeps the prefix queue, so the
//! next step re-enters it directly and an interrupt can be taken between
//! elements.

use emu_core::Bus;

use super::{Access, V30MZ};
use crate::alu;
use crate::registers::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StringOp {
    Movs,
    Cmps,
    Scas,
    Lods,
    Stos,
    Ins,
    Outs,
}

impl StringOp {
    /// Compare forms also stop when ZF leaves the repeat condition.
    const fn compares(self) -> bool {
        matches!(self, Self::Cmps | Self::Scas)
    }

    const fn cycles(self) -> u32 {
        match self {
            Self::Movs => 5,
            Self::Cmps => 6,
            Self::Scas => 4,
            Self::Lods | Self::Stos => 3,
            Self::Ins => 6,
            Self::Outs => 7,
        }
    }
}

impl V30MZ {
    pub(super) fn string<T: Access, B: Bus>(&mut self, bus: &mut B, op: StringOp) {
        let Some(class) = self.prefixes.repeat() else {
            self.string_element::<T, B>(bus, op);
            return;
        };

        if self.regs.cx == 0 {
            self.cycles += 1;
            return;
        }

        self.string_element::<T, B>(bus, op);
        self.regs.cx = self.regs.cx.wrapping_sub(1);

        let done = self.regs.cx == 0
            || (op.compares() && !class.continues(self.regs.flags.zero()));
        if !done {
            self.prefix_carry = true;
            self.regs.ip = self.regs.ip.wrapping_sub(1);
        }
    }

    /// Process one element. The source is DS:SI (segment prefix allowed); the
    /// destination is always ES:DI.
    fn string_element<T: Access, B: Bus>(&mut self, bus: &mut B, op: StringOp) {
        let source = self.data_segment(Segment::Ds);
        let es = self.regs.es;
        let (si, di) = (self.regs.si, self.regs.di);

        let mut advance_si = false;
        let mut advance_di = false;

        match op {
            StringOp::Movs => {
                let value = T::load(bus, source, si);
                T::store(bus, es, di, value);
                advance_si = true;
                advance_di = true;
            }
            StringOp::Cmps => {
                let a = T::load(bus, source, si);
                let b = T::load(bus, es, di);
                alu::sub(&mut self.regs.flags, a, b, false);
                advance_si = true;
                advance_di = true;
            }
            StringOp::Scas => {
                let acc = T::reg(&self.regs, 0);
                let b = T::load(bus, es, di);
                alu::sub(&mut self.regs.flags, acc, b, false);
                advance_di = true;
            }
            StringOp::Lods => {
                let value = T::load(bus, source, si);
                T::set_reg(&mut self.regs, 0, value);
                advance_si = true;
            }
            StringOp::Stos => {
                let acc = T::reg(&self.regs, 0);
                T::store(bus, es, di, acc);
                advance_di = true;
            }
            StringOp::Ins => {
                let value = T::port_in(bus, self.regs.dx as u8);
                T::store(bus, es, di, value);
                advance_di = true;
            }
            StringOp::Outs => {
                let value = T::load(bus, source, si);
                T::port_out(bus, self.regs.dx as u8, value);
                advance_si = true;
            }
        }

        let delta = if self.regs.flags.direction() {
            T::SIZE.wrapping_neg()
        } else {
            T::SIZE
        };
        if advance_si {
            self.regs.si = si.wrapping_add(delta);
        }
        if advance_di {
            self.regs.di = di.wrapping_add(delta);
        }
        self.cycles += op.cycles();
    }
}
