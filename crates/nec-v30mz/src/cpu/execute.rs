//! Single-byte opcode dispatch.
//!
//! Cycle counts follow the V30MZ's pipelined timings: register forms are
//! mostly one cycle and memory forms add one or two.

#![allow(clippy::too_many_lines)]

use emu_core::Bus;

use super::string::StringOp;
use super::{Access, V30MZ, VECTOR_BOUND, VECTOR_BREAKPOINT, VECTOR_OVERFLOW};
use crate::alu::{self, AluOp, Width};
use crate::flags::{CF, DF, Flags, IF};
use crate::modrm::Location;
use crate::registers::{Reg16, Segment};

impl V30MZ {
    pub(super) fn execute<B: Bus>(&mut self, bus: &mut B, op: u8) {
        match op {
            // ALU rm/reg/accumulator forms: bits 3-5 select the operation.
            0x00..=0x3F if op & 7 < 6 => {
                let alu_op = AluOp::from_index(op >> 3);
                match op & 7 {
                    0 => self.alu_modrm::<u8, B>(bus, alu_op, false),
                    1 => self.alu_modrm::<u16, B>(bus, alu_op, false),
                    2 => self.alu_modrm::<u8, B>(bus, alu_op, true),
                    3 => self.alu_modrm::<u16, B>(bus, alu_op, true),
                    4 => self.alu_accumulator::<u8, B>(bus, alu_op),
                    _ => self.alu_accumulator::<u16, B>(bus, alu_op),
                }
            }

            // PUSH/POP segment
            0x06 | 0x0E | 0x16 | 0x1E => {
                let value = self.regs.segment(Segment::from_index(op >> 3));
                self.push(bus, value);
                self.cycles += 2;
            }
            0x07 | 0x17 | 0x1F => {
                let value = self.pop(bus);
                self.regs.set_segment(Segment::from_index(op >> 3), value);
                self.cycles += 3;
            }

            // Decimal adjust
            0x27 => {
                let al = self.regs.al();
                let al = alu::adj4a(&mut self.regs.flags, al);
                self.regs.set_al(al);
                self.cycles += 10;
            }
            0x2F => {
                let al = self.regs.al();
                let al = alu::adj4s(&mut self.regs.flags, al);
                self.regs.set_al(al);
                self.cycles += 10;
            }
            0x37 => {
                self.regs.ax = alu::adjba(&mut self.regs.flags, self.regs.ax);
                self.cycles += 9;
            }
            0x3F => {
                self.regs.ax = alu::adjbs(&mut self.regs.flags, self.regs.ax);
                self.cycles += 9;
            }

            // INC/DEC r16
            0x40..=0x47 => {
                let reg = Reg16::from_index(op);
                let value = self.regs.get16(reg);
                let value = alu::inc(&mut self.regs.flags, value);
                self.regs.set16(reg, value);
                self.cycles += 1;
            }
            0x48..=0x4F => {
                let reg = Reg16::from_index(op);
                let value = self.regs.get16(reg);
                let value = alu::dec(&mut self.regs.flags, value);
                self.regs.set16(reg, value);
                self.cycles += 1;
            }

            // PUSH/POP r16 (PUSH SP stores SP as it was before the push)
            0x50..=0x57 => {
                let value = self.regs.get16(Reg16::from_index(op));
                self.push(bus, value);
                self.cycles += 1;
            }
            0x58..=0x5F => {
                let value = self.pop(bus);
                self.regs.set16(Reg16::from_index(op), value);
                self.cycles += 1;
            }

            0x60 => self.op_pusha(bus),
            0x61 => self.op_popa(bus),
            0x62 => self.op_bound(bus),

            // PUSH imm
            0x68 => {
                let value = self.fetch16(bus);
                self.push(bus, value);
                self.cycles += 1;
            }
            0x6A => {
                let value = self.fetch8(bus) as i8 as u16;
                self.push(bus, value);
                self.cycles += 1;
            }

            // IMUL r16, rm16, imm
            0x69 | 0x6B => {
                let (modrm, loc) = self.decode_modrm(bus);
                let src: u16 = self.get_rm(bus, loc);
                let imm = if op == 0x69 {
                    self.fetch16(bus)
                } else {
                    self.fetch8(bus) as i8 as u16
                };
                let product = alu::imul(&mut self.regs.flags, src, imm);
                self.regs.set16(Reg16::from_index(modrm.reg), product as u16);
                self.cycles += if modrm.is_register() { 3 } else { 4 };
            }

            0x6C => self.string::<u8, B>(bus, StringOp::Ins),
            0x6D => self.string::<u16, B>(bus, StringOp::Ins),
            0x6E => self.string::<u8, B>(bus, StringOp::Outs),
            0x6F => self.string::<u16, B>(bus, StringOp::Outs),

            // Jcc rel8
            0x70..=0x7F => {
                let displacement = self.fetch8(bus) as i8;
                if self.condition(op & 0x0F) {
                    self.jump_relative(displacement);
                    self.cycles += 4;
                } else {
                    self.cycles += 1;
                }
            }

            0x80 | 0x82 => self.group1::<u8, B>(bus, false),
            0x81 => self.group1::<u16, B>(bus, false),
            0x83 => self.group1::<u16, B>(bus, true),

            // TEST rm, reg
            0x84 => self.test_modrm::<u8, B>(bus),
            0x85 => self.test_modrm::<u16, B>(bus),

            // XCHG rm, reg
            0x86 => self.xchg_modrm::<u8, B>(bus),
            0x87 => self.xchg_modrm::<u16, B>(bus),

            // MOV rm/reg
            0x88 => self.mov_modrm::<u8, B>(bus, false),
            0x89 => self.mov_modrm::<u16, B>(bus, false),
            0x8A => self.mov_modrm::<u8, B>(bus, true),
            0x8B => self.mov_modrm::<u16, B>(bus, true),

            // MOV rm16, sreg
            0x8C => {
                let (modrm, loc) = self.decode_modrm(bus);
                let value = self.regs.segment(Segment::from_index(modrm.reg));
                self.set_rm(bus, loc, value);
                self.cycles += if modrm.is_register() { 1 } else { 2 };
            }

            // LEA: register form has no address and does nothing
            0x8D => {
                let (modrm, loc) = self.decode_modrm(bus);
                if let Some(offset) = loc.offset() {
                    self.regs.set16(Reg16::from_index(modrm.reg), offset);
                }
                self.cycles += 1;
            }

            // MOV sreg, rm16
            0x8E => {
                let (modrm, loc) = self.decode_modrm(bus);
                let value: u16 = self.get_rm(bus, loc);
                self.regs.set_segment(Segment::from_index(modrm.reg), value);
                self.cycles += if modrm.is_register() { 2 } else { 3 };
            }

            // POP rm16
            0x8F => {
                let (modrm, loc) = self.decode_modrm(bus);
                let value = self.pop(bus);
                self.set_rm(bus, loc, value);
                self.cycles += if modrm.is_register() { 1 } else { 3 };
            }

            // NOP (XCHG AX, AX)
            0x90 => self.cycles += 1,

            // XCHG AX, r16
            0x91..=0x97 => {
                let reg = Reg16::from_index(op);
                let value = self.regs.get16(reg);
                self.regs.set16(reg, self.regs.ax);
                self.regs.ax = value;
                self.cycles += 3;
            }

            // CBW / CWD
            0x98 => {
                self.regs.ax = self.regs.al() as i8 as u16;
                self.cycles += 1;
            }
            0x99 => {
                self.regs.dx = if self.regs.ax & 0x8000 != 0 { 0xFFFF } else { 0 };
                self.cycles += 1;
            }

            // CALL far imm
            0x9A => {
                let offset = self.fetch16(bus);
                let segment = self.fetch16(bus);
                self.push(bus, self.regs.cs);
                self.push(bus, self.regs.ip);
                self.regs.cs = segment;
                self.regs.ip = offset;
                self.cycles += 10;
            }

            // PUSHF / POPF / SAHF / LAHF
            0x9C => {
                self.push(bus, self.regs.flags.to_word());
                self.cycles += 2;
            }
            0x9D => {
                let value = self.pop(bus);
                self.regs.flags = Flags::from_word(value);
                self.cycles += 3;
            }
            0x9E => {
                self.regs.flags.load_low_byte(self.regs.ah());
                self.cycles += 4;
            }
            0x9F => {
                self.regs.set_ah(self.regs.flags.low_byte());
                self.cycles += 2;
            }

            // MOV accumulator, [moffs] and back
            0xA0 => {
                let offset = self.fetch16(bus);
                let seg = self.data_segment(Segment::Ds);
                let value = Self::read_byte(bus, seg, offset);
                self.regs.set_al(value);
                self.cycles += 1;
            }
            0xA1 => {
                let offset = self.fetch16(bus);
                let seg = self.data_segment(Segment::Ds);
                self.regs.ax = Self::read_word(bus, seg, offset);
                self.cycles += 1;
            }
            0xA2 => {
                let offset = self.fetch16(bus);
                let seg = self.data_segment(Segment::Ds);
                Self::write_byte(bus, seg, offset, self.regs.al());
                self.cycles += 1;
            }
            0xA3 => {
                let offset = self.fetch16(bus);
                let seg = self.data_segment(Segment::Ds);
                Self::write_word(bus, seg, offset, self.regs.ax);
                self.cycles += 1;
            }

            0xA4 => self.string::<u8, B>(bus, StringOp::Movs),
            0xA5 => self.string::<u16, B>(bus, StringOp::Movs),
            0xA6 => self.string::<u8, B>(bus, StringOp::Cmps),
            0xA7 => self.string::<u16, B>(bus, StringOp::Cmps),

            // TEST accumulator, imm
            0xA8 => {
                let imm = self.fetch8(bus);
                let al = self.regs.al();
                alu::and(&mut self.regs.flags, al, imm);
                self.cycles += 1;
            }
            0xA9 => {
                let imm = self.fetch16(bus);
                alu::and(&mut self.regs.flags, self.regs.ax, imm);
                self.cycles += 1;
            }

            0xAA => self.string::<u8, B>(bus, StringOp::Stos),
            0xAB => self.string::<u16, B>(bus, StringOp::Stos),
            0xAC => self.string::<u8, B>(bus, StringOp::Lods),
            0xAD => self.string::<u16, B>(bus, StringOp::Lods),
            0xAE => self.string::<u8, B>(bus, StringOp::Scas),
            0xAF => self.string::<u16, B>(bus, StringOp::Scas),

            // MOV reg, imm
            0xB0..=0xB7 => {
                let imm = self.fetch8(bus);
                u8::set_reg(&mut self.regs, op & 7, imm);
                self.cycles += 1;
            }
            0xB8..=0xBF => {
                let imm = self.fetch16(bus);
                u16::set_reg(&mut self.regs, op & 7, imm);
                self.cycles += 1;
            }

            // Shift/rotate by imm8
            0xC0 => self.group2_immediate::<u8, B>(bus),
            0xC1 => self.group2_immediate::<u16, B>(bus),

            // RET near
            0xC2 => {
                let release = self.fetch16(bus);
                self.regs.ip = self.pop(bus);
                self.regs.sp = self.regs.sp.wrapping_add(release);
                self.cycles += 6;
            }
            0xC3 => {
                self.regs.ip = self.pop(bus);
                self.cycles += 6;
            }

            // LES / LDS
            0xC4 => self.load_far_pointer(bus, Segment::Es),
            0xC5 => self.load_far_pointer(bus, Segment::Ds),

            // MOV rm, imm
            0xC6 => {
                let (_, loc) = self.decode_modrm(bus);
                let imm = self.fetch8(bus);
                self.set_rm(bus, loc, imm);
                self.cycles += 1;
            }
            0xC7 => {
                let (_, loc) = self.decode_modrm(bus);
                let imm = self.fetch16(bus);
                self.set_rm(bus, loc, imm);
                self.cycles += 1;
            }

            0xC8 => self.op_enter(bus),
            0xC9 => {
                self.regs.sp = self.regs.bp;
                self.regs.bp = self.pop(bus);
                self.cycles += 2;
            }

            // RET far
            0xCA => {
                let release = self.fetch16(bus);
                self.regs.ip = self.pop(bus);
                self.regs.cs = self.pop(bus);
                self.regs.sp = self.regs.sp.wrapping_add(release);
                self.cycles += 9;
            }
            0xCB => {
                self.regs.ip = self.pop(bus);
                self.regs.cs = self.pop(bus);
                self.cycles += 8;
            }

            // Software interrupts
            0xCC => {
                self.software_interrupt(bus, VECTOR_BREAKPOINT);
                self.cycles += 9;
            }
            0xCD => {
                let vector = self.fetch8(bus);
                self.software_interrupt(bus, vector);
                self.cycles += 10;
            }
            0xCE => {
                if self.regs.flags.overflow() {
                    self.software_interrupt(bus, VECTOR_OVERFLOW);
                    self.cycles += 13;
                } else {
                    self.cycles += 6;
                }
            }

            // IRET
            0xCF => {
                self.regs.ip = self.pop(bus);
                self.regs.cs = self.pop(bus);
                let value = self.pop(bus);
                self.regs.flags = Flags::from_word(value);
                self.cycles += 10;
            }

            // Shift/rotate by 1 and by CL
            0xD0 => self.group2::<u8, B>(bus, Some(1)),
            0xD1 => self.group2::<u16, B>(bus, Some(1)),
            0xD2 => self.group2::<u8, B>(bus, None),
            0xD3 => self.group2::<u16, B>(bus, None),

            // AAM / AAD: the immediate is fetched but the base is always 10
            0xD4 => {
                let _ = self.fetch8(bus);
                let al = self.regs.al();
                self.regs.ax = alu::cvtbd(&mut self.regs.flags, al);
                self.cycles += 17;
            }
            0xD5 => {
                let _ = self.fetch8(bus);
                self.regs.ax = alu::cvtdb(&mut self.regs.flags, self.regs.ax);
                self.cycles += 6;
            }

            // SALC
            0xD6 => {
                let value = if self.regs.flags.carry() { 0xFF } else { 0x00 };
                self.regs.set_al(value);
                self.cycles += 8;
            }

            // XLAT
            0xD7 => {
                let seg = self.data_segment(Segment::Ds);
                let offset = self.regs.bx.wrapping_add(u16::from(self.regs.al()));
                let value = Self::read_byte(bus, seg, offset);
                self.regs.set_al(value);
                self.cycles += 5;
            }

            // Coprocessor escape: operand decoded and ignored
            0xD8..=0xDF => {
                let _ = self.decode_modrm(bus);
                self.cycles += 1;
            }

            // LOOPNZ / LOOPZ / LOOP
            0xE0..=0xE2 => {
                let displacement = self.fetch8(bus) as i8;
                self.regs.cx = self.regs.cx.wrapping_sub(1);
                let zero = self.regs.flags.zero();
                let taken = self.regs.cx != 0
                    && match op {
                        0xE0 => !zero,
                        0xE1 => zero,
                        _ => true,
                    };
                if taken {
                    self.jump_relative(displacement);
                    self.cycles += 6;
                } else {
                    self.cycles += 3;
                }
            }

            // JCXZ
            0xE3 => {
                let displacement = self.fetch8(bus) as i8;
                if self.regs.cx == 0 {
                    self.jump_relative(displacement);
                    self.cycles += 4;
                } else {
                    self.cycles += 1;
                }
            }

            // IN / OUT with immediate port
            0xE4 => {
                let port = self.fetch8(bus);
                let value = u8::port_in(bus, port);
                self.regs.set_al(value);
                self.cycles += 6;
            }
            0xE5 => {
                let port = self.fetch8(bus);
                self.regs.ax = u16::port_in(bus, port);
                self.cycles += 6;
            }
            0xE6 => {
                let port = self.fetch8(bus);
                u8::port_out(bus, port, self.regs.al());
                self.cycles += 6;
            }
            0xE7 => {
                let port = self.fetch8(bus);
                u16::port_out(bus, port, self.regs.ax);
                self.cycles += 6;
            }

            // CALL / JMP
            0xE8 => {
                let displacement = self.fetch16(bus);
                self.push(bus, self.regs.ip);
                self.regs.ip = self.regs.ip.wrapping_add(displacement);
                self.cycles += 5;
            }
            0xE9 => {
                let displacement = self.fetch16(bus);
                self.regs.ip = self.regs.ip.wrapping_add(displacement);
                self.cycles += 4;
            }
            0xEA => {
                let offset = self.fetch16(bus);
                let segment = self.fetch16(bus);
                self.regs.cs = segment;
                self.regs.ip = offset;
                self.cycles += 7;
            }
            0xEB => {
                let displacement = self.fetch8(bus) as i8;
                self.jump_relative(displacement);
                self.cycles += 4;
            }

            // IN / OUT with port in DX (the bus decodes eight port bits)
            0xEC => {
                let value = u8::port_in(bus, self.regs.dx as u8);
                self.regs.set_al(value);
                self.cycles += 6;
            }
            0xED => {
                self.regs.ax = u16::port_in(bus, self.regs.dx as u8);
                self.cycles += 6;
            }
            0xEE => {
                u8::port_out(bus, self.regs.dx as u8, self.regs.al());
                self.cycles += 6;
            }
            0xEF => {
                u16::port_out(bus, self.regs.dx as u8, self.regs.ax);
                self.cycles += 6;
            }

            // HLT
            0xF4 => {
                self.halted = true;
                self.cycles += 9;
            }

            // Flag instructions
            0xF5 => self.flag_op(|f| f.assign(CF, !f.carry())),
            0xF8 => self.flag_op(|f| f.clear(CF)),
            0xF9 => self.flag_op(|f| f.set(CF)),
            0xFA => self.flag_op(|f| f.clear(IF)),
            0xFB => self.flag_op(|f| f.set(IF)),
            0xFC => self.flag_op(|f| f.clear(DF)),
            0xFD => self.flag_op(|f| f.set(DF)),

            0xF6 => self.group3::<u8, B>(bus),
            0xF7 => self.group3::<u16, B>(bus),
            0xFE => self.group4(bus),
            0xFF => self.group5(bus),

            // Undefined on the V30MZ (0x0F, 0x63-0x67, 0xF1) and POLL (0x9B)
            _ => self.cycles += 1,
        }
    }

    // === Shared instruction bodies ===

    pub(super) fn jump_relative(&mut self, displacement: i8) {
        self.regs.ip = self.regs.ip.wrapping_add(displacement as u16);
    }

    fn flag_op(&mut self, f: impl FnOnce(&mut Flags)) {
        f(&mut self.regs.flags);
        self.cycles += 4;
    }

    /// ALU op between a ModRM operand and the reg field.
    fn alu_modrm<T: Access, B: Bus>(&mut self, bus: &mut B, op: AluOp, to_reg: bool) {
        let (modrm, loc) = self.decode_modrm(bus);
        let reg = T::reg(&self.regs, modrm.reg);
        let rm: T = self.get_rm(bus, loc);

        if to_reg {
            let result = alu::binary(&mut self.regs.flags, op, reg, rm);
            if op.writes_result() {
                T::set_reg(&mut self.regs, modrm.reg, result);
            }
            self.cycles += if modrm.is_register() { 1 } else { 2 };
        } else {
            let result = alu::binary(&mut self.regs.flags, op, rm, reg);
            if op.writes_result() {
                self.set_rm(bus, loc, result);
            }
            self.cycles += match (modrm.is_register(), op.writes_result()) {
                (true, _) => 1,
                (false, false) => 2,
                (false, true) => 3,
            };
        }
    }

    /// ALU op between AL/AX and an immediate.
    fn alu_accumulator<T: Access, B: Bus>(&mut self, bus: &mut B, op: AluOp) {
        let imm = T::fetch(self, bus);
        let acc = T::reg(&self.regs, 0);
        let result = alu::binary(&mut self.regs.flags, op, acc, imm);
        if op.writes_result() {
            T::set_reg(&mut self.regs, 0, result);
        }
        self.cycles += 1;
    }

    fn test_modrm<T: Access, B: Bus>(&mut self, bus: &mut B) {
        let (modrm, loc) = self.decode_modrm(bus);
        let rm: T = self.get_rm(bus, loc);
        let reg = T::reg(&self.regs, modrm.reg);
        alu::and(&mut self.regs.flags, rm, reg);
        self.cycles += if modrm.is_register() { 1 } else { 2 };
    }

    fn xchg_modrm<T: Access, B: Bus>(&mut self, bus: &mut B) {
        let (modrm, loc) = self.decode_modrm(bus);
        let rm: T = self.get_rm(bus, loc);
        let reg = T::reg(&self.regs, modrm.reg);
        self.set_rm(bus, loc, reg);
        T::set_reg(&mut self.regs, modrm.reg, rm);
        self.cycles += if modrm.is_register() { 3 } else { 5 };
    }

    fn mov_modrm<T: Access, B: Bus>(&mut self, bus: &mut B, to_reg: bool) {
        let (modrm, loc) = self.decode_modrm(bus);
        if to_reg {
            let value: T = self.get_rm(bus, loc);
            T::set_reg(&mut self.regs, modrm.reg, value);
        } else {
            let value = T::reg(&self.regs, modrm.reg);
            self.set_rm(bus, loc, value);
        }
        self.cycles += 1;
    }

    /// LES/LDS: offset from the operand, segment from the word after it.
    fn load_far_pointer<B: Bus>(&mut self, bus: &mut B, segment: Segment) {
        let (modrm, loc) = self.decode_modrm(bus);
        if let Location::Memory { .. } = loc {
            let offset: u16 = self.get_rm(bus, loc);
            let value: u16 = self.get_rm(bus, loc.advance(2));
            self.regs.set16(Reg16::from_index(modrm.reg), offset);
            self.regs.set_segment(segment, value);
        }
        self.cycles += 6;
    }

    fn op_pusha<B: Bus>(&mut self, bus: &mut B) {
        let sp = self.regs.sp;
        let r = self.regs;
        for value in [r.ax, r.cx, r.dx, r.bx, sp, r.bp, r.si, r.di] {
            self.push(bus, value);
        }
        self.cycles += 9;
    }

    /// POPA discards the stacked SP.
    fn op_popa<B: Bus>(&mut self, bus: &mut B) {
        self.regs.di = self.pop(bus);
        self.regs.si = self.pop(bus);
        self.regs.bp = self.pop(bus);
        let _ = self.pop(bus);
        self.regs.bx = self.pop(bus);
        self.regs.dx = self.pop(bus);
        self.regs.cx = self.pop(bus);
        self.regs.ax = self.pop(bus);
        self.cycles += 8;
    }

    /// BOUND: raise vector 5 unless low <= index <= high (signed).
    fn op_bound<B: Bus>(&mut self, bus: &mut B) {
        let (modrm, loc) = self.decode_modrm(bus);
        self.cycles += 13;
        if modrm.is_register() {
            return;
        }
        let index = self.regs.get16(Reg16::from_index(modrm.reg)).signed();
        let low = self.get_rm::<u16, B>(bus, loc).signed();
        let high = self.get_rm::<u16, B>(bus, loc.advance(2)).signed();
        if index < low || index > high {
            self.software_interrupt(bus, VECTOR_BOUND);
        }
    }

    /// ENTER: build a stack frame with `level` nested frame pointers.
    fn op_enter<B: Bus>(&mut self, bus: &mut B) {
        let size = self.fetch16(bus);
        let level = self.fetch8(bus) & 0x1F;

        self.push(bus, self.regs.bp);
        let frame = self.regs.sp;

        if level > 0 {
            for _ in 1..level {
                self.regs.bp = self.regs.bp.wrapping_sub(2);
                let outer = Self::read_word(bus, self.regs.ss, self.regs.bp);
                self.push(bus, outer);
            }
            self.push(bus, frame);
        }

        self.regs.bp = frame;
        self.regs.sp = self.regs.sp.wrapping_sub(size);
        self.cycles += match level {
            0 => 7,
            1 => 11,
            n => 12 + 4 * u32::from(n - 1),
        };
    }
}
