//! Opcode groups selected by the ModRM reg field (0x80-0x83, 0xC0/0xC1,
//! 0xD0-0xD3, 0xF6/0xF7, 0xFE, 0xFF).

use emu_core::Bus;

use super::{Access, V30MZ, VECTOR_DIVIDE_ERROR};
use crate::alu::{self, AluOp, ShiftOp, Width};
use crate::modrm::{Location, ModRm};

impl V30MZ {
    /// Group 1: ALU op between rm and an immediate. With `sign_extend` the
    /// immediate is a byte widened to the operand size.
    pub(super) fn group1<T: Access, B: Bus>(&mut self, bus: &mut B, sign_extend: bool) {
        let (modrm, loc) = self.decode_modrm(bus);
        let imm = if sign_extend {
            T::from_u32(self.fetch8(bus) as i8 as u32)
        } else {
            T::fetch(self, bus)
        };
        let op = AluOp::from_index(modrm.reg);
        let rm: T = self.get_rm(bus, loc);
        let result = alu::binary(&mut self.regs.flags, op, rm, imm);
        if op.writes_result() {
            self.set_rm(bus, loc, result);
        }
        self.cycles += match (modrm.is_register(), op.writes_result()) {
            (true, _) => 1,
            (false, false) => 2,
            (false, true) => 3,
        };
    }

    /// Group 2 with a count of 1 (`Some(1)`) or CL (`None`).
    pub(super) fn group2<T: Access, B: Bus>(&mut self, bus: &mut B, count: Option<u8>) {
        let (modrm, loc) = self.decode_modrm(bus);
        let by_one = count.is_some();
        let count = count.unwrap_or(self.regs.cx as u8);
        self.shift_rm::<T, B>(bus, modrm, loc, count, by_one);
    }

    /// Group 2 with an immediate count following the operand.
    pub(super) fn group2_immediate<T: Access, B: Bus>(&mut self, bus: &mut B) {
        let (modrm, loc) = self.decode_modrm(bus);
        let count = self.fetch8(bus);
        self.shift_rm::<T, B>(bus, modrm, loc, count, false);
    }

    fn shift_rm<T: Access, B: Bus>(
        &mut self,
        bus: &mut B,
        modrm: ModRm,
        loc: Location,
        count: u8,
        by_one: bool,
    ) {
        let Some(op) = ShiftOp::from_index(modrm.reg) else {
            self.cycles += 1;
            return;
        };
        let value: T = self.get_rm(bus, loc);
        let result = alu::shift(&mut self.regs.flags, op, value, count);
        self.set_rm(bus, loc, result);
        self.cycles += match (modrm.is_register(), by_one) {
            (true, true) => 1,
            (false, true) | (true, false) => 3,
            (false, false) => 5,
        };
    }

    /// Group 3: TEST imm, NOT, NEG, MUL, IMUL, DIV, IDIV.
    pub(super) fn group3<T: Access, B: Bus>(&mut self, bus: &mut B) {
        let (modrm, loc) = self.decode_modrm(bus);
        let memory = u32::from(!modrm.is_register());
        let value: T = self.get_rm(bus, loc);

        match modrm.reg {
            0 | 1 => {
                let imm = T::fetch(self, bus);
                alu::and(&mut self.regs.flags, value, imm);
                self.cycles += 1 + memory;
            }
            2 => {
                self.set_rm(bus, loc, T::from_u32(!value.to_u32()));
                self.cycles += 1 + memory * 2;
            }
            3 => {
                let result = alu::neg(&mut self.regs.flags, value);
                self.set_rm(bus, loc, result);
                self.cycles += 1 + memory * 2;
            }
            4 => {
                let acc = T::reg(&self.regs, 0);
                let product = alu::mul(&mut self.regs.flags, acc, value);
                self.store_wide::<T>(product);
                self.cycles += 3 + memory;
            }
            5 => {
                let acc = T::reg(&self.regs, 0);
                let product = alu::imul(&mut self.regs.flags, acc, value);
                self.store_wide::<T>(product);
                self.cycles += 3 + memory;
            }
            6 => {
                self.cycles += (if T::BITS == 8 { 15 } else { 23 }) + memory;
                match alu::div(self.wide_accumulator::<T>(), value) {
                    Some((quotient, remainder)) => self.store_split(quotient, remainder),
                    None => self.software_interrupt(bus, VECTOR_DIVIDE_ERROR),
                }
            }
            _ => {
                self.cycles += (if T::BITS == 8 { 17 } else { 24 }) + memory;
                let dividend = if T::BITS == 8 {
                    i32::from(self.regs.ax as i16)
                } else {
                    self.wide_accumulator::<T>() as i32
                };
                match alu::idiv(dividend, value) {
                    Some((quotient, remainder)) => self.store_split(quotient, remainder),
                    None => self.software_interrupt(bus, VECTOR_DIVIDE_ERROR),
                }
            }
        }
    }

    /// Group 4 (0xFE): INC/DEC rm8.
    pub(super) fn group4<B: Bus>(&mut self, bus: &mut B) {
        let (modrm, loc) = self.decode_modrm(bus);
        if modrm.reg > 1 {
            self.cycles += 1;
            return;
        }
        let value: u8 = self.get_rm(bus, loc);
        let result = if modrm.reg == 0 {
            alu::inc(&mut self.regs.flags, value)
        } else {
            alu::dec(&mut self.regs.flags, value)
        };
        self.set_rm(bus, loc, result);
        self.cycles += if modrm.is_register() { 1 } else { 3 };
    }

    /// Group 5 (0xFF): INC, DEC, CALL, CALL far, JMP, JMP far, PUSH on rm16.
    pub(super) fn group5<B: Bus>(&mut self, bus: &mut B) {
        let (modrm, loc) = self.decode_modrm(bus);
        let memory = u32::from(!modrm.is_register());

        match modrm.reg {
            0 | 1 => {
                let value: u16 = self.get_rm(bus, loc);
                let result = if modrm.reg == 0 {
                    alu::inc(&mut self.regs.flags, value)
                } else {
                    alu::dec(&mut self.regs.flags, value)
                };
                self.set_rm(bus, loc, result);
                self.cycles += 1 + memory * 2;
            }
            2 => {
                let target: u16 = self.get_rm(bus, loc);
                self.push(bus, self.regs.ip);
                self.regs.ip = target;
                self.cycles += 5 + memory;
            }
            3 if memory == 1 => {
                let offset: u16 = self.get_rm(bus, loc);
                let segment: u16 = self.get_rm(bus, loc.advance(2));
                self.push(bus, self.regs.cs);
                self.push(bus, self.regs.ip);
                self.regs.cs = segment;
                self.regs.ip = offset;
                self.cycles += 12;
            }
            4 => {
                self.regs.ip = self.get_rm(bus, loc);
                self.cycles += 4 + memory;
            }
            5 if memory == 1 => {
                let offset: u16 = self.get_rm(bus, loc);
                let segment: u16 = self.get_rm(bus, loc.advance(2));
                self.regs.cs = segment;
                self.regs.ip = offset;
                self.cycles += 9;
            }
            6 => {
                let value: u16 = self.get_rm(bus, loc);
                self.push(bus, value);
                self.cycles += 1 + memory;
            }
            // Far forms with a register operand, and encoding 7
            _ => self.cycles += 1,
        }
    }

    /// Double-width accumulator: AX for byte operands, DX:AX for words.
    fn wide_accumulator<T: Width>(&self) -> u32 {
        if T::BITS == 8 {
            u32::from(self.regs.ax)
        } else {
            (u32::from(self.regs.dx) << 16) | u32::from(self.regs.ax)
        }
    }

    /// Store a double-width product into AX (bytes) or DX:AX (words).
    fn store_wide<T: Width>(&mut self, value: u32) {
        if T::BITS == 8 {
            self.regs.ax = value as u16;
        } else {
            self.regs.ax = value as u16;
            self.regs.dx = (value >> 16) as u16;
        }
    }

    /// Store a quotient and remainder: AL/AH for bytes, AX/DX for words.
    fn store_split<T: Width>(&mut self, quotient: T, remainder: T) {
        if T::BITS == 8 {
            self.regs.ax = ((remainder.to_u32() << 8) | quotient.to_u32()) as u16;
        } else {
            self.regs.ax = quotient.to_u32() as u16;
            self.regs.dx = remainder.to_u32() as u16;
        }
    }
}
