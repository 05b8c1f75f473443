//! V30MZ CPU core with per-instruction execution.
//!
//! # Step
//!
//! Each call to [`Cpu::step`] runs one instruction to completion:
//! 1. Fetch bytes while they are prefixes, queueing each one
//! 2. Dispatch the first non-prefix byte as the opcode
//! 3. Clear the prefix queue unless a repeated string instruction asked to
//!    run again (it rewinds IP onto its own opcode and keeps the queue)
//! 4. Take the single-step trap if TF was set when the instruction began
//!
//! A halted CPU burns one cycle per step without decoding anything.

mod execute;
mod group;
mod string;

use emu_core::{Bus, Cpu, Observable, Ticks, Value};

use crate::alu::Width;
use crate::flags::{AF, CF, DF, IF, OF, PF, SF, TF, ZF};
use crate::modrm::Location;
use crate::prefix::{self, PrefixQueue};
use crate::registers::{Reg8, Reg16, Registers, Segment, physical};

/// Cycles charged for entering a hardware interrupt or trap.
pub const INTERRUPT_CYCLES: u32 = 32;

/// Interrupt vector raised on divide error.
pub const VECTOR_DIVIDE_ERROR: u8 = 0;
/// Interrupt vector raised after an instruction when TF is set.
pub const VECTOR_SINGLE_STEP: u8 = 1;
/// Interrupt vector of the one-byte INT3 breakpoint.
pub const VECTOR_BREAKPOINT: u8 = 3;
/// Interrupt vector of INTO when OF is set.
pub const VECTOR_OVERFLOW: u8 = 4;
/// Interrupt vector raised by BOUND on an out-of-range index.
pub const VECTOR_BOUND: u8 = 5;

/// NEC V30MZ CPU.
///
/// The CPU does not own the bus. The bus is passed to `step()` so the machine
/// can route memory and ports to its peripherals and still reach them between
/// instructions.
pub struct V30MZ {
    /// Register file.
    pub regs: Registers,

    /// True after HLT until an interrupt is taken.
    halted: bool,

    // === Instruction decode state ===
    /// Prefixes of the current (or repeating) instruction.
    prefixes: PrefixQueue,
    /// Set by a repeated string instruction that wants another iteration.
    prefix_carry: bool,
    /// Opcode of the last dispatched instruction.
    opcode: u8,

    // === Timing ===
    /// Cycles accumulated by the instruction being executed.
    cycles: u32,
    /// Interrupt entry cost incurred between steps, reported by the next one.
    deferred_cycles: u32,
    /// Total cycles elapsed.
    total_cycles: Ticks,
}

impl V30MZ {
    /// Create a new V30MZ in its power-on state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            halted: false,
            prefixes: PrefixQueue::new(),
            prefix_carry: false,
            opcode: 0,
            cycles: 0,
            deferred_cycles: 0,
            total_cycles: Ticks::ZERO,
        }
    }

    /// Total cycles elapsed since creation.
    #[must_use]
    pub const fn total_cycles(&self) -> Ticks {
        self.total_cycles
    }

    /// Prefix bytes currently queued (non-empty between steps only while a
    /// repeated string instruction is in progress).
    #[must_use]
    pub fn pending_prefixes(&self) -> Vec<u8> {
        self.prefixes.to_vec()
    }

    /// Leave the halted state without taking an interrupt.
    pub fn wake(&mut self) {
        self.halted = false;
    }

    /// Point execution at `segment:offset`.
    pub fn jump_to(&mut self, segment: u16, offset: u16) {
        self.regs.cs = segment;
        self.regs.ip = offset;
        self.prefixes.clear();
        self.prefix_carry = false;
    }

    // === Bus access ===

    pub(crate) fn read_byte<B: Bus>(bus: &mut B, segment: u16, offset: u16) -> u8 {
        bus.read(physical(segment, offset))
    }

    pub(crate) fn write_byte<B: Bus>(bus: &mut B, segment: u16, offset: u16, value: u8) {
        bus.write(physical(segment, offset), value);
    }

    /// Word read, low byte first. The high byte's offset wraps in the segment.
    pub(crate) fn read_word<B: Bus>(bus: &mut B, segment: u16, offset: u16) -> u16 {
        let lo = Self::read_byte(bus, segment, offset);
        let hi = Self::read_byte(bus, segment, offset.wrapping_add(1));
        u16::from(lo) | (u16::from(hi) << 8)
    }

    pub(crate) fn write_word<B: Bus>(bus: &mut B, segment: u16, offset: u16, value: u16) {
        Self::write_byte(bus, segment, offset, value as u8);
        Self::write_byte(bus, segment, offset.wrapping_add(1), (value >> 8) as u8);
    }

    pub(crate) fn fetch8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = Self::read_byte(bus, self.regs.cs, self.regs.ip);
        self.regs.ip = self.regs.ip.wrapping_add(1);
        value
    }

    pub(crate) fn fetch16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    pub(crate) fn push<B: Bus>(&mut self, bus: &mut B, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        Self::write_word(bus, self.regs.ss, self.regs.sp, value);
    }

    pub(crate) fn pop<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let value = Self::read_word(bus, self.regs.ss, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        value
    }

    /// Segment named by the most recent segment prefix, if any.
    pub(crate) fn segment_override(&self) -> Option<Segment> {
        self.prefixes.segment_override()
    }

    /// Segment for a data access: the override prefix, else `default`.
    pub(crate) fn data_segment(&self, default: Segment) -> u16 {
        let seg = self.segment_override().unwrap_or(default);
        self.regs.segment(seg)
    }

    /// Read an operand of width `T` from a resolved location.
    pub(crate) fn get_rm<T: Access, B: Bus>(&mut self, bus: &mut B, loc: Location) -> T {
        match loc {
            Location::Register(index) => T::reg(&self.regs, index),
            Location::Memory { segment, offset } => {
                T::load(bus, self.regs.segment(segment), offset)
            }
        }
    }

    /// Write an operand of width `T` to a resolved location.
    pub(crate) fn set_rm<T: Access, B: Bus>(&mut self, bus: &mut B, loc: Location, value: T) {
        match loc {
            Location::Register(index) => T::set_reg(&mut self.regs, index, value),
            Location::Memory { segment, offset } => {
                T::store(bus, self.regs.segment(segment), offset, value);
            }
        }
    }

    // === Interrupts ===

    /// Push FLAGS, CS and IP, mask interrupts and traps, and jump through
    /// the vector table at `vector * 4`.
    fn enter_interrupt<B: Bus>(&mut self, bus: &mut B, vector: u8) {
        self.halted = false;

        let flags = self.regs.flags.to_word();
        self.push(bus, flags);
        self.push(bus, self.regs.cs);
        self.push(bus, self.regs.ip);
        self.regs.flags.clear(IF | TF);

        let entry = u16::from(vector) * 4;
        self.regs.ip = Self::read_word(bus, 0, entry);
        self.regs.cs = Self::read_word(bus, 0, entry + 2);
    }

    /// Interrupt raised by the instruction being executed (INT, INTO, BOUND,
    /// divide error). Its prefixes belong to this instruction, so nothing is
    /// rewound.
    pub(crate) fn software_interrupt<B: Bus>(&mut self, bus: &mut B, vector: u8) {
        self.enter_interrupt(bus, vector);
    }

    // === Condition codes ===

    /// Evaluate a Jcc condition (low nibble of opcodes 0x70-0x7F).
    pub(crate) fn condition(&self, cc: u8) -> bool {
        let f = self.regs.flags;
        let result = match cc >> 1 {
            0 => f.overflow(),
            1 => f.carry(),
            2 => f.zero(),
            3 => f.carry() || f.zero(),
            4 => f.sign(),
            5 => f.parity(),
            6 => f.sign() != f.overflow(),
            _ => f.zero() || f.sign() != f.overflow(),
        };
        // Odd condition codes are the negated form.
        result != (cc & 1 != 0)
    }
}

impl Default for V30MZ {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu for V30MZ {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.cycles = 0;
        let deferred = std::mem::take(&mut self.deferred_cycles);

        if self.halted {
            let consumed = deferred + 1;
            self.total_cycles += consumed;
            return consumed;
        }

        let trap = self.regs.flags.trap();
        self.prefix_carry = false;

        let opcode = loop {
            let byte = self.fetch8(bus);
            if !prefix::is_prefix(byte) {
                break byte;
            }
            self.prefixes.push(byte);
            self.cycles += 1;
        };
        self.opcode = opcode;
        self.execute(bus, opcode);

        if !self.prefix_carry {
            self.prefixes.clear();
        }

        if trap {
            self.interrupt(bus, VECTOR_SINGLE_STEP);
        }

        let consumed = deferred + self.cycles + std::mem::take(&mut self.deferred_cycles);
        self.total_cycles += consumed;
        consumed
    }

    fn pc(&self) -> u32 {
        self.regs.code_address()
    }

    fn registers(&self) -> Self::Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    /// Enter an interrupt from outside the instruction stream.
    ///
    /// If a repeated string instruction is mid-flight, IP is moved back over
    /// its prefixes so the handler returns to the whole instruction.
    fn interrupt<B: Bus>(&mut self, bus: &mut B, vector: u8) {
        if !self.prefixes.is_empty() {
            self.regs.ip = self.regs.ip.wrapping_sub(self.prefixes.len() as u16);
            self.prefixes.clear();
        }
        self.prefix_carry = false;
        self.enter_interrupt(bus, vector);
        self.deferred_cycles += INTERRUPT_CYCLES;
    }

    fn reset(&mut self) {
        self.regs = Registers::new();
        self.halted = false;
        self.prefixes.clear();
        self.prefix_carry = false;
        self.opcode = 0;
        self.cycles = 0;
        self.deferred_cycles = 0;
    }
}

/// Width-generic register, memory and port access for instruction handlers.
pub(crate) trait Access: Width {
    /// Operand size in bytes (string pointer step).
    const SIZE: u16;

    fn reg(regs: &Registers, index: u8) -> Self;
    fn set_reg(regs: &mut Registers, index: u8, value: Self);
    fn load<B: Bus>(bus: &mut B, segment: u16, offset: u16) -> Self;
    fn store<B: Bus>(bus: &mut B, segment: u16, offset: u16, value: Self);
    fn fetch<B: Bus>(cpu: &mut V30MZ, bus: &mut B) -> Self;
    fn port_in<B: Bus>(bus: &mut B, port: u8) -> Self;
    fn port_out<B: Bus>(bus: &mut B, port: u8, value: Self);
}

impl Access for u8 {
    const SIZE: u16 = 1;

    fn reg(regs: &Registers, index: u8) -> Self {
        regs.get8(Reg8::from_index(index))
    }

    fn set_reg(regs: &mut Registers, index: u8, value: Self) {
        regs.set8(Reg8::from_index(index), value);
    }

    fn load<B: Bus>(bus: &mut B, segment: u16, offset: u16) -> Self {
        V30MZ::read_byte(bus, segment, offset)
    }

    fn store<B: Bus>(bus: &mut B, segment: u16, offset: u16, value: Self) {
        V30MZ::write_byte(bus, segment, offset, value);
    }

    fn fetch<B: Bus>(cpu: &mut V30MZ, bus: &mut B) -> Self {
        cpu.fetch8(bus)
    }

    fn port_in<B: Bus>(bus: &mut B, port: u8) -> Self {
        bus.io_read(port)
    }

    fn port_out<B: Bus>(bus: &mut B, port: u8, value: Self) {
        bus.io_write(port, value);
    }
}

impl Access for u16 {
    const SIZE: u16 = 2;

    fn reg(regs: &Registers, index: u8) -> Self {
        regs.get16(Reg16::from_index(index))
    }

    fn set_reg(regs: &mut Registers, index: u8, value: Self) {
        regs.set16(Reg16::from_index(index), value);
    }

    fn load<B: Bus>(bus: &mut B, segment: u16, offset: u16) -> Self {
        V30MZ::read_word(bus, segment, offset)
    }

    fn store<B: Bus>(bus: &mut B, segment: u16, offset: u16, value: Self) {
        V30MZ::write_word(bus, segment, offset, value);
    }

    fn fetch<B: Bus>(cpu: &mut V30MZ, bus: &mut B) -> Self {
        cpu.fetch16(bus)
    }

    /// Word port reads take the low byte from `port` and the high byte
    /// from `port + 1`.
    fn port_in<B: Bus>(bus: &mut B, port: u8) -> Self {
        let lo = bus.io_read(port);
        let hi = bus.io_read(port.wrapping_add(1));
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn port_out<B: Bus>(bus: &mut B, port: u8, value: Self) {
        bus.io_write(port, value as u8);
        bus.io_write(port.wrapping_add(1), (value >> 8) as u8);
    }
}

/// All query paths supported by the V30MZ.
const V30MZ_QUERY_PATHS: &[&str] = &[
    // General registers
    "ax", "cx", "dx", "bx", "sp", "bp", "si", "di",
    // Byte halves
    "al", "cl", "dl", "bl", "ah", "ch", "dh", "bh",
    // Segments and program counter
    "es", "cs", "ss", "ds", "ip", "pc",
    // Flags
    "flags", "flags.c", "flags.p", "flags.a", "flags.z", "flags.s",
    "flags.t", "flags.i", "flags.d", "flags.o",
    // CPU state
    "halted", "cycles", "opcode", "prefixes",
];

impl Observable for V30MZ {
    fn query(&self, path: &str) -> Option<Value> {
        let r = &self.regs;
        match path {
            "ax" => Some(r.ax.into()),
            "cx" => Some(r.cx.into()),
            "dx" => Some(r.dx.into()),
            "bx" => Some(r.bx.into()),
            "sp" => Some(r.sp.into()),
            "bp" => Some(r.bp.into()),
            "si" => Some(r.si.into()),
            "di" => Some(r.di.into()),

            "al" => Some(r.get8(Reg8::Al).into()),
            "cl" => Some(r.get8(Reg8::Cl).into()),
            "dl" => Some(r.get8(Reg8::Dl).into()),
            "bl" => Some(r.get8(Reg8::Bl).into()),
            "ah" => Some(r.get8(Reg8::Ah).into()),
            "ch" => Some(r.get8(Reg8::Ch).into()),
            "dh" => Some(r.get8(Reg8::Dh).into()),
            "bh" => Some(r.get8(Reg8::Bh).into()),

            "es" => Some(r.es.into()),
            "cs" => Some(r.cs.into()),
            "ss" => Some(r.ss.into()),
            "ds" => Some(r.ds.into()),
            "ip" => Some(r.ip.into()),
            "pc" => Some(r.code_address().into()),

            "flags" => Some(r.flags.to_word().into()),
            "flags.c" => Some(r.flags.is_set(CF).into()),
            "flags.p" => Some(r.flags.is_set(PF).into()),
            "flags.a" => Some(r.flags.is_set(AF).into()),
            "flags.z" => Some(r.flags.is_set(ZF).into()),
            "flags.s" => Some(r.flags.is_set(SF).into()),
            "flags.t" => Some(r.flags.is_set(TF).into()),
            "flags.i" => Some(r.flags.is_set(IF).into()),
            "flags.d" => Some(r.flags.is_set(DF).into()),
            "flags.o" => Some(r.flags.is_set(OF).into()),

            "halted" => Some(self.halted.into()),
            "cycles" => Some(self.total_cycles.get().into()),
            "opcode" => Some(self.opcode.into()),
            "prefixes" => Some(self.prefixes.to_vec().into()),

            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        V30MZ_QUERY_PATHS
    }
}
