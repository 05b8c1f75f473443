//! Unit tests for individual V30MZ instructions.
//!
//! Programs run from 0000:0100 with the stack at 0000:8000 on a flat 1 MiB
//! bus.

use emu_core::{Bus, Cpu, Observable, SimpleBus, Value};
use nec_v30mz::{CF, IF, TF, V30MZ, ZF};

const CODE: u32 = 0x0100;

fn setup(code: &[u8]) -> (V30MZ, SimpleBus) {
    let mut bus = SimpleBus::new();
    bus.load(CODE, code);

    let mut cpu = V30MZ::new();
    cpu.jump_to(0x0000, CODE as u16);
    cpu.regs.sp = 0x8000;
    (cpu, bus)
}

/// Point interrupt `vector` at `segment:offset`.
fn set_vector(bus: &mut SimpleBus, vector: u8, segment: u16, offset: u16) {
    let [off_lo, off_hi] = offset.to_le_bytes();
    let [seg_lo, seg_hi] = segment.to_le_bytes();
    bus.load(u32::from(vector) * 4, &[off_lo, off_hi, seg_lo, seg_hi]);
}

/// Run until HLT, return total cycles.
fn run_until_halt(cpu: &mut V30MZ, bus: &mut SimpleBus) -> u32 {
    let mut cycles = 0;
    let mut count = 0;
    while !cpu.is_halted() && count < 10_000 {
        cycles += cpu.step(bus);
        count += 1;
    }
    cycles
}

/// Bus wrapper that counts memory accesses.
struct CountingBus {
    inner: SimpleBus,
    reads: usize,
    writes: usize,
}

impl Bus for CountingBus {
    fn read(&mut self, address: u32) -> u8 {
        self.reads += 1;
        self.inner.read(address)
    }

    fn write(&mut self, address: u32, value: u8) {
        self.writes += 1;
        self.inner.write(address, value);
    }

    fn io_read(&mut self, port: u8) -> u8 {
        self.inner.io_read(port)
    }

    fn io_write(&mut self, port: u8, value: u8) {
        self.inner.io_write(port, value);
    }
}

// === Power-on and basic stepping ===

#[test]
fn test_power_on_state() {
    let cpu = V30MZ::new();
    assert_eq!(cpu.regs.cs, 0xFFFF);
    assert_eq!(cpu.regs.ip, 0x0000);
    assert_eq!(cpu.pc(), 0xFFFF0);
    assert_eq!(cpu.regs.flags.to_word(), 0xF002);
    assert!(!cpu.is_halted());
}

#[test]
fn test_reset_restores_power_on_state() {
    let (mut cpu, mut bus) = setup(&[0xB8, 0x34, 0x12, 0xF4]);
    run_until_halt(&mut cpu, &mut bus);
    cpu.reset();
    assert_eq!(cpu.regs.ax, 0);
    assert_eq!(cpu.regs.cs, 0xFFFF);
    assert!(!cpu.is_halted());
}

#[test]
fn test_hlt_then_one_cycle_per_step() {
    let (mut cpu, mut bus) = setup(&[0xF4, 0x90]);
    assert_eq!(cpu.step(&mut bus), 9);
    assert!(cpu.is_halted());
    assert_eq!(cpu.step(&mut bus), 1);
    assert_eq!(cpu.step(&mut bus), 1);
    assert_eq!(cpu.regs.ip, 0x0101);
}

#[test]
fn test_interrupt_wakes_halted_cpu() {
    let (mut cpu, mut bus) = setup(&[0xF4]);
    set_vector(&mut bus, 0x20, 0x0000, 0x0700);
    bus.load(0x0700, &[0x90]);

    cpu.step(&mut bus);
    assert!(cpu.is_halted());

    cpu.interrupt(&mut bus, 0x20);
    assert!(!cpu.is_halted());
    assert_eq!(bus.peek_word(0x7FFA), 0x0101);

    // Entry cost is reported by the next step.
    assert_eq!(cpu.step(&mut bus), 32 + 1);
    assert_eq!(cpu.regs.ip, 0x0701);
}

// === Data movement ===

#[test]
fn test_mov_reg_imm() {
    let (mut cpu, mut bus) = setup(&[
        0xB0, 0x12, // MOV AL, 12h
        0xB4, 0x34, // MOV AH, 34h
        0xBB, 0xCD, 0xAB, // MOV BX, ABCDh
        0xF4,
    ]);
    let cycles = run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x3412);
    assert_eq!(cpu.regs.bx, 0xABCD);
    assert_eq!(cycles, 3 + 9);
}

#[test]
fn test_addressing_modes_round_trip() {
    // (rm, base offset, SS-relative)
    let bases: [(u8, u16, bool); 8] = [
        (0, 0x1000 + 0x0030, false),
        (1, 0x1000 + 0x0004, false),
        (2, 0x2000 + 0x0030, true),
        (3, 0x2000 + 0x0004, true),
        (4, 0x0030, false),
        (5, 0x0004, false),
        (6, 0x2000, true),
        (7, 0x1000, false),
    ];

    for mode in 0..=2u8 {
        for &(rm, base, stack) in &bases {
            let modrm_ax = (mode << 6) | rm;
            let modrm_cx = (mode << 6) | (1 << 3) | rm;

            let (displacement, offset, ss_relative): (Vec<u8>, u16, bool) = match (mode, rm) {
                (0, 6) => (vec![0x00, 0x40], 0x4000, false),
                (0, _) => (vec![], base, stack),
                (1, _) => (vec![0xFE], base.wrapping_sub(2), stack),
                _ => (vec![0x34, 0x12], base.wrapping_add(0x1234), stack),
            };

            let mut code = vec![0x89, modrm_ax];
            code.extend(&displacement);
            code.extend([0x8B, modrm_cx]);
            code.extend(&displacement);
            code.push(0xF4);

            let (mut cpu, mut bus) = setup(&code);
            cpu.regs.ax = 0xBEEF;
            cpu.regs.bx = 0x1000;
            cpu.regs.bp = 0x2000;
            cpu.regs.si = 0x0030;
            cpu.regs.di = 0x0004;
            cpu.regs.ds = 0x0100;
            cpu.regs.ss = 0x0200;
            run_until_halt(&mut cpu, &mut bus);

            let segment: u32 = if ss_relative { 0x2000 } else { 0x1000 };
            let address = segment + u32::from(offset);
            assert_eq!(
                bus.peek_word(address),
                0xBEEF,
                "mod={mode} rm={rm} expected store at {address:05X}"
            );
            assert_eq!(cpu.regs.cx, 0xBEEF, "mod={mode} rm={rm} load");
        }
    }
}

#[test]
fn test_register_operand_makes_no_memory_access() {
    let mut inner = SimpleBus::new();
    inner.load(CODE, &[0x89, 0xC1, 0x01, 0xC1]); // MOV CX, AX; ADD CX, AX
    let mut bus = CountingBus {
        inner,
        reads: 0,
        writes: 0,
    };
    let mut cpu = V30MZ::new();
    cpu.jump_to(0x0000, CODE as u16);
    cpu.regs.ax = 0x0101;

    cpu.step(&mut bus);
    cpu.step(&mut bus);

    // Opcode and ModRM fetches only.
    assert_eq!(bus.reads, 4);
    assert_eq!(bus.writes, 0);
    assert_eq!(cpu.regs.cx, 0x0202);
}

#[test]
fn test_last_segment_prefix_wins() {
    let (mut cpu, mut bus) = setup(&[0x26, 0x2E, 0x8A, 0x07, 0xF4]); // ES: CS: MOV AL, [BX]
    cpu.regs.bx = 0x0050;
    cpu.regs.ds = 0x1000;
    cpu.regs.es = 0x2000;
    bus.load(0x00050, &[0xAA]);
    bus.load(0x10050, &[0xBB]);
    bus.load(0x20050, &[0xCC]);

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.al(), 0xAA);
}

#[test]
fn test_bp_defaults_to_stack_segment() {
    let (mut cpu, mut bus) = setup(&[0x8B, 0x46, 0x02, 0xF4]); // MOV AX, [BP+2]
    cpu.regs.bp = 0x0010;
    cpu.regs.ss = 0x3000;
    cpu.regs.ds = 0x1000;
    bus.load(0x30012, &[0x78, 0x56]);

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x5678);
}

#[test]
fn test_word_access_wraps_within_segment() {
    let (mut cpu, mut bus) = setup(&[0xA1, 0xFF, 0xFF, 0xF4]); // MOV AX, [FFFFh]
    cpu.regs.ds = 0x1000;
    bus.load(0x1FFFF, &[0x34]);
    bus.load(0x10000, &[0x12]);

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x1234);
}

#[test]
fn test_lds_loads_far_pointer() {
    let (mut cpu, mut bus) = setup(&[0xC5, 0x36, 0x00, 0x20, 0xF4]); // LDS SI, [2000h]
    bus.load(0x2000, &[0x78, 0x56, 0x34, 0x12]);

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.si, 0x5678);
    assert_eq!(cpu.regs.ds, 0x1234);
}

#[test]
fn test_xlat() {
    let (mut cpu, mut bus) = setup(&[0xD7, 0xF4]);
    cpu.regs.bx = 0x3000;
    cpu.regs.set_al(0x05);
    bus.load(0x3005, &[0x99]);

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.al(), 0x99);
}

// === Stack ===

#[test]
fn test_call_ret_near() {
    let (mut cpu, mut bus) = setup(&[
        0xE8, 0x03, 0x00, // CALL +3 -> 0106
        0xF4, // 0103
        0x90, 0x90, // padding
        0xB8, 0x34, 0x12, // 0106: MOV AX, 1234h
        0xC3, // RET
    ]);

    let cycles = run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x1234);
    assert_eq!(cpu.regs.ip, 0x0104);
    assert_eq!(cpu.regs.sp, 0x8000);
    assert_eq!(cycles, 5 + 1 + 6 + 9);
}

#[test]
fn test_call_ret_far() {
    let (mut cpu, mut bus) = setup(&[0x9A, 0x00, 0x02, 0x00, 0x00, 0xF4]); // CALL 0000:0200
    bus.load(0x0200, &[0xCB]); // RETF

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ip, 0x0106);
    assert_eq!(cpu.regs.sp, 0x8000);
}

#[test]
fn test_pusha_popa() {
    let (mut cpu, mut bus) = setup(&[
        0x60, // PUSHA
        0x31, 0xC0, // XOR AX, AX
        0x31, 0xDB, // XOR BX, BX
        0x61, // POPA
        0xF4,
    ]);
    cpu.regs.ax = 0x1111;
    cpu.regs.cx = 0x2222;
    cpu.regs.bx = 0x4444;
    cpu.regs.di = 0x8888;

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x1111);
    assert_eq!(cpu.regs.cx, 0x2222);
    assert_eq!(cpu.regs.bx, 0x4444);
    assert_eq!(cpu.regs.di, 0x8888);
    assert_eq!(cpu.regs.sp, 0x8000);
    // Stacked SP is the value before PUSHA.
    assert_eq!(bus.peek_word(0x7FF6), 0x8000);
}

#[test]
fn test_enter_leave() {
    let (mut cpu, mut bus) = setup(&[
        0xC8, 0x10, 0x00, 0x00, // ENTER 16, 0
        0xC9, // LEAVE
        0xC8, 0x04, 0x00, 0x01, // ENTER 4, 1
        0xF4,
    ]);
    cpu.regs.bp = 0x1111;

    assert_eq!(cpu.step(&mut bus), 7);
    assert_eq!(cpu.regs.bp, 0x7FFE);
    assert_eq!(cpu.regs.sp, 0x7FEE);
    assert_eq!(bus.peek_word(0x7FFE), 0x1111);

    cpu.step(&mut bus);
    assert_eq!(cpu.regs.sp, 0x8000);
    assert_eq!(cpu.regs.bp, 0x1111);

    cpu.step(&mut bus);
    assert_eq!(cpu.regs.bp, 0x7FFE);
    assert_eq!(bus.peek_word(0x7FFC), 0x7FFE);
    assert_eq!(cpu.regs.sp, 0x7FF8);
}

#[test]
fn test_popf_forces_fixed_bits() {
    let (mut cpu, mut bus) = setup(&[0x6A, 0x00, 0x9D, 0xF4]); // PUSH 0; POPF
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.flags.to_word(), 0xF002);
}

// === Arithmetic ===

#[test]
fn test_add_sets_flags() {
    let (mut cpu, mut bus) = setup(&[0x04, 0x01, 0xF4]); // ADD AL, 1
    cpu.regs.set_al(0x7F);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.al(), 0x80);
    assert!(cpu.regs.flags.overflow());
    assert!(cpu.regs.flags.sign());
    assert!(cpu.regs.flags.aux_carry());
    assert!(!cpu.regs.flags.carry());
}

#[test]
fn test_cmp_memory_does_not_write() {
    let (mut cpu, mut bus) = setup(&[0x38, 0x07, 0xF4]); // CMP [BX], AL
    cpu.regs.bx = 0x2000;
    cpu.regs.set_al(0x10);
    bus.load(0x2000, &[0x10]);

    assert_eq!(cpu.step(&mut bus), 2);
    assert!(cpu.regs.flags.zero());
    assert_eq!(bus.peek(0x2000), 0x10);
}

#[test]
fn test_group1_sign_extended_immediate() {
    let (mut cpu, mut bus) = setup(&[0x83, 0xC0, 0xFF, 0xF4]); // ADD AX, -1
    cpu.regs.ax = 0x0001;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x0000);
    assert!(cpu.regs.flags.zero());
    assert!(cpu.regs.flags.carry());
}

#[test]
fn test_mul_and_imul() {
    let (mut cpu, mut bus) = setup(&[
        0xF6, 0xE3, // MUL BL
        0xF4,
    ]);
    cpu.regs.set_al(0x80);
    cpu.regs.bx = 0x0004;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x0200);
    assert!(cpu.regs.flags.carry());

    let (mut cpu, mut bus) = setup(&[0xF7, 0xEB, 0xF4]); // IMUL BX
    cpu.regs.ax = 0xFFFF;
    cpu.regs.bx = 0x0002;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0xFFFE);
    assert_eq!(cpu.regs.dx, 0xFFFF);
    assert!(!cpu.regs.flags.carry());
}

#[test]
fn test_imul_three_operand() {
    let (mut cpu, mut bus) = setup(&[0x6B, 0xC3, 0xFD, 0xF4]); // IMUL AX, BX, -3
    cpu.regs.bx = 0x0005;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, (-15i16) as u16);
}

#[test]
fn test_div_by_zero_enters_vector_0() {
    let (mut cpu, mut bus) = setup(&[
        0xB3, 0x00, // MOV BL, 0
        0xF6, 0xF3, // DIV BL
        0xF4,
    ]);
    set_vector(&mut bus, 0, 0x0000, 0x0500);
    bus.load(0x0500, &[0xF4]);
    cpu.regs.ax = 0x1234;
    cpu.regs.flags.set(IF);

    run_until_halt(&mut cpu, &mut bus);

    assert_eq!(cpu.regs.ax, 0x1234);
    assert_eq!(cpu.regs.cs, 0x0000);
    assert_eq!(cpu.regs.ip, 0x0501);
    // One frame on the stack: return IP, CS, FLAGS.
    assert_eq!(cpu.regs.sp, 0x7FFA);
    assert_eq!(bus.peek_word(0x7FFA), 0x0104);
    assert_eq!(bus.peek_word(0x7FFC), 0x0000);
    assert_ne!(bus.peek_word(0x7FFE) & IF, 0);
    assert!(!cpu.regs.flags.interrupt_enable());
}

#[test]
fn test_div_quotient_overflow_enters_vector_0() {
    let (mut cpu, mut bus) = setup(&[0xF6, 0xF3, 0xF4]); // DIV BL
    set_vector(&mut bus, 0, 0x0000, 0x0500);
    bus.load(0x0500, &[0xF4]);
    cpu.regs.ax = 0x1000;
    cpu.regs.bx = 0x0010;

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x1000);
    assert_eq!(cpu.regs.ip, 0x0501);
}

#[test]
fn test_idiv_signed_range() {
    // -32768 / -1 does not fit a byte quotient.
    let (mut cpu, mut bus) = setup(&[0xF6, 0xFB, 0xF4]); // IDIV BL
    set_vector(&mut bus, 0, 0x0000, 0x0500);
    bus.load(0x0500, &[0xF4]);
    cpu.regs.ax = 0x8000;
    cpu.regs.bx = 0x00FF;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x8000);
    assert_eq!(cpu.regs.ip, 0x0501);

    // -128 / 1 is the most negative quotient that fits.
    let (mut cpu, mut bus) = setup(&[0xF6, 0xFB, 0xF4]);
    cpu.regs.ax = 0xFF80;
    cpu.regs.bx = 0x0001;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x0080);
    assert_eq!(cpu.regs.ip, 0x0103);

    // -7 / 2 = -3 remainder -1.
    let (mut cpu, mut bus) = setup(&[0xF6, 0xFB, 0xF4]);
    cpu.regs.ax = (-7i16) as u16;
    cpu.regs.bx = 0x0002;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.al(), (-3i8) as u8);
    assert_eq!(cpu.regs.ah(), (-1i8) as u8);
}

#[test]
fn test_shift_count_masked_to_five_bits() {
    let (mut cpu, mut bus) = setup(&[
        0xB1, 0x21, // MOV CL, 21h
        0xD2, 0xE0, // SHL AL, CL
        0xF4,
    ]);
    cpu.regs.set_al(0x01);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.al(), 0x02);
}

#[test]
fn test_shift_by_zero_keeps_flags() {
    let (mut cpu, mut bus) = setup(&[0xC0, 0xE0, 0x00, 0xF4]); // SHL AL, 0
    cpu.regs.set_al(0x81);
    cpu.regs.flags.set(CF | ZF);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.al(), 0x81);
    assert!(cpu.regs.flags.carry());
    assert!(cpu.regs.flags.zero());
}

#[test]
fn test_aam_aad_always_base_ten() {
    let (mut cpu, mut bus) = setup(&[
        0xD4, 0x10, // AAM 16 (treated as 10)
        0xF4,
    ]);
    cpu.regs.set_al(37);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x0307);

    let (mut cpu, mut bus) = setup(&[0xD5, 0x10, 0xF4]); // AAD 16
    cpu.regs.ax = 0x0307;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x0025);
}

#[test]
fn test_daa() {
    let (mut cpu, mut bus) = setup(&[0x04, 0x27, 0x27, 0xF4]); // ADD AL, 27h; DAA
    cpu.regs.set_al(0x15);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.al(), 0x42);
}

// === Control flow ===

#[test]
fn test_conditional_jump_timing() {
    let code = [0x74, 0x02, 0x90, 0x90, 0xF4]; // JZ +2

    let (mut cpu, mut bus) = setup(&code);
    assert_eq!(cpu.step(&mut bus), 1);
    assert_eq!(cpu.regs.ip, 0x0102);

    let (mut cpu, mut bus) = setup(&code);
    cpu.regs.flags.set(ZF);
    assert_eq!(cpu.step(&mut bus), 4);
    assert_eq!(cpu.regs.ip, 0x0104);
}

#[test]
fn test_loop_counts_down() {
    let (mut cpu, mut bus) = setup(&[
        0x40, // INC AX
        0xE2, 0xFD, // LOOP -3
        0xF4,
    ]);
    cpu.regs.cx = 5;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 5);
    assert_eq!(cpu.regs.cx, 0);
}

#[test]
fn test_bound() {
    let code = [0x62, 0x06, 0x00, 0x20, 0xF4]; // BOUND AX, [2000h]

    let (mut cpu, mut bus) = setup(&code);
    bus.load(0x2000, &[0x10, 0x00, 0x20, 0x00]);
    set_vector(&mut bus, 5, 0x0000, 0x0900);
    bus.load(0x0900, &[0xF4]);
    cpu.regs.ax = 0x0015;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ip, 0x0105);

    let (mut cpu, mut bus) = setup(&code);
    bus.load(0x2000, &[0x10, 0x00, 0x20, 0x00]);
    set_vector(&mut bus, 5, 0x0000, 0x0900);
    bus.load(0x0900, &[0xF4]);
    cpu.regs.ax = 0x0030;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ip, 0x0901);
}

#[test]
fn test_undefined_opcodes_are_one_cycle_nops() {
    let (mut cpu, mut bus) = setup(&[
        0x0F, 0x63, 0x64, 0xF1, 0x9B, // undefined / POLL
        0xD8, 0x06, 0x34, 0x12, // escape with direct address
        0xF4,
    ]);
    for _ in 0..6 {
        assert_eq!(cpu.step(&mut bus), 1);
    }
    assert_eq!(cpu.regs.ip, 0x0109);
}

#[test]
fn test_invalid_group_members_are_nops() {
    let (mut cpu, mut bus) = setup(&[
        0xD0, 0xF0, // group 2 /6
        0xFF, 0xD8, // CALL far with register operand
        0xFE, 0xD0, // group 4 /2
        0xF4,
    ]);
    cpu.regs.ax = 0x1234;
    for _ in 0..3 {
        assert_eq!(cpu.step(&mut bus), 1);
    }
    assert_eq!(cpu.regs.ax, 0x1234);
    assert_eq!(cpu.regs.sp, 0x8000);
    assert_eq!(cpu.regs.ip, 0x0106);
}

// === Interrupts ===

#[test]
fn test_interrupt_push_order() {
    let (mut cpu, mut bus) = setup(&[]);
    cpu.jump_to(0x1234, 0x0010);
    cpu.regs.flags.set(IF | CF);
    set_vector(&mut bus, 0x10, 0x2000, 0x0040);

    cpu.interrupt(&mut bus, 0x10);

    assert_eq!(cpu.regs.sp, 0x7FFA);
    assert_eq!(bus.peek_word(0x7FFA), 0x0010);
    assert_eq!(bus.peek_word(0x7FFC), 0x1234);
    assert_eq!(bus.peek_word(0x7FFE), 0xF203);
    assert_eq!(cpu.regs.cs, 0x2000);
    assert_eq!(cpu.regs.ip, 0x0040);
    assert!(!cpu.regs.flags.interrupt_enable());
}

#[test]
fn test_int_and_iret() {
    let (mut cpu, mut bus) = setup(&[0xCD, 0x21, 0xF4]); // INT 21h
    set_vector(&mut bus, 0x21, 0x0000, 0x0600);
    bus.load(0x0600, &[0xB8, 0x01, 0x00, 0xCF]); // MOV AX, 1; IRET
    cpu.regs.flags.set(IF);

    assert_eq!(cpu.step(&mut bus), 10);
    assert!(!cpu.regs.flags.interrupt_enable());

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 1);
    assert_eq!(cpu.regs.ip, 0x0103);
    assert!(cpu.regs.flags.interrupt_enable());
}

#[test]
fn test_trap_flag_single_steps() {
    let (mut cpu, mut bus) = setup(&[0x90]);
    set_vector(&mut bus, 1, 0x0000, 0x0800);
    cpu.regs.flags.set(TF);

    assert_eq!(cpu.step(&mut bus), 1 + 32);
    assert_eq!(cpu.regs.ip, 0x0800);
    assert!(!cpu.regs.flags.trap());
    assert_eq!(bus.peek_word(0x7FFA), 0x0101);
    assert_ne!(bus.peek_word(0x7FFE) & TF, 0);
}

// === String instructions ===

#[test]
fn test_rep_movsb_one_element_per_step() {
    let (mut cpu, mut bus) = setup(&[0xF3, 0xA4, 0xF4]); // REP MOVSB
    bus.load(0x2000, &[1, 2, 3, 4, 5]);
    cpu.regs.si = 0x2000;
    cpu.regs.di = 0x3000;
    cpu.regs.cx = 5;

    assert_eq!(cpu.step(&mut bus), 1 + 5);
    assert_eq!(cpu.regs.ip, 0x0101);
    assert_eq!(cpu.pending_prefixes(), vec![0xF3]);

    for _ in 0..4 {
        assert_eq!(cpu.step(&mut bus), 5);
    }
    assert_eq!(cpu.regs.ip, 0x0102);
    assert!(cpu.pending_prefixes().is_empty());

    assert_eq!(cpu.regs.cx, 0);
    assert_eq!(cpu.regs.si, 0x2005);
    assert_eq!(cpu.regs.di, 0x3005);
    for i in 0..5 {
        assert_eq!(bus.peek(0x3000 + i), (i + 1) as u8);
    }
}

#[test]
fn test_rep_with_zero_count_does_nothing() {
    let (mut cpu, mut bus) = setup(&[0xF3, 0xA4, 0xF4]);
    bus.load(0x2000, &[0xAA]);
    cpu.regs.si = 0x2000;
    cpu.regs.di = 0x3000;

    cpu.step(&mut bus);
    assert_eq!(cpu.regs.ip, 0x0102);
    assert_eq!(cpu.regs.si, 0x2000);
    assert_eq!(bus.peek(0x3000), 0x00);
}

#[test]
fn test_repe_cmpsb_stops_on_mismatch() {
    let (mut cpu, mut bus) = setup(&[0xF3, 0xA6, 0xF4]); // REPE CMPSB
    bus.load(0x2000, b"ABCX");
    bus.load(0x3000, b"ABCD");
    cpu.regs.si = 0x2000;
    cpu.regs.di = 0x3000;
    cpu.regs.cx = 10;

    let mut steps = 0;
    while cpu.regs.ip != 0x0102 {
        cpu.step(&mut bus);
        steps += 1;
    }
    assert_eq!(steps, 4);
    assert_eq!(cpu.regs.cx, 6);
    assert_eq!(cpu.regs.si, 0x2004);
    assert!(!cpu.regs.flags.zero());
}

#[test]
fn test_repne_scasb_finds_byte() {
    let (mut cpu, mut bus) = setup(&[0xF2, 0xAE, 0xF4]); // REPNE SCASB
    bus.load(0x3000, b"ABCD");
    cpu.regs.set_al(b'C');
    cpu.regs.di = 0x3000;
    cpu.regs.cx = 4;

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.cx, 1);
    assert_eq!(cpu.regs.di, 0x3003);
    assert!(cpu.regs.flags.zero());
}

#[test]
fn test_string_direction_flag() {
    let (mut cpu, mut bus) = setup(&[0xFD, 0xAB, 0xF4]); // STD; STOSW
    cpu.regs.ax = 0xBEEF;
    cpu.regs.di = 0x3000;
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(bus.peek_word(0x3000), 0xBEEF);
    assert_eq!(cpu.regs.di, 0x2FFE);
}

#[test]
fn test_string_destination_ignores_override() {
    let (mut cpu, mut bus) = setup(&[0x2E, 0xA4, 0xF4]); // CS: MOVSB
    cpu.regs.ds = 0x1000;
    cpu.regs.es = 0x2000;
    cpu.regs.si = 0x0500;
    cpu.regs.di = 0x0010;
    bus.load(0x00500, &[0x11]); // CS:SI
    bus.load(0x10500, &[0x22]); // DS:SI

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(bus.peek(0x20010), 0x11);
    assert_eq!(bus.peek(0x00010), 0x00);
}

#[test]
fn test_interrupt_during_rep_returns_to_prefixes() {
    let (mut cpu, mut bus) = setup(&[0x26, 0xF3, 0xA4, 0xF4]); // ES: REP MOVSB
    set_vector(&mut bus, 8, 0x0000, 0x0600);
    bus.load(0x0600, &[0xCF]); // IRET
    bus.load(0x2000, &[7, 8, 9]);
    cpu.regs.si = 0x2000;
    cpu.regs.di = 0x3000;
    cpu.regs.cx = 3;

    assert_eq!(cpu.step(&mut bus), 2 + 5);
    assert_eq!(cpu.regs.ip, 0x0102);

    cpu.interrupt(&mut bus, 8);
    assert_eq!(bus.peek_word(0x7FFA), 0x0100);
    assert!(cpu.pending_prefixes().is_empty());

    assert_eq!(cpu.step(&mut bus), 32 + 10);
    assert_eq!(cpu.regs.ip, 0x0100);

    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.cx, 0);
    assert_eq!(cpu.regs.di, 0x3003);
    assert_eq!(bus.peek(0x3002), 9);
}

// === Ports ===

#[test]
fn test_word_port_io() {
    let (mut cpu, mut bus) = setup(&[
        0xE5, 0x40, // IN AX, 40h
        0xE7, 0x50, // OUT 50h, AX
        0xF4,
    ]);
    bus.set_port(0x40, 0x34);
    bus.set_port(0x41, 0x12);

    let cycles = run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.ax, 0x1234);
    assert_eq!(bus.port(0x50), 0x34);
    assert_eq!(bus.port(0x51), 0x12);
    assert_eq!(cycles, 6 + 6 + 9);
}

#[test]
fn test_dx_port_uses_low_byte() {
    let (mut cpu, mut bus) = setup(&[0xEE, 0xF4]); // OUT DX, AL
    cpu.regs.dx = 0x12B5;
    cpu.regs.set_al(0x5A);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(bus.port(0xB5), 0x5A);
}

// === Observation ===

#[test]
fn test_observable_paths() {
    let (mut cpu, mut bus) = setup(&[0xB8, 0x34, 0x12, 0xF4]);
    run_until_halt(&mut cpu, &mut bus);

    assert_eq!(cpu.query("ax"), Some(Value::U16(0x1234)));
    assert_eq!(cpu.query("ah"), Some(Value::U8(0x12)));
    assert_eq!(cpu.query("halted"), Some(Value::Bool(true)));
    assert_eq!(cpu.query("opcode"), Some(Value::U8(0xF4)));
    assert_eq!(cpu.query("cycles"), Some(Value::U64(10)));
    assert_eq!(cpu.query("nonsense"), None);

    for path in cpu.query_paths() {
        assert!(cpu.query(path).is_some(), "{path} listed but not answered");
    }
}
