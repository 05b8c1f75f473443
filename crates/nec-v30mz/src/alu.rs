//! Operation library: arithmetic, logic, shifts and decimal adjustment.
//!
//! Every operation is a pure function over its operands and the flags word.
//! Byte and word forms share one implementation through [`Width`].

use crate::flags::{AF, CF, Flags, OF, PF, SF, ZF, parity};

/// An operand width the ALU can work at.
pub trait Width: Copy + Eq + core::fmt::Debug {
    /// Operand size in bits.
    const BITS: u32;
    /// All-ones mask for the width.
    const MASK: u32;
    /// Top (sign) bit.
    const SIGN: u32;

    fn to_u32(self) -> u32;

    /// Truncate to the width.
    fn from_u32(value: u32) -> Self;

    /// Sign-extended value.
    fn signed(self) -> i32;
}

impl Width for u8 {
    const BITS: u32 = 8;
    const MASK: u32 = 0xFF;
    const SIGN: u32 = 0x80;

    fn to_u32(self) -> u32 {
        u32::from(self)
    }

    fn from_u32(value: u32) -> Self {
        value as u8
    }

    fn signed(self) -> i32 {
        i32::from(self as i8)
    }
}

impl Width for u16 {
    const BITS: u32 = 16;
    const MASK: u32 = 0xFFFF;
    const SIGN: u32 = 0x8000;

    fn to_u32(self) -> u32 {
        u32::from(self)
    }

    fn from_u32(value: u32) -> Self {
        value as u16
    }

    fn signed(self) -> i32 {
        i32::from(self as i16)
    }
}

/// Set ZF, SF and PF from a result.
fn set_szp<T: Width>(flags: &mut Flags, result: u32) {
    let result = result & T::MASK;
    flags.assign(ZF, result == 0);
    flags.assign(SF, result & T::SIGN != 0);
    flags.assign(PF, parity(result as u8));
}

/// The eight ALU operations selected by bits 3-5 of opcodes 0x00-0x3F and
/// by the reg field of group 1 (0x80-0x83).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
}

impl AluOp {
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index & 7 {
            0 => Self::Add,
            1 => Self::Or,
            2 => Self::Adc,
            3 => Self::Sbb,
            4 => Self::And,
            5 => Self::Sub,
            6 => Self::Xor,
            _ => Self::Cmp,
        }
    }

    /// CMP only sets flags; every other operation writes its destination.
    #[must_use]
    pub const fn writes_result(self) -> bool {
        !matches!(self, Self::Cmp)
    }
}

/// Apply an [`AluOp`] and return the (possibly discarded) result.
pub fn binary<T: Width>(flags: &mut Flags, op: AluOp, a: T, b: T) -> T {
    match op {
        AluOp::Add => add(flags, a, b, false),
        AluOp::Or => or(flags, a, b),
        AluOp::Adc => {
            let carry = flags.carry();
            add(flags, a, b, carry)
        }
        AluOp::Sbb => {
            let carry = flags.carry();
            sub(flags, a, b, carry)
        }
        AluOp::And => and(flags, a, b),
        AluOp::Sub | AluOp::Cmp => sub(flags, a, b, false),
        AluOp::Xor => xor(flags, a, b),
    }
}

/// Add with optional carry in.
pub fn add<T: Width>(flags: &mut Flags, a: T, b: T, carry: bool) -> T {
    let (a, b) = (a.to_u32(), b.to_u32());
    let sum = a + b + u32::from(carry);
    let result = sum & T::MASK;

    flags.assign(CF, sum > T::MASK);
    flags.assign(OF, (a ^ result) & (b ^ result) & T::SIGN != 0);
    flags.assign(AF, (a ^ b ^ result) & 0x10 != 0);
    set_szp::<T>(flags, result);
    T::from_u32(result)
}

/// Subtract with optional borrow in.
pub fn sub<T: Width>(flags: &mut Flags, a: T, b: T, borrow: bool) -> T {
    let (a, b) = (a.to_u32(), b.to_u32());
    let subtrahend = b + u32::from(borrow);
    let result = a.wrapping_sub(subtrahend) & T::MASK;

    flags.assign(CF, subtrahend > a);
    flags.assign(OF, (a ^ b) & (a ^ result) & T::SIGN != 0);
    flags.assign(AF, (a ^ b ^ result) & 0x10 != 0);
    set_szp::<T>(flags, result);
    T::from_u32(result)
}

/// Increment. Carry is preserved.
pub fn inc<T: Width>(flags: &mut Flags, a: T) -> T {
    let carry = flags.carry();
    let result = add(flags, a, T::from_u32(1), false);
    flags.assign(CF, carry);
    result
}

/// Decrement. Carry is preserved.
pub fn dec<T: Width>(flags: &mut Flags, a: T) -> T {
    let carry = flags.carry();
    let result = sub(flags, a, T::from_u32(1), false);
    flags.assign(CF, carry);
    result
}

/// Two's complement negate. Carry is set unless the operand was zero.
pub fn neg<T: Width>(flags: &mut Flags, a: T) -> T {
    sub(flags, T::from_u32(0), a, false)
}

fn logic<T: Width>(flags: &mut Flags, result: u32) -> T {
    flags.clear(CF | OF | AF);
    set_szp::<T>(flags, result);
    T::from_u32(result)
}

pub fn and<T: Width>(flags: &mut Flags, a: T, b: T) -> T {
    logic(flags, a.to_u32() & b.to_u32())
}

pub fn or<T: Width>(flags: &mut Flags, a: T, b: T) -> T {
    logic(flags, a.to_u32() | b.to_u32())
}

pub fn xor<T: Width>(flags: &mut Flags, a: T, b: T) -> T {
    logic(flags, a.to_u32() ^ b.to_u32())
}

/// Shift and rotate operations of group 2, by ModRM reg field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Rol,
    Ror,
    /// Rotate left through carry.
    Rolc,
    /// Rotate right through carry.
    Rorc,
    Shl,
    Shr,
    /// Arithmetic shift right.
    Shra,
}

impl ShiftOp {
    /// Decode the reg field. Encoding 6 is not a valid V30MZ shift.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index & 7 {
            0 => Some(Self::Rol),
            1 => Some(Self::Ror),
            2 => Some(Self::Rolc),
            3 => Some(Self::Rorc),
            4 => Some(Self::Shl),
            5 => Some(Self::Shr),
            7 => Some(Self::Shra),
            _ => None,
        }
    }
}

/// Shift or rotate `value` by `count` (masked to 5 bits).
///
/// The operand moves one bit per iteration so carry always holds the last
/// bit shifted out. A zero count returns the operand with flags untouched.
pub fn shift<T: Width>(flags: &mut Flags, op: ShiftOp, value: T, count: u8) -> T {
    let count = count & 0x1F;
    if count == 0 {
        return value;
    }

    let original = value.to_u32();
    let mut v = original;
    let mut carry = flags.carry();

    for _ in 0..count {
        match op {
            ShiftOp::Rol => {
                carry = v & T::SIGN != 0;
                v = ((v << 1) | u32::from(carry)) & T::MASK;
            }
            ShiftOp::Ror => {
                carry = v & 1 != 0;
                v = (v >> 1) | if carry { T::SIGN } else { 0 };
            }
            ShiftOp::Rolc => {
                let out = v & T::SIGN != 0;
                v = ((v << 1) | u32::from(carry)) & T::MASK;
                carry = out;
            }
            ShiftOp::Rorc => {
                let out = v & 1 != 0;
                v = (v >> 1) | if carry { T::SIGN } else { 0 };
                carry = out;
            }
            ShiftOp::Shl => {
                carry = v & T::SIGN != 0;
                v = (v << 1) & T::MASK;
            }
            ShiftOp::Shr => {
                carry = v & 1 != 0;
                v >>= 1;
            }
            ShiftOp::Shra => {
                carry = v & 1 != 0;
                v = (v >> 1) | (v & T::SIGN);
            }
        }
    }

    flags.assign(CF, carry);
    flags.assign(OF, (original ^ v) & T::SIGN != 0);
    if matches!(op, ShiftOp::Shl | ShiftOp::Shr | ShiftOp::Shra) {
        set_szp::<T>(flags, v);
    }
    T::from_u32(v)
}

/// Unsigned multiply. Returns the double-width product.
///
/// CF and OF are set when the upper half is non-zero.
pub fn mul<T: Width>(flags: &mut Flags, a: T, b: T) -> u32 {
    let product = a.to_u32() * b.to_u32();
    let upper = product >> T::BITS != 0;
    flags.assign(CF, upper);
    flags.assign(OF, upper);
    product
}

/// Signed multiply. Returns the double-width product as raw bits.
///
/// CF and OF are set when the product does not fit the operand width.
pub fn imul<T: Width>(flags: &mut Flags, a: T, b: T) -> u32 {
    let product = a.signed() * b.signed();
    let truncated = T::from_u32(product as u32).signed();
    let overflow = product != truncated;
    flags.assign(CF, overflow);
    flags.assign(OF, overflow);
    let double_mask = (T::MASK << T::BITS) | T::MASK;
    (product as u32) & double_mask
}

/// Unsigned divide of a double-width dividend.
///
/// Returns `(quotient, remainder)`, or `None` on divide-by-zero or when the
/// quotient does not fit the operand width.
#[must_use]
pub fn div<T: Width>(dividend: u32, divisor: T) -> Option<(T, T)> {
    let divisor = divisor.to_u32();
    if divisor == 0 {
        return None;
    }
    let quotient = dividend / divisor;
    if quotient > T::MASK {
        return None;
    }
    Some((T::from_u32(quotient), T::from_u32(dividend % divisor)))
}

/// Signed divide of a double-width dividend.
///
/// The quotient must fit the signed range of the width (-128..=127 or
/// -32768..=32767). Remainder takes the sign of the dividend.
#[must_use]
pub fn idiv<T: Width>(dividend: i32, divisor: T) -> Option<(T, T)> {
    let divisor = divisor.signed();
    let quotient = dividend.checked_div(divisor)?;
    let min = -(T::SIGN as i32);
    let max = T::SIGN as i32 - 1;
    if quotient < min || quotient > max {
        return None;
    }
    let remainder = dividend.checked_rem(divisor)?;
    Some((T::from_u32(quotient as u32), T::from_u32(remainder as u32)))
}

/// Decimal adjust after addition (DAA).
pub fn adj4a(flags: &mut Flags, al: u8) -> u8 {
    let original = al;
    let carry = flags.carry();
    let mut al = al;

    if al & 0x0F > 9 || flags.aux_carry() {
        al = al.wrapping_add(0x06);
        flags.set(AF);
    } else {
        flags.clear(AF);
    }
    if original > 0x99 || carry {
        al = al.wrapping_add(0x60);
        flags.set(CF);
    } else {
        flags.clear(CF);
    }

    set_szp::<u8>(flags, u32::from(al));
    al
}

/// Decimal adjust after subtraction (DAS).
pub fn adj4s(flags: &mut Flags, al: u8) -> u8 {
    let original = al;
    let carry = flags.carry();
    let mut al = al;

    if al & 0x0F > 9 || flags.aux_carry() {
        al = al.wrapping_sub(0x06);
        flags.set(AF);
    } else {
        flags.clear(AF);
    }
    if original > 0x99 || carry {
        al = al.wrapping_sub(0x60);
        flags.set(CF);
    } else {
        flags.clear(CF);
    }

    set_szp::<u8>(flags, u32::from(al));
    al
}

/// Unpacked BCD adjust after addition (AAA). Takes and returns AX.
///
/// AL and AH are adjusted independently: a carry out of AL does not ripple
/// into AH beyond the explicit increment.
pub fn adjba(flags: &mut Flags, ax: u16) -> u16 {
    let mut al = ax as u8;
    let mut ah = (ax >> 8) as u8;

    let adjust = al & 0x0F > 9 || flags.aux_carry();
    if adjust {
        al = al.wrapping_add(0x06);
        ah = ah.wrapping_add(1);
    }
    flags.assign(AF, adjust);
    flags.assign(CF, adjust);

    (u16::from(ah) << 8) | u16::from(al & 0x0F)
}

/// Unpacked BCD adjust after subtraction (AAS). Takes and returns AX.
pub fn adjbs(flags: &mut Flags, ax: u16) -> u16 {
    let mut al = ax as u8;
    let mut ah = (ax >> 8) as u8;

    let adjust = al & 0x0F > 9 || flags.aux_carry();
    if adjust {
        al = al.wrapping_sub(0x06);
        ah = ah.wrapping_sub(1);
    }
    flags.assign(AF, adjust);
    flags.assign(CF, adjust);

    (u16::from(ah) << 8) | u16::from(al & 0x0F)
}

/// Convert binary AL to unpacked decimal in AH:AL (AAM, base 10).
pub fn cvtbd(flags: &mut Flags, al: u8) -> u16 {
    let ah = al / 10;
    let al = al % 10;
    set_szp::<u8>(flags, u32::from(al));
    (u16::from(ah) << 8) | u16::from(al)
}

/// Convert unpacked decimal AH:AL to binary AL, clearing AH (AAD, base 10).
pub fn cvtdb(flags: &mut Flags, ax: u16) -> u16 {
    let ah = (ax >> 8) as u8;
    let al = ah.wrapping_mul(10).wrapping_add(ax as u8);
    set_szp::<u8>(flags, u32::from(al));
    u16::from(al)
}
