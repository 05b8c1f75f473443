//! V30MZ program status word.
//!
//! Bit layout matches the 8086. Bit 1 and bits 12-15 always read as 1 on the
//! V30MZ; bits 3 and 5 always read as 0.

/// Carry flag (bit 0) - carry out of / borrow into the top bit.
pub const CF: u16 = 0x0001;

/// Parity flag (bit 2) - even number of set bits in the low result byte.
pub const PF: u16 = 0x0004;

/// Auxiliary carry flag (bit 4) - carry out of / borrow into bit 3.
pub const AF: u16 = 0x0010;

/// Zero flag (bit 6).
pub const ZF: u16 = 0x0040;

/// Sign flag (bit 7) - copy of the top result bit.
pub const SF: u16 = 0x0080;

/// Trap flag (bit 8) - single-step (break) mode.
pub const TF: u16 = 0x0100;

/// Interrupt enable flag (bit 9) - maskable interrupts accepted when set.
pub const IF: u16 = 0x0200;

/// Direction flag (bit 10) - string operations step downward when set.
pub const DF: u16 = 0x0400;

/// Overflow flag (bit 11) - signed overflow.
pub const OF: u16 = 0x0800;

/// Reserved bits that always read as 1.
pub const RESERVED_SET: u16 = 0xF002;

/// Bits software can change by loading the whole word.
const WRITABLE: u16 = CF | PF | AF | ZF | SF | TF | IF | DF | OF;

/// Program status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags(u16);

impl Default for Flags {
    fn default() -> Self {
        Self::new()
    }
}

impl Flags {
    /// Power-on flags: everything clear except the fixed bits.
    #[must_use]
    pub const fn new() -> Self {
        Self(RESERVED_SET)
    }

    /// Build flags from a raw word (POPF, IRET), forcing the fixed bits.
    #[must_use]
    pub const fn from_word(value: u16) -> Self {
        Self((value & WRITABLE) | RESERVED_SET)
    }

    /// Raw word as pushed by PUSHF and interrupt entry.
    #[must_use]
    pub const fn to_word(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn is_set(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag & WRITABLE;
    }

    pub fn clear(&mut self, flag: u16) {
        self.0 &= !(flag & WRITABLE);
    }

    /// Set or clear a flag based on a condition.
    pub fn assign(&mut self, flag: u16, value: bool) {
        if value {
            self.set(flag);
        } else {
            self.clear(flag);
        }
    }

    /// Replace the low byte (SAHF). Only SF, ZF, AF, PF and CF are taken.
    pub fn load_low_byte(&mut self, value: u8) {
        let mask = SF | ZF | AF | PF | CF;
        self.0 = (self.0 & !mask) | (u16::from(value) & mask);
    }

    /// Low byte as read by LAHF.
    #[must_use]
    pub const fn low_byte(self) -> u8 {
        self.0 as u8
    }

    #[must_use]
    pub const fn carry(self) -> bool {
        self.is_set(CF)
    }

    #[must_use]
    pub const fn zero(self) -> bool {
        self.is_set(ZF)
    }

    #[must_use]
    pub const fn sign(self) -> bool {
        self.is_set(SF)
    }

    #[must_use]
    pub const fn overflow(self) -> bool {
        self.is_set(OF)
    }

    #[must_use]
    pub const fn parity(self) -> bool {
        self.is_set(PF)
    }

    #[must_use]
    pub const fn aux_carry(self) -> bool {
        self.is_set(AF)
    }

    #[must_use]
    pub const fn interrupt_enable(self) -> bool {
        self.is_set(IF)
    }

    #[must_use]
    pub const fn trap(self) -> bool {
        self.is_set(TF)
    }

    #[must_use]
    pub const fn direction(self) -> bool {
        self.is_set(DF)
    }
}

/// Parity of a byte (true if even number of 1 bits).
#[must_use]
pub const fn parity(value: u8) -> bool {
    value.count_ones().is_multiple_of(2)
}
