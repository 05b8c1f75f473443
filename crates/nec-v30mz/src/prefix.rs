//! Instruction prefixes.
//!
//! Prefix bytes are queued as they are fetched and consulted by the opcode
//! that follows. The queue survives into the next step only when a repeated
//! string instruction asks to run again.

use std::collections::VecDeque;

use crate::registers::Segment;

/// Maximum number of prefix bytes remembered for one instruction.
pub const MAX_PREFIXES: usize = 16;

pub const SEG_ES: u8 = 0x26;
pub const SEG_CS: u8 = 0x2E;
pub const SEG_SS: u8 = 0x36;
pub const SEG_DS: u8 = 0x3E;
pub const LOCK: u8 = 0xF0;
pub const REPNE: u8 = 0xF2;
pub const REPE: u8 = 0xF3;

/// True if `byte` is one of the seven prefix bytes the V30MZ recognises.
#[must_use]
pub const fn is_prefix(byte: u8) -> bool {
    matches!(byte, SEG_ES | SEG_CS | SEG_SS | SEG_DS | LOCK | REPNE | REPE)
}

/// How a repeated string instruction decides to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatClass {
    /// REP / REPE / REPZ: continue while ZF is set (compare forms only).
    WhileZero,
    /// REPNE / REPNZ: continue while ZF is clear (compare forms only).
    WhileNonZero,
}

impl RepeatClass {
    /// Whether a compare-type iteration with the given ZF allows another.
    #[must_use]
    pub const fn continues(self, zero: bool) -> bool {
        match self {
            Self::WhileZero => zero,
            Self::WhileNonZero => !zero,
        }
    }
}

/// Ordered, bounded queue of prefix bytes for the current instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixQueue {
    bytes: VecDeque<u8>,
}

impl PrefixQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: VecDeque::with_capacity(MAX_PREFIXES),
        }
    }

    /// Append a prefix, dropping the oldest once the queue is full.
    pub fn push(&mut self, byte: u8) {
        if self.bytes.len() == MAX_PREFIXES {
            self.bytes.pop_front();
        }
        self.bytes.push_back(byte);
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The most recent segment override, if any.
    #[must_use]
    pub fn segment_override(&self) -> Option<Segment> {
        self.bytes.iter().rev().find_map(|&b| match b {
            SEG_ES => Some(Segment::Es),
            SEG_CS => Some(Segment::Cs),
            SEG_SS => Some(Segment::Ss),
            SEG_DS => Some(Segment::Ds),
            _ => None,
        })
    }

    /// The most recent repeat prefix, if any.
    #[must_use]
    pub fn repeat(&self) -> Option<RepeatClass> {
        self.bytes.iter().rev().find_map(|&b| match b {
            REPE => Some(RepeatClass::WhileZero),
            REPNE => Some(RepeatClass::WhileNonZero),
            _ => None,
        })
    }

    #[must_use]
    pub fn has_lock(&self) -> bool {
        self.bytes.contains(&LOCK)
    }

    /// Raw prefix bytes, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.iter().copied().collect()
    }
}
