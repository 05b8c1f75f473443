//! NEC V30MZ CPU interpreter.
//!
//! Each call to `step()` executes one whole instruction (including its
//! prefixes) and returns the cycles it took. Repeated string instructions
//! run one element per step so interrupts can land between elements.

pub mod alu;
mod cpu;
mod flags;
mod modrm;
mod prefix;
mod registers;

pub use cpu::{
    INTERRUPT_CYCLES, V30MZ, VECTOR_BOUND, VECTOR_BREAKPOINT, VECTOR_DIVIDE_ERROR,
    VECTOR_OVERFLOW, VECTOR_SINGLE_STEP,
};
pub use flags::{AF, CF, DF, Flags, IF, OF, PF, RESERVED_SET, SF, TF, ZF, parity};
pub use modrm::{Location, ModRm};
pub use prefix::{MAX_PREFIXES, PrefixQueue, RepeatClass, is_prefix};
pub use registers::{Reg8, Reg16, Registers, Segment, physical};
