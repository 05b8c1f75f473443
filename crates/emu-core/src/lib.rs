//! Core traits and types for cycle-counted emulation.
//!
//! Processors advance one instruction at a time and report how many clock
//! cycles it took. Machines fold those counts into their own timing grid.

mod bus;
mod clock;
mod cpu;
mod observable;
mod ticks;

pub use bus::{Bus, SimpleBus};
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use observable::{Observable, Value};
pub use ticks::Ticks;
