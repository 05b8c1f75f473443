//! CPU core trait.

use crate::Bus;

/// A CPU core.
///
/// CPUs execute whole instructions and access memory through a bus. The bus
/// is passed in, not owned, so it can be shared with the rest of the machine
/// between steps.
///
/// CPUs expose their internal state for observation and debugging.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Execute one instruction and return the clock cycles it consumed.
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Returns the address of the next instruction.
    ///
    /// Returns `u32` so segmented CPUs can report the 20-bit physical
    /// address rather than the raw offset.
    fn pc(&self) -> u32;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true if the CPU is halted.
    fn is_halted(&self) -> bool;

    /// Enter the interrupt handler for `vector`.
    ///
    /// The caller has already decided the interrupt is accepted; masking and
    /// priority belong to the machine's interrupt controller.
    fn interrupt<B: Bus>(&mut self, bus: &mut B, vector: u8);

    /// Reset the CPU to its power-on state.
    fn reset(&mut self);
}
