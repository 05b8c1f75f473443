//! Cycle-counted Bandai WonderSwan and WonderSwan Color.
//!
//! The master clock ticks at CPU cycle rate (3,072,000 Hz). One frame is 159
//! lines x 256 cycles = 40,704 CPU cycles (~75.47 Hz). The scheduler runs
//! whole instructions (or DMA slices) and steps the peripherals after each.

mod bus;
pub mod cartridge;
pub mod config;
pub mod display;
pub mod dma;
mod error;
pub mod interrupt;
pub mod keypad;
pub mod peripheral;
mod wonderswan;

pub use bus::{AccessObserver, PORT_SYSTEM_CONTROL, WsBus};
pub use cartridge::{Cartridge, RomCartridge};
pub use config::{Capabilities, MachineConfig, Model};
pub use display::DisplayTiming;
pub use dma::GeneralDma;
pub use error::MachineError;
pub use interrupt::{InterruptController, InterruptFlags};
pub use keypad::{Buttons, Keypad};
pub use peripheral::{InterruptRequest, Peripheral, Unconnected};
pub use wonderswan::{RunOutcome, StepHook, WonderSwan};
