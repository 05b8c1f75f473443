//! Machine construction errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MachineError {
    #[error("bootstrap ROM is {actual} bytes, this model needs {expected}")]
    BootstrapSize { expected: usize, actual: usize },

    #[error("cartridge ROM is empty")]
    EmptyRom,

    #[error("cartridge ROM is {size} bytes, larger than the {window}-byte ROM window")]
    RomTooLarge { size: usize, window: usize },

    #[error("cartridge ROM is {size} bytes, not a multiple of 64 KiB")]
    RomNotAligned { size: usize },
}
