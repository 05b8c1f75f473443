//! General-purpose DMA (WonderSwan Color, ports 0x40-0x48).
//!
//! A started transfer copies one word per scheduler slice from a 20-bit
//! source to an offset in segment 0. While active it runs instead of the
//! CPU.

pub const PORT_SOURCE: u8 = 0x40;
pub const PORT_DESTINATION: u8 = 0x44;
pub const PORT_LENGTH: u8 = 0x46;
pub const PORT_CONTROL: u8 = 0x48;

const CONTROL_START: u8 = 0x80;
const CONTROL_DECREMENT: u8 = 0x40;

/// Cycles per copied word.
pub const SLICE_CYCLES: u32 = 2;
/// Extra cycles charged on the first slice of a transfer.
pub const SETUP_CYCLES: u32 = 5;

/// One word transfer, already accounted for in the DMA registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaSlice {
    pub source: u32,
    pub destination: u32,
    pub cycles: u32,
}

#[derive(Debug, Clone, Default)]
pub struct GeneralDma {
    source: u32,
    destination: u16,
    length: u16,
    control: u8,
    first_slice: bool,
}

impl GeneralDma {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.control & CONTROL_START != 0
    }

    /// Bytes left to copy.
    #[must_use]
    pub const fn remaining(&self) -> u16 {
        self.length
    }

    /// Claim the next word of the transfer and advance the registers.
    pub fn next_slice(&mut self) -> Option<DmaSlice> {
        if !self.is_active() {
            return None;
        }

        let mut cycles = SLICE_CYCLES;
        if self.first_slice {
            self.first_slice = false;
            cycles += SETUP_CYCLES;
        }

        let slice = DmaSlice {
            source: self.source,
            destination: u32::from(self.destination),
            cycles,
        };

        if self.control & CONTROL_DECREMENT != 0 {
            self.source = self.source.wrapping_sub(2) & 0xF_FFFF;
            self.destination = self.destination.wrapping_sub(2);
        } else {
            self.source = self.source.wrapping_add(2) & 0xF_FFFF;
            self.destination = self.destination.wrapping_add(2);
        }
        self.length = self.length.saturating_sub(2);
        if self.length == 0 {
            self.control &= !CONTROL_START;
        }

        Some(slice)
    }

    #[must_use]
    pub fn read_port(&self, port: u8) -> u8 {
        match port {
            0x40 => self.source as u8,
            0x41 => (self.source >> 8) as u8,
            0x42 => (self.source >> 16) as u8,
            0x44 => self.destination as u8,
            0x45 => (self.destination >> 8) as u8,
            0x46 => self.length as u8,
            0x47 => (self.length >> 8) as u8,
            PORT_CONTROL => self.control,
            _ => 0,
        }
    }

    pub fn write_port(&mut self, port: u8, value: u8) {
        let value16 = u16::from(value);
        let value32 = u32::from(value);
        match port {
            0x40 => self.source = (self.source & 0xF_FF00) | (value32 & 0xFE),
            0x41 => self.source = (self.source & 0xF_00FF) | (value32 << 8),
            0x42 => self.source = (self.source & 0x0_FFFF) | ((value32 & 0x0F) << 16),
            0x44 => self.destination = (self.destination & 0xFF00) | (value16 & 0xFE),
            0x45 => self.destination = (self.destination & 0x00FF) | (value16 << 8),
            0x46 => self.length = (self.length & 0xFF00) | (value16 & 0xFE),
            0x47 => self.length = (self.length & 0x00FF) | (value16 << 8),
            PORT_CONTROL => {
                self.control = value & (CONTROL_START | CONTROL_DECREMENT);
                if self.is_active() {
                    if self.length == 0 {
                        self.control &= !CONTROL_START;
                    } else {
                        self.first_slice = true;
                    }
                }
            }
            _ => {}
        }
    }
}
