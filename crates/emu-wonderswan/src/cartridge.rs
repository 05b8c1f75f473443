//! Cartridge interface and a flat ROM cartridge.
//!
//! The cartridge owns 0x10000-0x1FFFF (SRAM) and 0x20000-0xFFFFF (ROM) plus
//! ports 0xC0-0xFF. [`RomCartridge`] maps its image end-aligned to 0xFFFFF
//! and mirrors it downward; bank registers are latched but not decoded.

use crate::error::MachineError;
use crate::peripheral::Peripheral;

/// Start of the cartridge SRAM window.
pub const SRAM_START: u32 = 0x1_0000;
/// Start of the cartridge ROM window.
pub const ROM_START: u32 = 0x2_0000;
/// Size of the cartridge ROM window.
pub const ROM_WINDOW: usize = 0xE_0000;
/// ROM images are a whole number of 64 KiB banks.
pub const ROM_BANK_SIZE: usize = 0x1_0000;

/// A cartridge: a peripheral that also answers memory accesses above 0x0FFFF.
pub trait Cartridge: Peripheral {
    fn read_memory(&mut self, address: u32) -> u8 {
        self.peek(address)
    }

    /// Read without side effects, for inspection.
    fn peek(&self, address: u32) -> u8;

    fn write_memory(&mut self, address: u32, value: u8);
}

/// ROM with optional SRAM and no bank switching.
pub struct RomCartridge {
    rom: Vec<u8>,
    sram: Vec<u8>,
    ports: [u8; 0x40],
}

impl RomCartridge {
    /// Wrap a ROM image after checking its size.
    pub fn new(rom: Vec<u8>, sram_size: usize) -> Result<Self, MachineError> {
        if rom.is_empty() {
            return Err(MachineError::EmptyRom);
        }
        if rom.len() > ROM_WINDOW {
            return Err(MachineError::RomTooLarge {
                size: rom.len(),
                window: ROM_WINDOW,
            });
        }
        if !rom.len().is_multiple_of(ROM_BANK_SIZE) {
            return Err(MachineError::RomNotAligned { size: rom.len() });
        }

        Ok(Self {
            rom,
            sram: vec![0; sram_size.min(ROM_BANK_SIZE)],
            ports: [0; 0x40],
        })
    }

    #[must_use]
    pub fn sram(&self) -> &[u8] {
        &self.sram
    }

    /// Index into the ROM image for a physical address, counting back from
    /// the top of memory.
    fn rom_index(&self, address: u32) -> usize {
        let from_top = (0xF_FFFF - (address & 0xF_FFFF)) as usize;
        self.rom.len() - 1 - from_top % self.rom.len()
    }
}

impl Peripheral for RomCartridge {
    fn read_port(&mut self, port: u8) -> u8 {
        self.ports[usize::from(port & 0x3F)]
    }

    fn write_port(&mut self, port: u8, value: u8) {
        self.ports[usize::from(port & 0x3F)] = value;
    }

    fn reset(&mut self) {
        self.ports = [0; 0x40];
    }
}

impl Cartridge for RomCartridge {
    fn peek(&self, address: u32) -> u8 {
        if address >= ROM_START {
            self.rom[self.rom_index(address)]
        } else if self.sram.is_empty() {
            0xFF
        } else {
            let offset = (address - SRAM_START) as usize;
            self.sram[offset % self.sram.len()]
        }
    }

    fn write_memory(&mut self, address: u32, value: u8) {
        if (SRAM_START..ROM_START).contains(&address) && !self.sram.is_empty() {
            let offset = (address - SRAM_START) as usize;
            let len = self.sram.len();
            self.sram[offset % len] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_checks() {
        assert_eq!(RomCartridge::new(vec![], 0).err(), Some(MachineError::EmptyRom));
        assert_eq!(
            RomCartridge::new(vec![0; 0x1000], 0).err(),
            Some(MachineError::RomNotAligned { size: 0x1000 })
        );
        assert_eq!(
            RomCartridge::new(vec![0; 0xF_0000], 0).err(),
            Some(MachineError::RomTooLarge {
                size: 0xF_0000,
                window: ROM_WINDOW
            })
        );
        assert!(RomCartridge::new(vec![0; 0xE_0000], 0).is_ok());
    }

    #[test]
    fn rom_is_end_aligned_and_mirrored() {
        let mut rom = vec![0; 0x1_0000];
        rom[0] = 0x11;
        rom[0xFFFF] = 0x22;
        let mut cart = RomCartridge::new(rom, 0).expect("valid ROM");

        assert_eq!(cart.read_memory(0xF_FFFF), 0x22);
        assert_eq!(cart.read_memory(0xF_0000), 0x11);
        assert_eq!(cart.read_memory(0xE_FFFF), 0x22);
        assert_eq!(cart.read_memory(0x2_0000), 0x11);
    }

    #[test]
    fn sram_reads_back() {
        let mut cart = RomCartridge::new(vec![0; 0x1_0000], 0x2000).expect("valid ROM");
        cart.write_memory(0x1_0010, 0x5A);
        assert_eq!(cart.read_memory(0x1_0010), 0x5A);
        assert_eq!(cart.read_memory(0x1_2010), 0x5A);
        assert_eq!(cart.sram().len(), 0x2000);
        assert_eq!(cart.sram()[0x10], 0x5A);

        let mut bare = RomCartridge::new(vec![0; 0x1_0000], 0).expect("valid ROM");
        bare.write_memory(0x1_0010, 0x5A);
        assert_eq!(bare.read_memory(0x1_0010), 0xFF);
        assert!(bare.sram().is_empty());
    }
}
