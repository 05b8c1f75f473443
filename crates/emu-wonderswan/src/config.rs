//! WonderSwan configuration: model selection, per-model capabilities and
//! ROM images.

use emu_core::{MasterClock, Ticks};

/// WonderSwan model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    /// Original monochrome WonderSwan.
    WonderSwan,
    /// WonderSwan Color.
    WonderSwanColor,
}

impl Model {
    #[must_use]
    pub const fn capabilities(self) -> &'static Capabilities {
        match self {
            Self::WonderSwan => &Capabilities::WONDERSWAN,
            Self::WonderSwanColor => &Capabilities::WONDERSWAN_COLOR,
        }
    }

    #[must_use]
    pub const fn is_color(self) -> bool {
        matches!(self, Self::WonderSwanColor)
    }
}

/// Fixed properties of a model, chosen once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub model: Model,
    /// CPU clock (Hz).
    pub cpu_clock_hz: u64,
    /// CPU cycles per scanline.
    pub horizontal_total: u32,
    /// Scanlines per frame.
    pub vertical_total: u32,
    /// Internal RAM (bytes).
    pub ram_size: usize,
    /// Bootstrap ROM (bytes).
    pub bootstrap_size: usize,
    /// General-purpose DMA at ports 0x40-0x4F.
    pub has_general_dma: bool,
    /// Bits of port 0xB0 that hold the interrupt vector base.
    pub interrupt_base_mask: u8,
    /// Bits of port 0xB0 that always read back as 1.
    pub interrupt_base_fixed: u8,
    /// Value read from unmapped ports.
    pub unmapped_port_value: u8,
    /// Value read from unbacked internal RAM addresses.
    pub open_bus_value: u8,
}

impl Capabilities {
    pub const WONDERSWAN: Self = Self {
        model: Model::WonderSwan,
        cpu_clock_hz: 3_072_000,
        horizontal_total: 256,
        vertical_total: 159,
        ram_size: 0x4000,
        bootstrap_size: 0x1000,
        has_general_dma: false,
        interrupt_base_mask: 0xF8,
        interrupt_base_fixed: 0x03,
        unmapped_port_value: 0x90,
        open_bus_value: 0x90,
    };

    pub const WONDERSWAN_COLOR: Self = Self {
        model: Model::WonderSwanColor,
        cpu_clock_hz: 3_072_000,
        horizontal_total: 256,
        vertical_total: 159,
        ram_size: 0x10000,
        bootstrap_size: 0x2000,
        has_general_dma: true,
        interrupt_base_mask: 0xFE,
        interrupt_base_fixed: 0x01,
        unmapped_port_value: 0x00,
        open_bus_value: 0x00,
    };

    /// CPU cycles per frame (horizontal total x vertical total).
    #[must_use]
    pub const fn cycles_per_frame(&self) -> u32 {
        self.horizontal_total * self.vertical_total
    }

    /// Master clock at CPU rate.
    #[must_use]
    pub const fn master_clock(&self) -> MasterClock {
        MasterClock::new(self.cpu_clock_hz)
    }

    /// Frame rate in Hz (about 75.47).
    #[must_use]
    pub fn refresh_rate_hz(&self) -> f64 {
        self.master_clock()
            .frame_rate_hz(Ticks::new(u64::from(self.cycles_per_frame())))
    }
}

/// Configuration for constructing a WonderSwan instance.
pub struct MachineConfig {
    /// Model variant.
    pub model: Model,
    /// Bootstrap ROM (4 KiB mono, 8 KiB color). Without one, execution starts
    /// straight from the cartridge.
    pub bootstrap: Option<Vec<u8>>,
    /// Cartridge ROM image (a non-zero multiple of 64 KiB, at most 896 KiB).
    pub rom: Vec<u8>,
    /// Cartridge SRAM (bytes, 0 for none).
    pub sram_size: usize,
}
