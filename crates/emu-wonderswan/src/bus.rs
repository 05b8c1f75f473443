//! WonderSwan bus: memory map and port routing.
//!
//! Implements `emu_core::Bus` for the V30MZ. Owns internal RAM, the
//! bootstrap ROM and every peripheral; the cartridge answers everything
//! above 0x0FFFF.
//!
//! Memory map (20-bit):
//! - 0x00000-0x0FFFF internal RAM (mono backs the first 16 KiB)
//! - 0x10000-0x1FFFF cartridge SRAM
//! - 0x20000-0xFFFFF cartridge ROM, bootstrap overlaid at the top until
//!   port 0xA0 bit 0 is set

use emu_core::Bus;
use tracing::{debug, trace};

use crate::cartridge::{Cartridge, SRAM_START};
use crate::config::Capabilities;
use crate::display::DisplayTiming;
use crate::dma::GeneralDma;
use crate::error::MachineError;
use crate::interrupt::{
    InterruptController, PORT_ACKNOWLEDGE, PORT_BASE, PORT_ENABLE, PORT_STATUS,
};
use crate::keypad::{Keypad, PORT_KEYPAD};
use crate::peripheral::{InterruptRequest, Peripheral, Unconnected};

/// System control port: bit 0 locks the bootstrap out (write-once).
pub const PORT_SYSTEM_CONTROL: u8 = 0xA0;

const ADDRESS_MASK: u32 = 0xF_FFFF;

/// Host view of bus traffic. Each callback sees the value about to be
/// returned or stored and may substitute another.
pub trait AccessObserver: Send {
    fn on_memory_read(&mut self, address: u32, value: u8) -> u8 {
        let _ = address;
        value
    }

    fn on_memory_write(&mut self, address: u32, value: u8) -> u8 {
        let _ = address;
        value
    }

    fn on_port_read(&mut self, port: u8, value: u8) -> u8 {
        let _ = port;
        value
    }

    fn on_port_write(&mut self, port: u8, value: u8) -> u8 {
        let _ = port;
        value
    }
}

/// The WonderSwan bus, implementing `emu_core::Bus`.
pub struct WsBus {
    caps: &'static Capabilities,
    ram: Vec<u8>,
    bootstrap: Vec<u8>,
    bootstrap_locked: bool,
    pub interrupts: InterruptController,
    pub display: DisplayTiming,
    pub dma: GeneralDma,
    pub keypad: Keypad,
    sound: Box<dyn Peripheral>,
    serial: Box<dyn Peripheral>,
    cartridge: Box<dyn Cartridge>,
    observer: Option<Box<dyn AccessObserver>>,
}

impl WsBus {
    /// Build the bus. An empty `bootstrap` starts with the overlay locked.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::BootstrapSize`] if a non-empty bootstrap is
    /// not exactly the model's bootstrap size.
    pub fn new(
        caps: &'static Capabilities,
        bootstrap: Vec<u8>,
        cartridge: Box<dyn Cartridge>,
    ) -> Result<Self, MachineError> {
        if !bootstrap.is_empty() && bootstrap.len() != caps.bootstrap_size {
            return Err(MachineError::BootstrapSize {
                expected: caps.bootstrap_size,
                actual: bootstrap.len(),
            });
        }

        let bootstrap_locked = bootstrap.is_empty();
        Ok(Self {
            caps,
            ram: vec![0; caps.ram_size],
            bootstrap,
            bootstrap_locked,
            interrupts: InterruptController::new(caps),
            display: DisplayTiming::new(caps),
            dma: GeneralDma::new(),
            keypad: Keypad::new(),
            sound: Box::new(Unconnected::new(caps.unmapped_port_value)),
            serial: Box::new(Unconnected::new(caps.unmapped_port_value)),
            cartridge,
            observer: None,
        })
    }

    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.bootstrap_locked = self.bootstrap.is_empty();
        self.interrupts.reset();
        self.display.reset();
        self.dma.reset();
        self.keypad.reset();
        self.sound.reset();
        self.serial.reset();
        self.cartridge.reset();
    }

    #[must_use]
    pub const fn bootstrap_locked(&self) -> bool {
        self.bootstrap_locked
    }

    pub fn attach_sound(&mut self, sound: Box<dyn Peripheral>) {
        self.sound = sound;
    }

    pub fn attach_serial(&mut self, serial: Box<dyn Peripheral>) {
        self.serial = serial;
    }

    pub fn set_access_observer(&mut self, observer: Option<Box<dyn AccessObserver>>) {
        self.observer = observer;
    }

    /// First physical address of the bootstrap overlay.
    fn bootstrap_start(&self) -> usize {
        ADDRESS_MASK as usize + 1 - self.bootstrap.len()
    }

    /// True when the bootstrap overlay answers `address`.
    fn in_bootstrap(&self, address: u32) -> bool {
        !self.bootstrap_locked && address as usize >= self.bootstrap_start()
    }

    /// Read memory without side effects or observer callbacks.
    #[must_use]
    pub fn peek(&self, address: u32) -> u8 {
        let address = address & ADDRESS_MASK;
        if self.in_bootstrap(address) {
            self.bootstrap[address as usize - self.bootstrap_start()]
        } else if address < SRAM_START {
            self.ram
                .get(address as usize)
                .copied()
                .unwrap_or(self.caps.open_bus_value)
        } else {
            self.cartridge.peek(address)
        }
    }

    fn read_memory(&mut self, address: u32) -> u8 {
        if address >= SRAM_START && !self.in_bootstrap(address) {
            self.cartridge.read_memory(address)
        } else {
            self.peek(address)
        }
    }

    fn write_memory(&mut self, address: u32, value: u8) {
        if address < SRAM_START {
            if let Some(cell) = self.ram.get_mut(address as usize) {
                *cell = value;
            }
        } else {
            self.cartridge.write_memory(address, value);
        }
    }

    fn system_control(&self) -> u8 {
        (u8::from(self.caps.model.is_color()) << 1) | u8::from(self.bootstrap_locked)
    }

    fn read_port(&mut self, port: u8) -> u8 {
        match port {
            0x00..=0x3F | 0x60 | 0xA2..=0xAB => self.display.read_port(port),
            0x40..=0x4F if self.caps.has_general_dma => self.dma.read_port(port),
            0x80..=0x9F => self.sound.read_port(port),
            PORT_SYSTEM_CONTROL => self.system_control(),
            PORT_BASE | PORT_ENABLE | PORT_STATUS | PORT_ACKNOWLEDGE => {
                self.interrupts.read_port(port)
            }
            0xB1 | 0xB3 => self.serial.read_port(port),
            PORT_KEYPAD => self.keypad.read_port(),
            0xC0..=0xFF => self.cartridge.read_port(port),
            _ => {
                trace!("read from unmapped port {port:#04X}");
                self.caps.unmapped_port_value
            }
        }
    }

    fn write_port(&mut self, port: u8, value: u8) {
        match port {
            0x00..=0x3F | 0x60 | 0xA2..=0xAB => self.display.write_port(port, value),
            0x40..=0x4F if self.caps.has_general_dma => self.dma.write_port(port, value),
            0x80..=0x9F => self.sound.write_port(port, value),
            PORT_SYSTEM_CONTROL => {
                if value & 1 != 0 && !self.bootstrap_locked {
                    self.bootstrap_locked = true;
                    debug!("bootstrap ROM locked out");
                }
            }
            PORT_BASE | PORT_ENABLE | PORT_STATUS | PORT_ACKNOWLEDGE => {
                self.interrupts.write_port(port, value);
            }
            0xB1 | 0xB3 => self.serial.write_port(port, value),
            PORT_KEYPAD => self.keypad.write_port(value),
            0xC0..=0xFF => self.cartridge.write_port(port, value),
            _ => {
                trace!("write {value:#04X} to unmapped port {port:#04X}");
            }
        }
    }

    /// True when general DMA should run instead of the CPU.
    #[must_use]
    pub fn dma_active(&self) -> bool {
        self.caps.has_general_dma && self.dma.is_active()
    }

    /// Copy one DMA word. Returns the cycles consumed (0 if idle).
    pub fn run_dma_slice(&mut self) -> u32 {
        let Some(slice) = self.dma.next_slice() else {
            return 0;
        };
        let lo = self.read(slice.source);
        let hi = self.read(slice.source.wrapping_add(1));
        self.write(slice.destination, lo);
        self.write((slice.destination + 1) & 0xFFFF, hi);
        slice.cycles
    }

    /// Advance stepped peripherals and latch the interrupts they request.
    pub fn step_peripherals(&mut self, cycles: u32) {
        let requests: [InterruptRequest; 4] = [
            self.display.step(cycles),
            self.sound.step(cycles),
            self.cartridge.step(cycles),
            self.serial.step(cycles),
        ];
        for request in requests {
            if !request.is_empty() {
                self.interrupts.apply(request);
            }
        }
    }
}

impl Bus for WsBus {
    fn read(&mut self, address: u32) -> u8 {
        let address = address & ADDRESS_MASK;
        let value = self.read_memory(address);
        match self.observer.as_mut() {
            Some(observer) => observer.on_memory_read(address, value),
            None => value,
        }
    }

    fn write(&mut self, address: u32, value: u8) {
        let address = address & ADDRESS_MASK;
        let value = match self.observer.as_mut() {
            Some(observer) => observer.on_memory_write(address, value),
            None => value,
        };
        self.write_memory(address, value);
    }

    fn io_read(&mut self, port: u8) -> u8 {
        let value = self.read_port(port);
        match self.observer.as_mut() {
            Some(observer) => observer.on_port_read(port, value),
            None => value,
        }
    }

    fn io_write(&mut self, port: u8, value: u8) {
        let value = match self.observer.as_mut() {
            Some(observer) => observer.on_port_write(port, value),
            None => value,
        };
        self.write_port(port, value);
    }
}
