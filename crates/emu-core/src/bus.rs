//! Memory and I/O bus interface.

/// Size of a 20-bit physical address space.
pub const ADDRESS_SPACE: usize = 1 << 20;

/// Memory and I/O bus interface.
///
/// Components access memory and peripherals through this trait. The bus
/// handles address decoding and routing to the appropriate device. Memory
/// addresses are physical (20 bits on segmented CPUs); implementations mask
/// anything above the address width. Ports are byte-wide and byte-addressed.
pub trait Bus {
    /// Read a byte from the given physical address.
    fn read(&mut self, address: u32) -> u8;

    /// Write a byte to the given physical address.
    fn write(&mut self, address: u32, value: u8);

    /// Read a byte from an I/O port.
    fn io_read(&mut self, port: u8) -> u8;

    /// Write a byte to an I/O port.
    fn io_write(&mut self, port: u8, value: u8);
}

/// Flat 1 MiB RAM with a 256-entry port latch, for tests and tooling.
///
/// Port writes are latched and read back unchanged, which is enough for
/// exercising IN/OUT class instructions without a machine behind them.
pub struct SimpleBus {
    memory: Vec<u8>,
    ports: [u8; 256],
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: vec![0; ADDRESS_SPACE],
            ports: [0; 256],
        }
    }

    /// Copy `data` into memory starting at a physical address.
    pub fn load(&mut self, address: u32, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            let addr = (address as usize + i) & (ADDRESS_SPACE - 1);
            self.memory[addr] = byte;
        }
    }

    /// Read memory without going through the bus interface.
    #[must_use]
    pub fn peek(&self, address: u32) -> u8 {
        self.memory[address as usize & (ADDRESS_SPACE - 1)]
    }

    /// Little-endian word at a physical address.
    #[must_use]
    pub fn peek_word(&self, address: u32) -> u16 {
        u16::from(self.peek(address)) | (u16::from(self.peek(address.wrapping_add(1))) << 8)
    }

    /// Preset the value an `io_read` of `port` will return.
    pub fn set_port(&mut self, port: u8, value: u8) {
        self.ports[port as usize] = value;
    }

    /// Last value written to (or preset on) a port.
    #[must_use]
    pub fn port(&self, port: u8) -> u8 {
        self.ports[port as usize]
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u32) -> u8 {
        self.peek(address)
    }

    fn write(&mut self, address: u32, value: u8) {
        self.memory[address as usize & (ADDRESS_SPACE - 1)] = value;
    }

    fn io_read(&mut self, port: u8) -> u8 {
        self.ports[port as usize]
    }

    fn io_write(&mut self, port: u8, value: u8) {
        self.ports[port as usize] = value;
    }
}
