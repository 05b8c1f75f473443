//! Display timing: scanline counter, line compare, LCD icons and the
//! HBlank/VBlank countdown timers. No pixels are produced.

use crate::config::Capabilities;
use crate::interrupt::InterruptFlags;
use crate::peripheral::{InterruptRequest, Peripheral};

pub const PORT_LINE: u8 = 0x02;
pub const PORT_LINE_COMPARE: u8 = 0x03;
pub const PORT_ICONS: u8 = 0x15;
pub const PORT_TIMER_CONTROL: u8 = 0xA2;
pub const PORT_HBLANK_RELOAD: u8 = 0xA4;
pub const PORT_VBLANK_RELOAD: u8 = 0xA6;
pub const PORT_HBLANK_COUNTER: u8 = 0xA8;
pub const PORT_VBLANK_COUNTER: u8 = 0xAA;

/// First line of vertical blanking.
pub const VBLANK_LINE: u32 = 144;

/// Line-driven countdown timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Timer {
    enabled: bool,
    repeat: bool,
    reload: u16,
    counter: u16,
}

impl Timer {
    /// Count one tick. True when the counter reaches zero.
    fn tick(&mut self) -> bool {
        if !self.enabled || self.counter == 0 {
            return false;
        }
        self.counter -= 1;
        if self.counter == 0 {
            if self.repeat {
                self.counter = self.reload;
            }
            return true;
        }
        false
    }

    fn set_control(&mut self, bits: u8) {
        self.enabled = bits & 1 != 0;
        self.repeat = bits & 2 != 0;
    }

    fn control(&self) -> u8 {
        u8::from(self.enabled) | (u8::from(self.repeat) << 1)
    }

    /// Write one byte of the reload value. The counter restarts from it.
    fn write_reload(&mut self, high: bool, value: u8) {
        self.reload = if high {
            (self.reload & 0x00FF) | (u16::from(value) << 8)
        } else {
            (self.reload & 0xFF00) | u16::from(value)
        };
        self.counter = self.reload;
    }
}

fn word_byte(word: u16, high: bool) -> u8 {
    if high { (word >> 8) as u8 } else { word as u8 }
}

/// Display timing generator.
pub struct DisplayTiming {
    horizontal_total: u32,
    vertical_total: u32,
    line: u32,
    line_cycles: u32,
    line_compare: u8,
    icons: u8,
    hblank_timer: Timer,
    vblank_timer: Timer,
    /// Latched display registers that have no timing effect.
    registers: [u8; 0x40],
    lcd_control: u8,
}

impl DisplayTiming {
    #[must_use]
    pub fn new(caps: &Capabilities) -> Self {
        Self {
            horizontal_total: caps.horizontal_total,
            vertical_total: caps.vertical_total,
            line: 0,
            line_cycles: 0,
            line_compare: 0,
            icons: 0,
            hblank_timer: Timer::default(),
            vblank_timer: Timer::default(),
            registers: [0; 0x40],
            lcd_control: 0,
        }
    }

    /// Current scanline.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// LCD status icon segments (port 0x15).
    #[must_use]
    pub const fn icons(&self) -> u8 {
        self.icons
    }

    /// Advance past the end of the current line.
    fn end_line(&mut self) -> InterruptFlags {
        let mut raised = InterruptFlags::empty();
        if self.hblank_timer.tick() {
            raised |= InterruptFlags::HBLANK_TIMER;
        }

        self.line = (self.line + 1) % self.vertical_total;
        if self.line == VBLANK_LINE {
            raised |= InterruptFlags::VBLANK;
            if self.vblank_timer.tick() {
                raised |= InterruptFlags::VBLANK_TIMER;
            }
        }
        if self.line == u32::from(self.line_compare) {
            raised |= InterruptFlags::LINE_COMPARE;
        }
        raised
    }
}

impl Peripheral for DisplayTiming {
    fn step(&mut self, cycles: u32) -> InterruptRequest {
        let mut raised = InterruptFlags::empty();
        self.line_cycles += cycles;
        while self.line_cycles >= self.horizontal_total {
            self.line_cycles -= self.horizontal_total;
            raised |= self.end_line();
        }
        InterruptRequest::raise(raised)
    }

    fn read_port(&mut self, port: u8) -> u8 {
        match port {
            PORT_LINE => self.line as u8,
            PORT_LINE_COMPARE => self.line_compare,
            PORT_ICONS => self.icons,
            0x60 => self.lcd_control,
            PORT_TIMER_CONTROL => {
                self.hblank_timer.control() | (self.vblank_timer.control() << 2)
            }
            0xA4 | 0xA5 => word_byte(self.hblank_timer.reload, port & 1 != 0),
            0xA6 | 0xA7 => word_byte(self.vblank_timer.reload, port & 1 != 0),
            0xA8 | 0xA9 => word_byte(self.hblank_timer.counter, port & 1 != 0),
            0xAA | 0xAB => word_byte(self.vblank_timer.counter, port & 1 != 0),
            0x00..=0x3F => self.registers[usize::from(port)],
            _ => 0,
        }
    }

    fn write_port(&mut self, port: u8, value: u8) {
        match port {
            // Read-only.
            PORT_LINE | 0xA8..=0xAB => {}
            PORT_LINE_COMPARE => self.line_compare = value,
            PORT_ICONS => self.icons = value,
            0x60 => self.lcd_control = value,
            PORT_TIMER_CONTROL => {
                self.hblank_timer.set_control(value);
                self.vblank_timer.set_control(value >> 2);
            }
            0xA4 | 0xA5 => self.hblank_timer.write_reload(port & 1 != 0, value),
            0xA6 | 0xA7 => self.vblank_timer.write_reload(port & 1 != 0, value),
            0x00..=0x3F => self.registers[usize::from(port)] = value,
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.line = 0;
        self.line_cycles = 0;
        self.line_compare = 0;
        self.icons = 0;
        self.hblank_timer = Timer::default();
        self.vblank_timer = Timer::default();
        self.registers = [0; 0x40];
        self.lcd_control = 0;
    }
}
