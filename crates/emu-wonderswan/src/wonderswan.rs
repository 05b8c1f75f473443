//! Top-level WonderSwan system.
//!
//! The CPU runs straight off the 3.072 MHz crystal, so one master clock tick
//! is one CPU cycle. One frame = 159 lines × 256 cycles = 40,704 cycles.
//!
//! # Step
//!
//! Each step:
//! 1. Ask the step hook; an intercepted step advances nothing
//! 2. Service the highest pending interrupt if the CPU has IF set
//! 3. Run one DMA slice if general DMA is active, else one instruction
//! 4. Step display, sound, cartridge and serial by the consumed cycles and
//!    latch the interrupts they raise
//!
//! Lines and frames are accumulators over steps. Overshoot past a line or
//! frame boundary carries into the next one.

use emu_core::{Cpu, Observable, Ticks, Value};
use nec_v30mz::V30MZ;
use tracing::{debug, info};

use crate::bus::{AccessObserver, WsBus};
use crate::cartridge::RomCartridge;
use crate::config::{Capabilities, MachineConfig};
use crate::error::MachineError;
use crate::interrupt::InterruptFlags;
use crate::peripheral::Peripheral;

/// How a run call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The requested step, line or frame finished.
    Completed,
    /// The step hook stopped execution before the next step.
    Intercepted,
}

/// Host callback consulted before every step. Returning true stops the
/// scheduler without advancing anything.
pub trait StepHook: Send {
    fn intercept(&mut self, cpu: &V30MZ) -> bool;
}

impl<F> StepHook for F
where
    F: FnMut(&V30MZ) -> bool + Send,
{
    fn intercept(&mut self, cpu: &V30MZ) -> bool {
        self(cpu)
    }
}

/// WonderSwan system.
pub struct WonderSwan {
    cpu: V30MZ,
    bus: WsBus,
    caps: &'static Capabilities,
    /// Cycles run in the current line.
    line_cycles: u32,
    /// Cycles run in the current frame, excluding the current line.
    frame_cycles: u32,
    /// Master clock: counts CPU cycles.
    clock: Ticks,
    /// Completed frame counter.
    frame_count: u64,
    /// LCD icon segments, refreshed at the end of each frame.
    status_icons: u8,
    hook: Option<Box<dyn StepHook>>,
    /// Set when the last step was intercepted.
    cancelled: bool,
}

impl WonderSwan {
    /// Create a new WonderSwan from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the bootstrap image has the wrong size for the
    /// model or the cartridge ROM cannot be mapped.
    pub fn new(config: &MachineConfig) -> Result<Self, MachineError> {
        let caps = config.model.capabilities();

        let cartridge = RomCartridge::new(config.rom.clone(), config.sram_size)?;
        let bootstrap = match &config.bootstrap {
            Some(image) if image.is_empty() => {
                return Err(MachineError::BootstrapSize {
                    expected: caps.bootstrap_size,
                    actual: 0,
                });
            }
            Some(image) => image.clone(),
            None => Vec::new(),
        };
        let bus = WsBus::new(caps, bootstrap, Box::new(cartridge))?;

        info!(
            model = ?config.model,
            rom_bytes = config.rom.len(),
            bootstrap = config.bootstrap.is_some(),
            "WonderSwan created"
        );

        let mut machine = Self {
            cpu: V30MZ::new(),
            bus,
            caps,
            line_cycles: 0,
            frame_cycles: 0,
            clock: Ticks::ZERO,
            frame_count: 0,
            status_icons: 0,
            hook: None,
            cancelled: false,
        };
        machine.reset();
        Ok(machine)
    }

    /// Return to power-on state. RAM is cleared and the bootstrap overlay
    /// comes back.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
        self.line_cycles = 0;
        self.frame_cycles = 0;
        self.status_icons = 0;
        self.cancelled = false;
        info!(model = ?self.caps.model, "WonderSwan reset");
    }

    /// Run one complete frame.
    ///
    /// At the end of the frame the status icons are refreshed, the keypad
    /// is sampled (raising the key interrupt on new presses) and the frame
    /// counter advances.
    pub fn run_frame(&mut self) -> RunOutcome {
        let budget = self.caps.cycles_per_frame();
        while self.frame_cycles < budget {
            if self.run_line() == RunOutcome::Intercepted {
                return RunOutcome::Intercepted;
            }
        }
        self.frame_cycles -= budget;

        self.status_icons = self.bus.display.icons();
        if !self.bus.keypad.sample().is_empty() {
            self.bus.interrupts.raise(InterruptFlags::KEY);
        }
        self.frame_count += 1;
        RunOutcome::Completed
    }

    /// Run until the current line has at least a horizontal total of cycles.
    pub fn run_line(&mut self) -> RunOutcome {
        while self.line_cycles < self.caps.horizontal_total {
            if self.run_step() == RunOutcome::Intercepted {
                return RunOutcome::Intercepted;
            }
        }
        self.frame_cycles += self.line_cycles;
        self.line_cycles = 0;
        RunOutcome::Completed
    }

    /// Run one instruction or DMA slice.
    pub fn run_step(&mut self) -> RunOutcome {
        if let Some(hook) = self.hook.as_mut() {
            if hook.intercept(&self.cpu) {
                self.cancelled = true;
                return RunOutcome::Intercepted;
            }
        }

        self.poll_interrupts();

        let cycles = if self.bus.dma_active() {
            self.bus.run_dma_slice()
        } else {
            self.cpu.step(&mut self.bus)
        };
        self.bus.step_peripherals(cycles);

        self.line_cycles += cycles;
        self.clock += cycles;
        self.cancelled = false;
        RunOutcome::Completed
    }

    /// Service at most one pending interrupt.
    fn poll_interrupts(&mut self) {
        if !self.cpu.regs.flags.interrupt_enable() {
            return;
        }
        if let Some(line) = self.bus.interrupts.highest_pending() {
            let vector = self.bus.interrupts.vector(line);
            debug!(line, vector, "servicing interrupt");
            self.cpu.wake();
            self.cpu.interrupt(&mut self.bus, vector);
        }
    }

    #[must_use]
    pub fn cpu(&self) -> &V30MZ {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut V30MZ {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &WsBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut WsBus {
        &mut self.bus
    }

    #[must_use]
    pub const fn capabilities(&self) -> &'static Capabilities {
        self.caps
    }

    /// Total CPU cycles run since creation.
    #[must_use]
    pub const fn clock(&self) -> Ticks {
        self.clock
    }

    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Cycles past the last frame boundary, not counting the current line.
    #[must_use]
    pub const fn frame_cycles(&self) -> u32 {
        self.frame_cycles
    }

    #[must_use]
    pub const fn line_cycles(&self) -> u32 {
        self.line_cycles
    }

    /// LCD icon segments as of the last completed frame.
    #[must_use]
    pub const fn status_icons(&self) -> u8 {
        self.status_icons
    }

    /// True if the last step was stopped by the step hook.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn set_step_hook(&mut self, hook: impl StepHook + 'static) {
        self.hook = Some(Box::new(hook));
    }

    pub fn clear_step_hook(&mut self) {
        self.hook = None;
    }

    pub fn set_access_observer(&mut self, observer: impl AccessObserver + 'static) {
        self.bus.set_access_observer(Some(Box::new(observer)));
    }

    pub fn clear_access_observer(&mut self) {
        self.bus.set_access_observer(None);
    }

    pub fn attach_sound(&mut self, sound: impl Peripheral + 'static) {
        self.bus.attach_sound(Box::new(sound));
    }

    pub fn attach_serial(&mut self, serial: impl Peripheral + 'static) {
        self.bus.attach_serial(Box::new(serial));
    }
}

fn parse_address(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix('$') {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

impl Observable for WonderSwan {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("irq.") {
            let irq = &self.bus.interrupts;
            match rest {
                "base" => Some(irq.base().into()),
                "enable" => Some(irq.enabled().bits().into()),
                "status" => Some(irq.status().bits().into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest)
                .filter(|&addr| addr <= 0xF_FFFF)
                .map(|addr| Value::U8(self.bus.peek(addr)))
        } else {
            match path {
                "display.line" => Some(self.bus.display.line().into()),
                "display.icons" => Some(self.status_icons.into()),
                "frame_cycles" => Some(self.frame_cycles.into()),
                "line_cycles" => Some(self.line_cycles.into()),
                "frames" => Some(self.frame_count.into()),
                "total_cycles" => Some(self.clock.get().into()),
                "bootstrap_locked" => Some(self.bus.bootstrap_locked().into()),
                "dma.active" => Some(self.bus.dma_active().into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<v30mz_paths>",
            "irq.base",
            "irq.enable",
            "irq.status",
            "display.line",
            "display.icons",
            "frame_cycles",
            "line_cycles",
            "frames",
            "total_cycles",
            "bootstrap_locked",
            "dma.active",
            "memory.<address>",
        ]
    }
}
