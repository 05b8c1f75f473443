//! Master clock configuration.

use crate::Ticks;

/// Master clock configuration for a system.
///
/// Each system has a master crystal that drives all timing. On machines where
/// the CPU runs straight off the crystal, a tick is one CPU cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Crystal frequency in Hz (e.g., `3_072_000` for the WonderSwan CPU).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Frame rate produced by a frame of `ticks` clock ticks.
    ///
    /// Handheld LCD timings are defined by their raster size rather than a
    /// round refresh rate, so the rate is derived from the tick budget.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn frame_rate_hz(&self, ticks: Ticks) -> f64 {
        if ticks.get() == 0 {
            return 0.0;
        }
        self.frequency_hz as f64 / ticks.get() as f64
    }
}
