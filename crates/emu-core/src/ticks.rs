//! Clock tick counts.

use core::ops::{Add, AddAssign, Sub};

/// Elapsed master clock ticks.
///
/// On machines clocked straight from the crystal a tick is one CPU cycle,
/// so per-step cycle counts (`u32`) add directly onto a running `Ticks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Ticks from `earlier` to `self`, zero if `earlier` is later.
    #[must_use]
    pub const fn since(self, earlier: Self) -> Self {
        Self(self.0.saturating_sub(earlier.0))
    }
}

impl From<u32> for Ticks {
    fn from(cycles: u32) -> Self {
        Self(u64::from(cycles))
    }
}

impl Add for Ticks {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl AddAssign<u32> for Ticks {
    fn add_assign(&mut self, cycles: u32) {
        self.0 += u64::from(cycles);
    }
}

impl Sub for Ticks {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.since(rhs)
    }
}
