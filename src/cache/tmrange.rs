//! Time range of cache-resident entries

use std::ops::BitOrAssign;

/// `[min, max]` timestamps; zero on either side means "not set"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TmRange {
    pub min: u64,
    pub max: u64,
}

impl TmRange {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn is_null(&self) -> bool {
        self.min == 0 || self.max == 0
    }

    /// Widen the range to include `ts`
    pub fn extend(&mut self, ts: u64) {
        *self |= TmRange::new(ts, ts);
    }

    /// `max - min`, or zero for a null range
    pub fn range(&self) -> u64 {
        if self.is_null() {
            0
        } else {
            self.max.saturating_sub(self.min)
        }
    }
}

impl BitOrAssign for TmRange {
    fn bitor_assign(&mut self, other: Self) {
        if other.min != 0 && (self.min == 0 || other.min < self.min) {
            self.min = other.min;
        }
        if other.max != 0 && (self.max == 0 || other.max > self.max) {
            self.max = other.max;
        }
    }
}
