//! Adaptive resampling rate control
//!
//! The emulated bus and the host audio clock are only nominally matched:
//! left alone, the difference accumulates and the sample buffer either
//! drains dry or grows without bound over a long session. The correction is
//! a slow servo on the cycles-per-sample window length: a starving
//! consumer shortens the window so samples arrive faster, a backed-up one
//! lengthens it. The servo is clamped to a narrow band so one abnormal reading can
//! never run the pitch away.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::{DEFAULT_CYCLES_PER_SAMPLE, RATE_CLAMP_RATIO, RATE_STEP};

/// Shared cycles-per-sample state.
///
/// The producer loads the current value on every emulated cycle; only the
/// pump writes it, once per pump. A single atomic with acquire/release
/// ordering keeps the hot path to one uncontended load.
#[derive(Debug)]
pub struct RateControl {
    /// Scaled cycles per output sample
    cycles_per_sample: AtomicU32,
    /// Nominal value retuning gravitates around
    nominal: u32,
    /// Lower clamp (nominal − 2%)
    min: u32,
    /// Upper clamp (nominal + 2%)
    max: u32,
    /// Backlog floor; below it production speeds up
    low_water: usize,
    /// Backlog ceiling; above it production slows down
    high_water: usize,
}

impl RateControl {
    /// Create rate state around a nominal scaled cycles-per-sample.
    ///
    /// A zero nominal falls back to the NTSC default rather than producing
    /// a degenerate clamp range.
    pub fn new(nominal: u32, low_water: usize, high_water: usize) -> Self {
        let nominal = if nominal == 0 {
            DEFAULT_CYCLES_PER_SAMPLE
        } else {
            nominal
        };
        let slack = nominal / RATE_CLAMP_RATIO;
        RateControl {
            cycles_per_sample: AtomicU32::new(nominal),
            nominal,
            min: nominal - slack,
            max: nominal + slack,
            low_water,
            high_water,
        }
    }

    /// Current scaled cycles per output sample
    #[inline]
    pub fn cycles_per_sample(&self) -> u32 {
        self.cycles_per_sample.load(Ordering::Acquire)
    }

    /// Nominal scaled cycles per output sample
    pub fn nominal(&self) -> u32 {
        self.nominal
    }

    /// Set the rate directly, clamping silently to the valid band.
    ///
    /// Used when importing persisted settings; a corrupt or zero value
    /// lands on the nearest bound instead of propagating.
    pub fn set_cycles_per_sample(&self, raw: u32) {
        let clamped = raw.clamp(self.min, self.max);
        if clamped != raw {
            log::debug!(
                "cycles per sample {raw} outside [{}, {}], clamped to {clamped}",
                self.min,
                self.max
            );
        }
        self.cycles_per_sample.store(clamped, Ordering::Release);
    }

    /// Adjust the rate by one bounded step against the observed backlog
    /// (unread ring samples plus sink queue depth). Called once per pump,
    /// not per sample.
    pub fn retune(&self, backlog: usize) {
        let current = self.cycles_per_sample.load(Ordering::Acquire);
        let next = if backlog < self.low_water {
            // Near starvation: shorten the window, samples arrive faster
            current.saturating_sub(RATE_STEP)
        } else if backlog > self.high_water {
            // Near overflow: lengthen the window, samples arrive slower
            current.saturating_add(RATE_STEP)
        } else {
            return;
        };
        self.cycles_per_sample
            .store(next.clamp(self.min, self.max), Ordering::Release);
    }
}
