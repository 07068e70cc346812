//! Duty-cycle sample synthesis
//!
//! The speaker has exactly two positions, and most software toggles it much
//! faster than the 44.1 kHz output rate can represent. Averaging the
//! position over each sample window is the correct low-pass behavior: a
//! recurring toggle faster than the sample period lands at its duty cycle,
//! a slow toggle comes through as a full-scale square wave.

use crate::config::CYCLE_SCALE;

/// Converts the per-cycle speaker level into output-rate samples.
///
/// Driven once per emulated machine cycle, in cycle order, from the
/// emulation context only. Cycle counts are accumulated in fixed point
/// (scaled by [`CYCLE_SCALE`]) and the overshoot of each window is carried
/// into the next, so the synthesized stream stays phase-exact over
/// arbitrarily long runs.
#[derive(Debug, Clone)]
pub struct SampleClock {
    /// Current speaker position (true = high)
    high: bool,
    /// Scaled cycles elapsed in the current window
    cycles_elapsed: u32,
    /// Scaled cycles spent high in the current window
    cycles_high: u32,
}

impl SampleClock {
    /// Create a clock with the speaker at rest (low)
    pub fn new() -> Self {
        SampleClock {
            high: false,
            cycles_elapsed: 0,
            cycles_high: 0,
        }
    }

    /// Current speaker position
    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Return the accumulators and speaker position to power-on state
    pub fn reset(&mut self) {
        self.high = false;
        self.cycles_elapsed = 0;
        self.cycles_high = 0;
    }

    /// Advance by one machine cycle.
    ///
    /// `toggle` is true when this cycle accessed the speaker soft switch.
    /// `cycles_per_sample` is the scaled window length currently in effect;
    /// a retune between calls applies from the next comparison onward, it
    /// never rescales a window already in progress.
    ///
    /// Returns the finished sample when this cycle completes a window:
    /// the duty cycle mapped onto [-1.0, 1.0].
    #[inline]
    pub fn on_cycle(&mut self, toggle: bool, cycles_per_sample: u32) -> Option<f32> {
        if toggle {
            self.high = !self.high;
        }
        self.cycles_elapsed += CYCLE_SCALE;
        if self.high {
            self.cycles_high += CYCLE_SCALE;
        }
        if self.cycles_elapsed < cycles_per_sample {
            return None;
        }

        let amplitude =
            2.0 * self.cycles_high as f32 / self.cycles_elapsed as f32 - 1.0;

        // Carry the overshoot into the next window rather than discarding
        // it; cycles_high shrinks in proportion so it can never exceed the
        // carried remainder.
        let carry = self.cycles_elapsed - cycles_per_sample;
        self.cycles_high =
            (u64::from(self.cycles_high) * u64::from(carry) / u64::from(self.cycles_elapsed))
                as u32;
        self.cycles_elapsed = carry;

        Some(amplitude)
    }
}

impl Default for SampleClock {
    fn default() -> Self {
        Self::new()
    }
}
