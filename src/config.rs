//! Speaker configuration and persisted settings
//!
//! Tuning constants follow the NTSC Apple II: the bus runs at 1.0205 MHz,
//! so one 44.1 kHz output sample spans about 23.14 machine cycles. Cycle
//! counts are kept in fixed point (scaled by [`CYCLE_SCALE`]) so the
//! fractional part survives across sample windows.

use serde::{Deserialize, Serialize};

use crate::{Result, SpeakerError};

/// Audio output sample rate in Hz
pub const SAMPLE_RATE: u32 = 44_100;

/// Samples per block handed to the audio sink
pub const BLOCK_SIZE: usize = 1024;

/// Default ring buffer capacity in samples (~23 seconds at 44.1 kHz)
pub const RING_BUFFER_SIZE: usize = 1 << 20;

/// Fixed-point multiplier for cycle accounting
pub const CYCLE_SCALE: u32 = 10_000;

/// Default scaled cycles per output sample: the 1,020,484 Hz NTSC bus clock
/// divided by the 44.1 kHz sample rate, times [`CYCLE_SCALE`]
pub const DEFAULT_CYCLES_PER_SAMPLE: u32 = 231_400;

/// Clamp window divisor for the adaptive rate: the valid range is
/// nominal ± nominal / `RATE_CLAMP_RATIO` (2%), wide enough to absorb
/// clock mismatch but too narrow for audible pitch drift
pub const RATE_CLAMP_RATIO: u32 = 50;

/// Scaled units the adaptive rate moves per retune step (≈0.09% pitch)
pub const RATE_STEP: u32 = 200;

/// Blocks of silence enqueued when playback starts, giving the device
/// callback a cushion before the first live block lands
pub const STARTUP_SILENCE_BLOCKS: usize = 3;

/// Construction parameters for a [`Speaker`](crate::Speaker) instance.
///
/// The defaults reproduce an NTSC Apple II feeding a 44.1 kHz mono device.
/// PAL machines (or any other bus clock) should start from
/// [`SpeakerConfig::for_clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakerConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Samples per block pushed to the sink
    pub block_size: usize,
    /// Ring buffer capacity in samples (rounded up to a power of two)
    pub ring_buffer_size: usize,
    /// Nominal scaled cycles per output sample
    pub cycles_per_sample: u32,
}

impl SpeakerConfig {
    /// Configuration for an arbitrary bus clock.
    ///
    /// Computes the scaled cycles-per-sample from `bus_hz`, so a PAL
    /// machine (985,248 Hz) gets a correct nominal rate instead of the
    /// NTSC default.
    pub fn for_clock(bus_hz: u32) -> Self {
        let cycles_per_sample =
            (u64::from(bus_hz) * u64::from(CYCLE_SCALE) / u64::from(SAMPLE_RATE)) as u32;
        SpeakerConfig {
            cycles_per_sample,
            ..Self::default()
        }
    }

    /// Occupancy ceiling for the ring buffer; pushing past it drops the
    /// oldest samples. Also the sink queue depth that triggers a latency
    /// flush.
    pub fn high_water(&self) -> usize {
        self.block_size * 2
    }

    /// Occupancy floor below which the adaptive rate speeds production up
    pub fn low_water(&self) -> usize {
        self.block_size / 2
    }

    /// Worst-case buffered latency in milliseconds (ring at its high-water
    /// mark plus a full sink queue)
    pub fn latency_ms(&self) -> f32 {
        (self.high_water() * 2) as f32 / self.sample_rate as f32 * 1000.0
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any dimension is zero or the ring buffer
    /// cannot hold a useful number of blocks. An out-of-range
    /// `cycles_per_sample` is not an error; it is clamped at use.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(SpeakerError::ConfigError(
                "sample rate must be greater than 0".into(),
            ));
        }
        if self.block_size == 0 {
            return Err(SpeakerError::ConfigError(
                "block size must be greater than 0".into(),
            ));
        }
        if self.ring_buffer_size < self.block_size * 4 {
            return Err(SpeakerError::ConfigError(format!(
                "ring buffer of {} samples cannot hold four {}-sample blocks",
                self.ring_buffer_size, self.block_size
            )));
        }
        Ok(())
    }
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        SpeakerConfig {
            sample_rate: SAMPLE_RATE,
            block_size: BLOCK_SIZE,
            ring_buffer_size: RING_BUFFER_SIZE,
            cycles_per_sample: DEFAULT_CYCLES_PER_SAMPLE,
        }
    }
}

/// Flat persisted speaker state.
///
/// Encoding and decoding belong to the surrounding application; this crate
/// only fills and consumes the record (see
/// [`Speaker::settings`](crate::Speaker::settings) and
/// [`Speaker::apply_settings`](crate::Speaker::apply_settings)). Every
/// field carries a serde default, so a partial record falls back
/// field-by-field instead of failing the whole load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerSettings {
    /// User-level speaker enable
    pub enabled: bool,
    /// Scaled cycles per output sample (clamped on import)
    pub cycles_per_sample: u32,
}

impl Default for SpeakerSettings {
    fn default() -> Self {
        SpeakerSettings {
            enabled: true,
            cycles_per_sample: DEFAULT_CYCLES_PER_SAMPLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SpeakerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.high_water(), 2048);
        assert_eq!(config.low_water(), 512);
    }

    #[test]
    fn test_for_clock_ntsc_matches_default() {
        let config = SpeakerConfig::for_clock(1_020_484);
        // 1_020_484 * 10_000 / 44_100 = 231_402, within a rounding hair of
        // the stock constant
        assert!(config.cycles_per_sample.abs_diff(DEFAULT_CYCLES_PER_SAMPLE) < 10);
    }

    #[test]
    fn test_for_clock_pal() {
        let config = SpeakerConfig::for_clock(985_248);
        assert_eq!(config.cycles_per_sample, 223_412);
    }

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        let mut config = SpeakerConfig::default();
        config.sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = SpeakerConfig::default();
        config.block_size = 0;
        assert!(config.validate().is_err());

        let mut config = SpeakerConfig::default();
        config.ring_buffer_size = config.block_size * 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_partial_record_falls_back_per_field() {
        let settings: SpeakerSettings = serde_json::from_str("{\"enabled\": false}")
            .expect("partial record should deserialize");
        assert!(!settings.enabled);
        assert_eq!(settings.cycles_per_sample, DEFAULT_CYCLES_PER_SAMPLE);

        let settings: SpeakerSettings =
            serde_json::from_str("{}").expect("empty record should deserialize");
        assert_eq!(settings, SpeakerSettings::default());
    }

    #[test]
    fn test_settings_round_trip() {
        let settings = SpeakerSettings {
            enabled: false,
            cycles_per_sample: 230_000,
        };
        let encoded = serde_json::to_string(&settings).expect("settings should serialize");
        let decoded: SpeakerSettings =
            serde_json::from_str(&encoded).expect("settings should deserialize");
        assert_eq!(decoded, settings);
    }

    #[test]
    fn test_latency_bound_is_under_a_tenth_of_a_second() {
        let config = SpeakerConfig::default();
        assert!(config.latency_ms() < 100.0, "latency {}", config.latency_ms());
    }
}
