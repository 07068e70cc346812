//! Apple II speaker emulation
//!
//! The Apple II speaker is a single bit of hardware: any access to the
//! $C030 soft switch flips the cone between its two rest positions, and
//! that is the only control the machine has. Audible sound is produced by
//! toggling at audio rates from the CPU. This crate converts that sparse
//! toggle stream, arriving at the ~1 MHz bus cycle rate, into a 44.1 kHz
//! PCM stream suitable for a host audio device, without ever stalling the
//! emulated bus.
//!
//! # Features
//! - Duty-cycle synthesis: each output sample is the average speaker
//!   position over its window, the correct low-pass behavior for toggles
//!   faster than the sample period
//! - Fixed-point cycle accounting with residual carry (no phase drift over
//!   long sessions)
//! - Lossy ring buffer between the emulation clock and the audio sink;
//!   overflow drops the oldest samples instead of blocking the bus
//! - Adaptive rate correction that keeps buffered latency bounded when the
//!   emulated and host clocks disagree
//! - Narrow [`AudioSink`] trait so the core has zero dependency on a
//!   concrete audio backend
//!
//! # Crate feature flags
//! - `streaming` (opt-in): rodio-backed [`RodioSink`](streaming::RodioSink)
//!   adapter for real-time output
//!
//! # Quick start
//! ```no_run
//! use a2speaker::{NullSink, Speaker, SpeakerConfig};
//!
//! let mut speaker = Speaker::new(SpeakerConfig::default());
//! speaker.initialize(Box::new(NullSink)).unwrap();
//! speaker.begin_play();
//!
//! // From the emulation loop: once per machine cycle. A $C030 access
//! // toggles the speaker.
//! speaker.on_cycle(true);
//! speaker.on_cycle(false);
//!
//! // From the host loop, once per frame: drain ready samples into the
//! // sink and retune the sample rate against backpressure.
//! speaker.pump();
//! ```
//!
//! ## Real-time streaming
//! ```no_run
//! # #[cfg(feature = "streaming")]
//! # {
//! use a2speaker::{streaming::RodioSink, Speaker, SpeakerConfig};
//!
//! let mut speaker = Speaker::new(SpeakerConfig::default());
//! speaker.initialize(Box::new(RodioSink::new())).unwrap();
//! speaker.begin_play();
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod rate;
pub mod ring_buffer;
pub mod sample_clock;
pub mod sink;
pub mod speaker;

#[cfg(feature = "streaming")]
pub mod streaming; // Audio Output & Streaming

/// Error types for speaker subsystem operations
#[derive(thiserror::Error, Debug)]
pub enum SpeakerError {
    /// Audio sink unavailable or rejected a request
    #[error("Audio sink error: {0}")]
    SinkError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for SpeakerError {
    /// Converts a String into `SpeakerError::Other`.
    ///
    /// Convenience for generic string errors; prefer the specific variants
    /// (`SinkError`, `ConfigError`) where the failure class is known.
    fn from(msg: String) -> Self {
        SpeakerError::Other(msg)
    }
}

impl From<&str> for SpeakerError {
    /// Converts a string slice into `SpeakerError::Other`.
    fn from(msg: &str) -> Self {
        SpeakerError::Other(msg.to_string())
    }
}

/// Result type for speaker subsystem operations
pub type Result<T> = std::result::Result<T, SpeakerError>;

// Public API exports
pub use config::{SpeakerConfig, SpeakerSettings};
pub use rate::RateControl;
pub use ring_buffer::RingBuffer;
pub use sample_clock::SampleClock;
pub use sink::{AudioSink, NullSink, SampleFormat};
pub use speaker::{PlaybackState, Speaker, SpeakerStats};

#[cfg(feature = "streaming")]
pub use streaming::RodioSink;
