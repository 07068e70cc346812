//! Speaker lifecycle and output pump
//!
//! [`Speaker`] is the subsystem facade: the emulation loop drives it once
//! per machine cycle through [`on_cycle`](Speaker::on_cycle), the host loop
//! drives [`pump`](Speaker::pump) once per frame, and the surrounding
//! application owns the instance outright, with no hidden global state.
//!
//! The speaker itself lives with the emulation loop. The only concurrent
//! actor is the sink's own playback context, which drains the device queue
//! (or pulls from the shared sample buffer) at its own cadence; the pump
//! contends with it only on the short ring-buffer critical section, never
//! on the per-cycle path.

use std::sync::Arc;

use crate::config::{SpeakerConfig, SpeakerSettings, STARTUP_SILENCE_BLOCKS};
use crate::rate::RateControl;
use crate::ring_buffer::RingBuffer;
use crate::sample_clock::SampleClock;
use crate::sink::{AudioSink, SampleFormat};
use crate::{Result, SpeakerError};

/// Lifecycle state of the speaker subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No sink and no buffers; every operation is an inert no-op
    #[default]
    Uninitialized,
    /// Initialized but not forwarding to the sink
    Stopped,
    /// Forwarding synthesized samples to the sink
    Playing,
}

/// Diagnostic counters for monitoring buffer health
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeakerStats {
    /// Samples discarded by the ring buffer's drop policy
    pub samples_dropped: u64,
    /// Samples accepted by the sink
    pub samples_enqueued: u64,
    /// Samples currently unread in the ring buffer
    pub buffer_occupancy: usize,
    /// Samples queued on the sink but not yet played
    pub queued_depth: usize,
}

/// The Apple II speaker subsystem.
///
/// Converts per-cycle toggle events into a 44.1 kHz sample stream, buffers
/// it, and pumps it to an [`AudioSink`] with adaptive rate correction.
///
/// Counting continues while stopped or muted: the duty-cycle accumulators
/// keep tracking the emulated speaker so the waveform phase survives a
/// mute/unmute, and only forwarding to the sink is gated.
pub struct Speaker {
    config: SpeakerConfig,
    state: PlaybackState,
    /// User-level speaker enable (orthogonal to the lifecycle state)
    enabled: bool,
    clock: SampleClock,
    rate: RateControl,
    buffer: Option<Arc<RingBuffer>>,
    sink: Option<Box<dyn AudioSink>>,
    /// Pump scratch block, reused across invocations
    scratch: Vec<f32>,
    /// Tail of a block the sink only partially accepted; re-offered before
    /// any new block is popped
    pending: Vec<f32>,
    samples_enqueued: u64,
}

impl Speaker {
    /// Create an uninitialized speaker.
    ///
    /// Nothing is allocated until [`initialize`](Speaker::initialize); an
    /// uninitialized speaker accepts `on_cycle` and `pump` calls as cheap
    /// no-ops.
    pub fn new(config: SpeakerConfig) -> Self {
        Speaker {
            state: PlaybackState::default(),
            enabled: true,
            clock: SampleClock::new(),
            rate: RateControl::new(
                config.cycles_per_sample,
                config.low_water(),
                config.high_water(),
            ),
            buffer: None,
            sink: None,
            scratch: Vec::new(),
            pending: Vec::new(),
            samples_enqueued: 0,
            config,
        }
    }

    /// Allocate the sample buffer and open the sink.
    ///
    /// # Errors
    ///
    /// Returns the configuration or sink failure; the speaker is left
    /// `Uninitialized` and inert, which is non-fatal to the surrounding
    /// machine.
    pub fn initialize(&mut self, mut sink: Box<dyn AudioSink>) -> Result<()> {
        if self.state != PlaybackState::Uninitialized {
            return Err(SpeakerError::ConfigError(
                "speaker is already initialized".into(),
            ));
        }
        self.config.validate()?;
        let buffer = RingBuffer::new(self.config.ring_buffer_size, self.config.high_water())?;
        sink.open(self.config.sample_rate, 1, SampleFormat::F32)?;

        self.buffer = Some(Arc::new(buffer));
        self.sink = Some(sink);
        self.scratch = vec![0.0; self.config.block_size];
        self.state = PlaybackState::Stopped;
        Ok(())
    }

    /// Start forwarding to the sink.
    ///
    /// Primes the device with a few blocks of silence so its callback has
    /// a cushion before the first live block lands. A no-op unless the
    /// speaker is `Stopped`.
    pub fn begin_play(&mut self) {
        if self.state != PlaybackState::Stopped {
            return;
        }
        self.state = PlaybackState::Playing;

        if !self.enabled {
            return;
        }
        if let Some(sink) = self.sink.as_mut() {
            let silence = vec![0.0; self.config.block_size];
            for _ in 0..STARTUP_SILENCE_BLOCKS {
                if let Err(err) = sink.enqueue(&silence) {
                    log::warn!("audio sink rejected startup priming: {err}");
                    break;
                }
            }
        }
    }

    /// Stop forwarding to the sink.
    ///
    /// Queued device audio is flushed so stale sound does not replay on
    /// resume. Cycle counting continues.
    pub fn stop_play(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.state = PlaybackState::Stopped;
        self.pending.clear();
        if let Some(sink) = self.sink.as_mut() {
            sink.flush();
        }
    }

    /// User-level unmute
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// User-level mute; synthesis continues, forwarding stops
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Whether the user-level enable is set
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether playback is active
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Current lifecycle state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Advance by one emulated machine cycle.
    ///
    /// `is_toggle` is true when this cycle accessed the speaker soft
    /// switch. Called exactly once per cycle, in cycle order, from the
    /// emulation context. Completes in small constant time; it never
    /// blocks and never allocates.
    #[inline]
    pub fn on_cycle(&mut self, is_toggle: bool) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        let cycles_per_sample = self.rate.cycles_per_sample();
        if let Some(sample) = self.clock.on_cycle(is_toggle, cycles_per_sample) {
            buffer.push(sample);
        }
    }

    /// Drain ready sample blocks into the sink and retune the rate.
    ///
    /// Called on a cadence decoupled from `on_cycle`, typically once per
    /// host frame. While stopped or muted the ready blocks are popped and
    /// discarded instead of forwarded, keeping the ring cursors fresh so a
    /// resume starts with live samples.
    pub fn pump(&mut self) {
        let (Some(buffer), Some(sink)) = (&self.buffer, self.sink.as_mut()) else {
            return;
        };
        let forward = self.enabled && self.state == PlaybackState::Playing;

        if !forward {
            self.pending.clear();
            while buffer.occupancy() >= self.config.block_size {
                buffer.pop_block_into(&mut self.scratch);
            }
            // Rate feedback is meaningless while output is being discarded
            return;
        }

        // Re-offer the tail the sink left behind last time before popping
        // anything new; order through the sink must match synthesis order.
        if !self.pending.is_empty() {
            match sink.enqueue(&self.pending) {
                Ok(accepted) => {
                    self.samples_enqueued += accepted as u64;
                    self.pending.drain(..accepted);
                }
                Err(err) => {
                    log::warn!("audio sink rejected pending block: {err}");
                }
            }
        }

        while self.pending.is_empty() && buffer.occupancy() >= self.config.block_size {
            let got = buffer.pop_block_into(&mut self.scratch);
            match sink.enqueue(&self.scratch[..got]) {
                Ok(accepted) => {
                    self.samples_enqueued += accepted as u64;
                    if accepted < got {
                        self.pending.extend_from_slice(&self.scratch[accepted..got]);
                    }
                }
                Err(err) => {
                    // Transient: park the block and retry next pump
                    log::warn!("audio sink rejected block: {err}");
                    self.pending.extend_from_slice(&self.scratch[..got]);
                }
            }
        }

        // Bound end-to-end latency: a backed-up device queue gets cut,
        // not grown
        let depth = sink.queued_depth();
        if depth > self.config.high_water() {
            log::debug!("flushing {depth} queued samples to bound latency");
            sink.flush();
        }

        let backlog = buffer.occupancy() + sink.queued_depth();
        self.rate.retune(backlog);
    }

    /// Fill the persisted settings record
    pub fn settings(&self) -> SpeakerSettings {
        SpeakerSettings {
            enabled: self.enabled,
            cycles_per_sample: self.rate.cycles_per_sample(),
        }
    }

    /// Apply a persisted settings record.
    ///
    /// An out-of-range or zero `cycles_per_sample` is clamped silently to
    /// the nearest valid bound; a partial record has already been
    /// defaulted field-by-field by its deserializer.
    pub fn apply_settings(&mut self, settings: SpeakerSettings) {
        self.enabled = settings.enabled;
        self.rate.set_cycles_per_sample(settings.cycles_per_sample);
    }

    /// Snapshot the diagnostic counters
    pub fn stats(&self) -> SpeakerStats {
        SpeakerStats {
            samples_dropped: self.buffer.as_ref().map_or(0, |b| b.dropped()),
            samples_enqueued: self.samples_enqueued,
            buffer_occupancy: self.buffer.as_ref().map_or(0, |b| b.occupancy()),
            queued_depth: self.sink.as_ref().map_or(0, |s| s.queued_depth()),
        }
    }

    /// Shared handle to the sample buffer, for sinks whose playback
    /// context prefers to pull synthesized samples directly.
    ///
    /// `None` until [`initialize`](Speaker::initialize) succeeds.
    pub fn sample_buffer(&self) -> Option<Arc<RingBuffer>> {
        self.buffer.clone()
    }

    /// Construction configuration
    pub fn config(&self) -> &SpeakerConfig {
        &self.config
    }
}

impl Drop for Speaker {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            sink.close();
        }
    }
}
