//! Audio sink abstraction
//!
//! The synthesis core has zero dependency on a concrete audio backend: it
//! talks to a queue-style device through this narrow trait, the same shape
//! as a platform audio queue (append samples, probe the queued depth, drop
//! the queue). Any backend is an adapter implementing it; see
//! `streaming::RodioSink` for the rodio one.

use crate::Result;

/// Sample encodings a sink may be asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 32-bit float in [-1.0, 1.0]
    F32,
    /// Signed 16-bit PCM
    I16,
}

/// Queue-style audio output device.
///
/// The pump appends blocks with [`enqueue`](AudioSink::enqueue) and bounds
/// end-to-end latency by probing [`queued_depth`](AudioSink::queued_depth)
/// and cutting the queue with [`flush`](AudioSink::flush) when the device
/// falls behind. The device drains the queue from its own callback context
/// at its own cadence; this crate never controls that thread's timing.
pub trait AudioSink: Send {
    /// Open the output device.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` when the device is unavailable or cannot
    /// produce the requested format. The caller treats this as non-fatal:
    /// the speaker stays uninitialized and inert.
    fn open(&mut self, sample_rate: u32, channels: u16, format: SampleFormat) -> Result<()>;

    /// Append samples to the device queue.
    ///
    /// Returns the number of samples accepted. Accepting fewer than
    /// offered signals transient backpressure, not an error; the caller
    /// re-offers the remainder later.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` when the device cannot take data at all right
    /// now. Also transient; the caller retries on its next cadence.
    fn enqueue(&mut self, samples: &[f32]) -> Result<usize>;

    /// Samples queued on the device but not yet played
    fn queued_depth(&self) -> usize;

    /// Discard everything queued but not yet played
    fn flush(&mut self);

    /// Release the device.
    ///
    /// No further callback activity may occur once this returns; that
    /// guarantee is the implementation's to keep.
    fn close(&mut self);
}

/// Sink that swallows all audio.
///
/// Useful for headless operation and tests: everything is accepted,
/// nothing is ever queued.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn open(&mut self, _sample_rate: u32, _channels: u16, _format: SampleFormat) -> Result<()> {
        Ok(())
    }

    fn enqueue(&mut self, samples: &[f32]) -> Result<usize> {
        Ok(samples.len())
    }

    fn queued_depth(&self) -> usize {
        0
    }

    fn flush(&mut self) {}

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink_accepts_everything() {
        let mut sink = NullSink;
        sink.open(44_100, 1, SampleFormat::F32).unwrap();
        assert_eq!(sink.enqueue(&[0.0; 1024]).unwrap(), 1024);
        assert_eq!(sink.queued_depth(), 0);
        sink.flush();
        sink.close();
    }
}
