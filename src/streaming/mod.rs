//! Real-time audio output via rodio
//!
//! [`RodioSink`] adapts the queue-style [`AudioSink`] contract onto a rodio
//! output stream. Blocks enqueued by the pump land in a shared queue; a
//! rodio `Source` drains it from the playback thread, yielding silence on
//! underrun so the stream never starves the device.
//!
//! The output stream itself is owned by a dedicated thread (rodio's stream
//! handle is not `Send`), so the sink stays movable across threads along
//! with the speaker that owns it.

use parking_lot::Mutex;
use rodio::{OutputStream, Sink, Source};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use crate::sink::{AudioSink, SampleFormat};
use crate::{Result, SpeakerError};

/// Batch size the playback source pulls from the shared queue, keeping the
/// playback thread from taking the lock on every sample
const SOURCE_BATCH: usize = 256;

/// Hard ceiling on queued samples; the pump's latency flush keeps the
/// working depth far lower, this only bounds a stalled device
const MAX_QUEUED_SAMPLES: usize = 1 << 16;

/// Audio source that drains the shared sample queue
struct QueueSource {
    queue: Arc<Mutex<VecDeque<f32>>>,
    sample_rate: u32,
    channels: u16,
    /// Local batch refilled from the shared queue
    batch: Vec<f32>,
    batch_pos: usize,
}

impl Iterator for QueueSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.batch_pos >= self.batch.len() {
            let mut queue = self.queue.lock();
            let take = queue.len().min(SOURCE_BATCH);
            self.batch.clear();
            self.batch.extend(queue.drain(..take));
            drop(queue);
            self.batch_pos = 0;

            if self.batch.is_empty() {
                // Underrun: silence keeps the stream alive
                return Some(0.0);
            }
        }

        let sample = self.batch[self.batch_pos];
        self.batch_pos += 1;
        Some(sample)
    }
}

impl Source for QueueSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Thread keeping the rodio output stream alive while the sink is open
struct Worker {
    shutdown: Arc<AtomicBool>,
    handle: std::thread::JoinHandle<()>,
}

/// Rodio-backed audio sink
///
/// ```no_run
/// use a2speaker::{streaming::RodioSink, Speaker, SpeakerConfig};
///
/// let mut speaker = Speaker::new(SpeakerConfig::default());
/// speaker.initialize(Box::new(RodioSink::new())).unwrap();
/// ```
pub struct RodioSink {
    queue: Arc<Mutex<VecDeque<f32>>>,
    max_queued: usize,
    worker: Option<Worker>,
}

impl RodioSink {
    /// Create an unopened sink with the default queue ceiling
    pub fn new() -> Self {
        Self::with_max_queued(MAX_QUEUED_SAMPLES)
    }

    /// Create an unopened sink with a custom queue ceiling; enqueues past
    /// it are partially accepted, surfacing backpressure to the pump
    pub fn with_max_queued(max_queued: usize) -> Self {
        RodioSink {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            max_queued,
            worker: None,
        }
    }
}

impl Default for RodioSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for RodioSink {
    fn open(&mut self, sample_rate: u32, channels: u16, format: SampleFormat) -> Result<()> {
        if format != SampleFormat::F32 {
            return Err(SpeakerError::SinkError(format!(
                "unsupported sample format {format:?}"
            )));
        }
        if self.worker.is_some() {
            return Err(SpeakerError::SinkError("sink is already open".into()));
        }

        let queue = Arc::clone(&self.queue);
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("a2speaker-audio".into())
            .spawn(move || {
                // The stream must be created and dropped on this thread
                let (stream, stream_handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(err) => {
                        let _ = ready_tx.send(Err(SpeakerError::SinkError(format!(
                            "failed to open output stream: {err}"
                        ))));
                        return;
                    }
                };
                let sink = match Sink::try_new(&stream_handle) {
                    Ok(sink) => sink,
                    Err(err) => {
                        let _ = ready_tx.send(Err(SpeakerError::SinkError(format!(
                            "failed to create playback sink: {err}"
                        ))));
                        return;
                    }
                };

                sink.append(QueueSource {
                    queue,
                    sample_rate,
                    channels,
                    batch: Vec::with_capacity(SOURCE_BATCH),
                    batch_pos: 0,
                });
                let _ = ready_tx.send(Ok(()));

                while !thread_shutdown.load(Ordering::Acquire) {
                    std::thread::sleep(Duration::from_millis(10));
                }

                drop(sink);
                drop(stream);
            })
            .map_err(|err| {
                SpeakerError::SinkError(format!("failed to spawn audio thread: {err}"))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(Worker { shutdown, handle });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(SpeakerError::SinkError(
                    "audio thread exited before becoming ready".into(),
                ))
            }
        }
    }

    fn enqueue(&mut self, samples: &[f32]) -> Result<usize> {
        if self.worker.is_none() {
            return Err(SpeakerError::SinkError("sink is not open".into()));
        }
        let mut queue = self.queue.lock();
        let room = self.max_queued.saturating_sub(queue.len());
        let accepted = samples.len().min(room);
        queue.extend(samples[..accepted].iter().copied());
        Ok(accepted)
    }

    fn queued_depth(&self) -> usize {
        self.queue.lock().len()
    }

    fn flush(&mut self) {
        self.queue.lock().clear();
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown.store(true, Ordering::Release);
            if worker.handle.join().is_err() {
                log::warn!("audio thread panicked during shutdown");
            }
        }
        self.queue.lock().clear();
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        self.close();
    }
}
