//! Ring buffer between the emulation clock and the audio sink
//!
//! A fixed-capacity circular store decoupling two rates that never quite
//! agree: the producer pushes one sample every ~23 emulated cycles, the
//! consumer drains blocks at the host's cadence. The producer must never
//! stall, so overflow is a lossy degrade: once occupancy would pass the
//! high-water mark the oldest unread samples are dropped. Overflow is never
//! an error or a wait.
//!
//! Cursor arithmetic uses monotonic positions masked by a power-of-two
//! capacity. Both cursors are only ever mutated inside the store's critical
//! section, which also orders the data copies; the atomics exist so
//! `occupancy()` and `dropped()` stay lock-free for observers.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::{Result, SpeakerError};

/// Ring buffer for synthesized speaker samples
///
/// # Thread Safety
/// - One producer (the emulation loop, via `push`)
/// - One consumer (the pump or an audio callback, via `pop_block_into`)
/// - The store mutex serializes the short copy sections; position queries
///   are atomic loads and never block either side
#[derive(Debug)]
pub struct RingBuffer {
    /// Shared sample storage (protected by mutex for thread safety)
    buffer: Mutex<Vec<f32>>,
    /// Monotonic write position (producer)
    write_pos: AtomicUsize,
    /// Monotonic read position (consumer, and the drop policy)
    read_pos: AtomicUsize,
    /// Occupancy ceiling; pushing past it drops the oldest samples
    high_water: usize,
    /// Total samples discarded by the drop policy
    dropped: AtomicU64,
    /// Capacity (power of 2 for efficient modulo operation)
    capacity: usize,
    /// Capacity mask for fast modulo: `pos & mask == pos % capacity`
    mask: usize,
}

impl RingBuffer {
    /// Create a new ring buffer.
    ///
    /// Capacity is rounded up to the next power of 2 for efficient
    /// operations.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Requested capacity is 0
    /// - Requested capacity would exceed maximum safe allocation (512 MB)
    /// - The high-water mark is 0 or does not fit inside the capacity
    pub fn new(requested_capacity: usize, high_water: usize) -> Result<Self> {
        if requested_capacity == 0 {
            return Err(SpeakerError::ConfigError(
                "ring buffer capacity must be greater than 0".into(),
            ));
        }

        let capacity = requested_capacity.next_power_of_two();

        // 512 MB worth of f32 samples
        const MAX_CAPACITY: usize = 512 * 1024 * 1024 / std::mem::size_of::<f32>();
        if capacity > MAX_CAPACITY {
            return Err(SpeakerError::ConfigError(format!(
                "ring buffer capacity {capacity} exceeds maximum safe size {MAX_CAPACITY}"
            )));
        }

        if high_water == 0 || high_water >= capacity {
            return Err(SpeakerError::ConfigError(format!(
                "high-water mark {high_water} must lie inside capacity {capacity}"
            )));
        }

        Ok(RingBuffer {
            buffer: Mutex::new(vec![0.0; capacity]),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            high_water,
            dropped: AtomicU64::new(0),
            capacity,
            mask: capacity - 1,
        })
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the configured high-water mark
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Number of samples currently unread
    pub fn occupancy(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Total samples discarded by the drop policy since construction
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Append one sample (producer).
    ///
    /// Never fails and never waits: if the sample would lift occupancy past
    /// the high-water mark, the oldest unread samples are dropped first.
    /// The surviving stream stays contiguous and in synthesis order.
    pub fn push(&self, sample: f32) {
        let mut buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let occupied = write_pos.wrapping_sub(read_pos);

        if occupied + 1 > self.high_water {
            let excess = occupied + 1 - self.high_water;
            self.read_pos
                .store(read_pos.wrapping_add(excess), Ordering::Release);
            self.dropped.fetch_add(excess as u64, Ordering::Relaxed);
        }

        buf[write_pos & self.mask] = sample;
        drop(buf); // Release lock before publishing the position

        self.write_pos
            .store(write_pos.wrapping_add(1), Ordering::Release);
    }

    /// Read up to `dest.len()` samples (consumer).
    ///
    /// Returns the number of samples actually copied; fewer than requested
    /// means the buffer ran dry and the caller treats the shortfall as
    /// silence.
    pub fn pop_block_into(&self, dest: &mut [f32]) -> usize {
        let buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let available = write_pos.wrapping_sub(read_pos);

        let to_read = dest.len().min(available);
        if to_read == 0 {
            return 0;
        }

        let read_idx = read_pos & self.mask;
        if read_idx + to_read <= self.capacity {
            dest[..to_read].copy_from_slice(&buf[read_idx..read_idx + to_read]);
        } else {
            // Wrap-around read
            let first_part = self.capacity - read_idx;
            dest[..first_part].copy_from_slice(&buf[read_idx..]);
            dest[first_part..to_read].copy_from_slice(&buf[..to_read - first_part]);
        }

        drop(buf); // Release lock before publishing the position

        self.read_pos
            .store(read_pos.wrapping_add(to_read), Ordering::Release);

        to_read
    }
}
