//! Fixed-capacity audio accumulation buffer with snapshot-and-clear drain.
//!
//! The capture producer appends `f32` samples; the processing pass drains
//! the whole buffer atomically (under the owner's lock) and leaves it empty.
//! When the buffer is full, new samples **overwrite** the oldest data so the
//! most recent `capacity` samples are always available and memory stays
//! bounded no matter how long a pass is delayed.

// ---------------------------------------------------------------------------
// AudioBuffer
// ---------------------------------------------------------------------------

/// Circular sample buffer sized in seconds of 16 kHz-style mono audio.
///
/// ## Overflow behaviour
///
/// When [`push_slice`](Self::push_slice) would exceed `capacity`, the oldest
/// samples are silently overwritten.  The buffer never allocates beyond its
/// initial capacity.
pub struct AudioBuffer {
    buf: Vec<f32>,
    capacity: usize,
    sample_rate: u32,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid samples currently stored (≤ `capacity`).
    len: usize,
}

impl AudioBuffer {
    /// Create a buffer holding up to `max_secs` seconds at `sample_rate` Hz.
    ///
    /// # Panics
    ///
    /// Panics if the resulting capacity is zero.
    pub fn new(sample_rate: u32, max_secs: f32) -> Self {
        let capacity = (sample_rate as f32 * max_secs) as usize;
        assert!(capacity > 0, "AudioBuffer capacity must be > 0");
        Self {
            buf: vec![0.0; capacity],
            capacity,
            sample_rate,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append `data`, overwriting the oldest samples on overflow.
    pub fn push_slice(&mut self, data: &[f32]) {
        for &sample in data {
            self.buf[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            if self.len < self.capacity {
                self.len += 1;
            }
        }
    }

    /// Drain all stored samples in chronological order and reset the buffer.
    ///
    /// This is the snapshot-and-clear step: the caller holds the lock for
    /// the duration of this call, so the producer can never observe a
    /// half-written buffer.
    pub fn drain(&mut self) -> Vec<f32> {
        if self.len == 0 {
            return Vec::new();
        }

        // Before the first overflow valid data starts at 0; afterwards the
        // oldest sample sits at write_pos.
        let read_pos = if self.len < self.capacity {
            0
        } else {
            self.write_pos
        };

        let mut out = Vec::with_capacity(self.len);
        for i in 0..self.len {
            out.push(self.buf[(read_pos + i) % self.capacity]);
        }

        self.clear();
        out
    }

    /// Discard all samples and reset the write position.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Number of samples currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when no samples are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Buffered duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len as f32 / self.sample_rate as f32
    }

    /// `true` once at least `min_secs` of audio has accumulated.
    pub fn has_at_least(&self, min_secs: f32) -> bool {
        self.duration_secs() >= min_secs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Push / drain ------------------------------------------------------

    #[test]
    fn push_and_drain_preserves_order() {
        let mut buf = AudioBuffer::new(4, 1.0);
        buf.push_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.drain(), vec![1.0, 2.0, 3.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_keeps_the_newest_samples() {
        let mut buf = AudioBuffer::new(4, 1.0); // capacity 4
        buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.drain(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn drain_empty_returns_empty_vec() {
        let mut buf = AudioBuffer::new(16_000, 60.0);
        assert_eq!(buf.drain(), Vec::<f32>::new());
    }

    #[test]
    fn reuse_after_drain() {
        let mut buf = AudioBuffer::new(4, 1.0);
        buf.push_slice(&[1.0, 2.0]);
        assert_eq!(buf.drain(), vec![1.0, 2.0]);
        buf.push_slice(&[3.0]);
        assert_eq!(buf.drain(), vec![3.0]);
    }

    // ---- Duration threshold ------------------------------------------------

    #[test]
    fn duration_tracks_sample_count() {
        let mut buf = AudioBuffer::new(16_000, 60.0);
        buf.push_slice(&vec![0.0; 8_000]);
        assert!((buf.duration_secs() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn has_at_least_is_inclusive_at_the_threshold() {
        let mut buf = AudioBuffer::new(16_000, 60.0);
        buf.push_slice(&vec![0.0; 7_999]);
        assert!(!buf.has_at_least(0.5));
        buf.push_slice(&[0.0]);
        assert!(buf.has_at_least(0.5));
    }

    // ---- Panic guard -------------------------------------------------------

    #[test]
    #[should_panic(expected = "AudioBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ = AudioBuffer::new(16_000, 0.0);
    }
}
