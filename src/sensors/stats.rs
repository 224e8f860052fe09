//! Fixed-capacity circular buffer with running statistics.
//!
//! Holds the most recent `N` samples in a zero-initialised ring.  Every
//! statistic is taken over all `N` slots, including slots that have not
//! been written yet: until the buffer has wrapped once, the unwritten
//! zeros pull the mean and the deviation towards zero.  This cold-start
//! bias is intentional and is not corrected.
//!
//! Storage is a `heapless::Vec`, so the ring never allocates and its
//! capacity is bounded by [`MAX_RING_CAPACITY`].

use heapless::Vec;

/// Largest supported ring capacity.
pub const MAX_RING_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct StatsRingBuffer {
    slots: Vec<f32, MAX_RING_CAPACITY>,
    cursor: usize,
}

impl StatsRingBuffer {
    /// Create a ring of `capacity` zeroed slots.
    ///
    /// Returns `None` if `capacity` is zero or exceeds [`MAX_RING_CAPACITY`].
    pub fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        let mut slots = Vec::new();
        slots.resize(capacity, 0.0).ok()?;
        Some(Self { slots, cursor: 0 })
    }

    /// Overwrite the oldest slot and advance the cursor.
    pub fn append(&mut self, x: f32) {
        self.slots[self.cursor] = x;
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Number of slots.  Constant for the lifetime of the buffer.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn sum(&self) -> f32 {
        self.slots.iter().sum()
    }

    /// Sum of all slots divided by the capacity.
    pub fn average(&self) -> f32 {
        self.sum() / self.slots.len() as f32
    }

    /// Population standard deviation over all slots.
    ///
    /// Single pass (Welford): running mean plus running sum of squared
    /// deviations, so large intervals do not lose precision to a
    /// sum-of-squares subtraction.
    pub fn standard_deviation(&self) -> f32 {
        let mut n = 0u32;
        let mut mean = 0.0f32;
        let mut m2 = 0.0f32;

        for &x in &self.slots {
            n += 1;
            let delta = x - mean;
            mean += delta / n as f32;
            m2 += delta * (x - mean);
        }

        if n == 0 {
            return 0.0;
        }
        (m2 / n as f32).sqrt()
    }

    /// Read-only view of the slots in storage order (not age order).
    pub fn as_slice(&self) -> &[f32] {
        &self.slots
    }
}
