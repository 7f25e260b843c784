//! Fixed-capacity rolling average

use heapless::Deque;

/// Mean of the last `N` samples
///
/// Once full, every new sample evicts the oldest one.
#[derive(Debug, Clone, Default)]
pub struct RollingAverage<const N: usize> {
    samples: Deque<i32, N>,
}

impl<const N: usize> RollingAverage<N> {
    /// Create an empty window
    pub const fn new() -> Self {
        Self {
            samples: Deque::new(),
        }
    }

    /// Add a sample, evicting the oldest one if the window is full
    pub fn push(&mut self, sample: i32) {
        if self.samples.is_full() {
            self.samples.pop_front();
        }
        // Cannot fail: a slot was just freed if there was none
        let _ = self.samples.push_back(sample);
    }

    /// Mean of the samples held, rounded toward zero
    pub fn average(&self) -> Option<i32> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: i64 = self.samples.iter().map(|&s| s as i64).sum();
        Some((sum / self.samples.len() as i64) as i32)
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<i32> {
        self.samples.back().copied()
    }

    /// Samples held, oldest first
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.samples.iter().copied()
    }

    /// Sum and count of the samples held
    pub fn totals(&self) -> (i64, usize) {
        (self.iter().map(i64::from).sum(), self.len())
    }

    /// Number of samples held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if no samples are held
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
