//! Bounded IQ Sample Buffer

use num_complex::Complex64;
use std::collections::VecDeque;

/// Default buffer capacity (4 windows of 1024 samples)
pub const DEFAULT_CAPACITY: usize = 4096;

/// Bounded FIFO of complex baseband samples.
///
/// Pushing past capacity evicts the oldest samples, so the buffer always holds
/// the most recent `capacity` samples a source produced.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    /// Samples in arrival order (front is oldest)
    samples: VecDeque<Complex64>,
    /// Maximum number of samples retained
    capacity: usize,
    /// Total samples pushed since creation (for statistics)
    total_written: u64,
}

impl SampleBuffer {
    /// Create a new buffer with given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
        }
    }

    /// Create a buffer with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Push one sample, evicting the oldest if full
    pub fn push(&mut self, sample: Complex64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.total_written += 1;
    }

    /// Push a block of samples in order
    pub fn extend(&mut self, block: &[Complex64]) {
        // Only the tail of an oversized block can survive
        let skip = block.len().saturating_sub(self.capacity);
        self.total_written += skip as u64;
        for &sample in &block[skip..] {
            self.push(sample);
        }
    }

    /// Number of samples currently buffered
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.samples.len() as f64 / self.capacity as f64
    }

    /// Total samples pushed since creation
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Copy the `out.len()` most recent samples into `out`, oldest first.
    ///
    /// Returns `false` and leaves `out` untouched when fewer samples are buffered.
    pub fn copy_latest(&self, out: &mut [Complex64]) -> bool {
        let count = out.len();
        if self.samples.len() < count {
            return false;
        }
        let start = self.samples.len() - count;
        for (dst, src) in out.iter_mut().zip(self.samples.range(start..)) {
            *dst = *src;
        }
        true
    }

    /// Read the last N samples (oldest first)
    pub fn read_last(&self, count: usize) -> Vec<Complex64> {
        let count = count.min(self.samples.len());
        let start = self.samples.len() - count;
        self.samples.range(start..).copied().collect()
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(i: usize) -> Complex64 {
        Complex64::new(i as f64, -(i as f64))
    }

    #[test]
    fn test_push_and_read() {
        let mut buffer = SampleBuffer::new(10);
        for i in 0..5 {
            buffer.push(sample(i));
        }

        assert_eq!(buffer.len(), 5);
        let latest = buffer.read_last(3);
        assert_eq!(latest, vec![sample(2), sample(3), sample(4)]);
    }

    #[test]
    fn test_overwrite_oldest() {
        let mut buffer = SampleBuffer::new(5);
        for i in 0..10 {
            buffer.push(sample(i));
        }

        assert_eq!(buffer.len(), 5);
        assert!(buffer.is_full());
        assert_eq!(buffer.read_last(5)[0], sample(5));
        assert_eq!(buffer.total_written(), 10);
    }

    #[test]
    fn test_copy_latest_underflow() {
        let mut buffer = SampleBuffer::new(16);
        buffer.extend(&[sample(1), sample(2)]);

        let mut window = vec![Complex64::new(9.0, 9.0); 4];
        assert!(!buffer.copy_latest(&mut window));
        assert!(window.iter().all(|s| *s == Complex64::new(9.0, 9.0)));
    }

    #[test]
    fn test_copy_latest_takes_newest() {
        let mut buffer = SampleBuffer::new(16);
        let block: Vec<_> = (0..12).map(sample).collect();
        buffer.extend(&block);

        let mut window = vec![Complex64::default(); 4];
        assert!(buffer.copy_latest(&mut window));
        assert_eq!(window, vec![sample(8), sample(9), sample(10), sample(11)]);
    }

    #[test]
    fn test_fill_ratio() {
        let mut buffer = SampleBuffer::new(100);
        assert_eq!(buffer.fill_ratio(), 0.0);

        for i in 0..50 {
            buffer.push(sample(i));
        }

        assert!((buffer.fill_ratio() - 0.5).abs() < 0.01);
    }

    proptest! {
        #[test]
        fn prop_len_never_exceeds_capacity(capacity in 1usize..64, pushes in 0usize..256) {
            let mut buffer = SampleBuffer::new(capacity);
            let block: Vec<_> = (0..pushes).map(sample).collect();
            buffer.extend(&block);
            prop_assert!(buffer.len() <= capacity);
            prop_assert_eq!(buffer.len(), pushes.min(capacity));
            prop_assert_eq!(buffer.total_written(), pushes as u64);
        }
    }
}
