//! Bounded per-metric sample buffer and moving-average smoothing.

use std::collections::VecDeque;

/// Fixed-capacity FIFO of raw scalar samples for one metric.
///
/// Pushing past capacity evicts the oldest sample, so the buffer always
/// holds the most recent `capacity` readings in arrival order.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the last `window` samples.
    ///
    /// Degrades to the mean of whatever is available when fewer than
    /// `window` samples exist, and to `0.0` on an empty buffer. Always
    /// returns a number; smoothing never fails.
    pub fn moving_average(&self, window: usize) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let take = window.min(self.samples.len());
        let sum: f64 = self.samples.iter().rev().take(take).sum();
        sum / take as f64
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let mut buf = SampleBuffer::with_capacity(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            buf.push(v);
        }
        assert_eq!(buf.len(), 3);
        let contents: Vec<f64> = buf.iter().copied().collect();
        assert_eq!(contents, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn average_of_empty_buffer_is_zero() {
        let buf = SampleBuffer::with_capacity(4);
        assert_eq!(buf.moving_average(10), 0.0);
    }

    #[test]
    fn average_degrades_to_available_samples() {
        let mut buf = SampleBuffer::with_capacity(100);
        buf.push(2.0);
        buf.push(4.0);
        // Only two samples exist, so a window of 10 means "average them all".
        assert_eq!(buf.moving_average(10), 3.0);
    }

    #[test]
    fn average_uses_last_window_samples() {
        let mut buf = SampleBuffer::with_capacity(100);
        for v in [10.0, 10.0, 10.0, 1.0, 2.0, 3.0] {
            buf.push(v);
        }
        assert_eq!(buf.moving_average(3), 2.0);
    }
}
