//! Per-file progress tracking.
//!
//! Converts raw byte counts reported by the upload stream into a fraction in
//! `[0, 1]` that never goes backwards.

/// Tracks bytes sent for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressTracker {
    total: u64,
    sent: u64,
    last: f64,
}

impl ProgressTracker {
    /// Create a tracker for a file of `total` bytes.
    pub fn new(total: u64) -> Self {
        Self {
            total,
            sent: 0,
            last: 0.0,
        }
    }

    /// Total bytes expected.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Bytes recorded so far (saturates at `u64::MAX`).
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Last reported fraction.
    pub fn fraction(&self) -> f64 {
        self.last
    }

    /// Record `bytes` more sent.
    ///
    /// Returns the new fraction if it moved forward, `None` otherwise. The
    /// value is capped below `1.0` until [`finish`](Self::finish) so that a
    /// completed file is the only one to report exactly `1.0`.
    pub fn advance(&mut self, bytes: u64) -> Option<f64> {
        self.sent = self.sent.saturating_add(bytes);
        if self.total == 0 {
            return None;
        }
        let raw = (self.sent as f64 / self.total as f64).min(1.0);
        let next = if raw >= 1.0 { self.last.max(0.999) } else { raw };
        if next > self.last {
            self.last = next;
            Some(next)
        } else {
            None
        }
    }

    /// Mark the transfer complete. Always returns exactly `1.0`.
    pub fn finish(&mut self) -> f64 {
        self.last = 1.0;
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_fraction_of_total() {
        let mut tracker = ProgressTracker::new(200);
        assert_eq!(tracker.advance(50), Some(0.25));
        assert_eq!(tracker.advance(50), Some(0.5));
        assert_eq!(tracker.sent(), 100);
    }

    #[test]
    fn zero_byte_chunks_report_nothing() {
        let mut tracker = ProgressTracker::new(100);
        tracker.advance(10);
        assert_eq!(tracker.advance(0), None);
    }

    #[test]
    fn never_reaches_one_before_finish() {
        let mut tracker = ProgressTracker::new(10);
        let f = tracker.advance(10).unwrap();
        assert!(f < 1.0);
        assert_eq!(tracker.advance(5), None);
        assert_eq!(tracker.finish(), 1.0);
        assert_eq!(tracker.fraction(), 1.0);
    }

    #[test]
    fn overshoot_is_clamped() {
        let mut tracker = ProgressTracker::new(10);
        tracker.advance(4);
        tracker.advance(400);
        assert!(tracker.fraction() <= 1.0);
    }

    #[test]
    fn empty_file_only_reports_finish() {
        let mut tracker = ProgressTracker::new(0);
        assert_eq!(tracker.advance(0), None);
        assert_eq!(tracker.finish(), 1.0);
    }

    #[test]
    fn sequence_is_non_decreasing() {
        let mut tracker = ProgressTracker::new(1000);
        let mut seen = Vec::new();
        for chunk in [100, 0, 250, 1, 649, 100] {
            if let Some(f) = tracker.advance(chunk) {
                seen.push(f);
            }
        }
        seen.push(tracker.finish());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&1.0));
    }
}
