//! Peak usage tracking for a budget.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct PeakTracker {
    peak_bytes: AtomicUsize,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self {
            peak_bytes: AtomicUsize::new(0),
        }
    }

    /// Record a new "used bytes" value; updates peak if higher.
    pub fn record_used(&self, used_bytes: usize) {
        let prev = self.peak_bytes.fetch_max(used_bytes, Ordering::AcqRel);
        #[cfg(feature = "tracing")]
        if used_bytes > prev {
            tracing::trace!(used_bytes, "new peak memory usage");
        }
        #[cfg(not(feature = "tracing"))]
        let _ = prev;
    }

    pub fn peak(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::PeakTracker;

    #[test]
    fn keeps_maximum() {
        let t = PeakTracker::new();
        t.record_used(10);
        t.record_used(40);
        t.record_used(5);
        assert_eq!(t.peak(), 40);
    }
}
