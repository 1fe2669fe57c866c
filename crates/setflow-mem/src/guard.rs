//! MemoryBudget + RAII guard implementations.
//!
//! Growing state (set engines) holds one guard and resizes it as it grows.
//! Dropping the guard returns the bytes to the budget, which is how a
//! cancelled operator releases its partially built set.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use setflow_core::budget::{BudgetGuard, MemoryBudget};

use crate::error::{Error, Result};
use crate::tracking::PeakTracker;

/// Shared inner state for the budget.
struct BudgetInner {
    capacity: usize,
    used: AtomicUsize,
    peak: PeakTracker,
}

impl BudgetInner {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: AtomicUsize::new(0),
            peak: PeakTracker::new(),
        }
    }

    fn try_acquire(&self, bytes: usize) -> bool {
        loop {
            let cur = self.used.load(Ordering::Relaxed);
            let next = cur.saturating_add(bytes);
            if next > self.capacity {
                return false;
            }
            if self
                .used
                .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                self.peak.record_used(next);
                return true;
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }

    fn exceeded(&self, tag: &'static str, requested: usize) -> Error {
        Error::BudgetExceeded {
            tag,
            requested,
            capacity: self.capacity,
            used: self.used.load(Ordering::Relaxed),
        }
    }
}

/// Concrete MemoryBudget shared by all operators of one query.
#[derive(Clone)]
pub struct MemoryBudgetImpl {
    inner: Arc<BudgetInner>,
}

impl MemoryBudgetImpl {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Arc::new(BudgetInner::new(capacity_bytes)),
        }
    }

    /// Highest `used` value observed since creation.
    pub fn peak_bytes(&self) -> usize {
        self.inner.peak.peak()
    }

    /// Acquire `bytes` or report how far over the cap the request was.
    pub fn acquire(&self, bytes: usize, tag: &'static str) -> Result<BudgetGuardImpl> {
        self.try_acquire(bytes, tag)
            .ok_or_else(|| self.inner.exceeded(tag, bytes))
    }
}

/// RAII guard that accounts for a number of bytes.
pub struct BudgetGuardImpl {
    inner: Arc<BudgetInner>,
    bytes: usize,
    tag: &'static str,
}

impl Drop for BudgetGuardImpl {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.inner.release(self.bytes);
            self.bytes = 0;
        }
    }
}

impl BudgetGuard for BudgetGuardImpl {
    fn bytes(&self) -> usize {
        self.bytes
    }
    fn tag(&self) -> &'static str {
        self.tag
    }
}

impl BudgetGuardImpl {
    /// Resize the guard to `new_bytes`. Shrinking always succeeds; growing
    /// fails without side effects when the cap would be exceeded.
    pub fn try_resize(&mut self, new_bytes: usize) -> bool {
        if new_bytes <= self.bytes {
            self.inner.release(self.bytes - new_bytes);
            self.bytes = new_bytes;
            return true;
        }
        let delta = new_bytes - self.bytes;
        if self.inner.try_acquire(delta) {
            self.bytes = new_bytes;
            true
        } else {
            false
        }
    }

    /// Grow the guard by `delta` bytes.
    pub fn grow(&mut self, delta: usize) -> Result<()> {
        let target = self.bytes.saturating_add(delta);
        if self.try_resize(target) {
            Ok(())
        } else {
            Err(self.inner.exceeded(self.tag, delta))
        }
    }
}

impl MemoryBudget for MemoryBudgetImpl {
    type Guard = BudgetGuardImpl;

    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard> {
        if bytes > 0 && !self.inner.try_acquire(bytes) {
            return None;
        }
        Some(BudgetGuardImpl {
            inner: Arc::clone(&self.inner),
            bytes,
            tag,
        })
    }

    fn capacity_bytes(&self) -> usize {
        self.inner.capacity
    }

    fn used_bytes(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }
}
