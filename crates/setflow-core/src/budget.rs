//! Abstract memory budget interfaces.
//!
//! The concrete implementation lives in `setflow-mem`. Only the traits live
//! here so operators can name the API without depending on the accounting.

/// A guard returned by a memory budget when bytes are acquired.
///
/// Guards are RAII: dropping one returns its bytes to the budget.
pub trait BudgetGuard: Send {
    /// Number of bytes currently accounted for by this guard.
    fn bytes(&self) -> usize;
    /// Debug tag for tracing.
    fn tag(&self) -> &'static str {
        "guard"
    }
}

/// A handle representing a memory-cap enforcer.
///
/// Hash sets and other growing state call `try_acquire` before they grow.
/// `None` means the cap is reached; callers treat that as fatal.
pub trait MemoryBudget: Send + Sync + 'static {
    type Guard: BudgetGuard;

    /// Attempt to acquire `bytes` from the live budget. Returns a guard on success.
    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard>;

    /// Total configured capacity (bytes).
    fn capacity_bytes(&self) -> usize;

    /// Approximate currently used bytes (advisory; not a correctness API).
    fn used_bytes(&self) -> usize;
}
