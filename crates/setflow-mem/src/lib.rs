#![forbid(unsafe_code)]
//! setflow-mem: hard memory budgeting for growing operator state.
//!
//! Concrete implementations of the interfaces in `setflow-core::budget`.
//! Set engines charge their hash tables here through RAII guards, so one
//! query can never hold more than the configured cap.

pub mod error;
pub mod guard;
pub mod tracking;

pub use error::{Error, Result};
pub use guard::{BudgetGuardImpl, MemoryBudgetImpl};
pub use tracking::PeakTracker;
