//! Processor trait + common interfaces.
//!
//! Execution is cooperative: a scheduler repeatedly calls `prepare()` on a
//! node and, only when it answers `Ready`, calls `work()` once. `prepare()`
//! moves batches across ports and must never block; `work()` does the
//! computation on data already held by the node and never touches ports.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpError {
    /// The surrounding scheduler (or this node) broke the port contract.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// Growing state could not be accounted against the memory budget.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("execution error: {0}")]
    Exec(String),
}

impl OpError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        OpError::Invariant(msg.into())
    }
}

impl From<setflow_core::Error> for OpError {
    fn from(e: setflow_core::Error) -> Self {
        match e {
            setflow_core::Error::Invariant(m) => OpError::Invariant(m),
            setflow_core::Error::Schema(m) | setflow_core::Error::Shape(m) => OpError::Schema(m),
            other => OpError::Exec(other.to_string()),
        }
    }
}

impl From<setflow_mem::Error> for OpError {
    fn from(e: setflow_mem::Error) -> Self {
        OpError::ResourceExhausted(e.to_string())
    }
}

/// Answer of `prepare()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The node is done; it will never be scheduled again.
    Finished,
    /// Output cannot accept a batch; resume once downstream consumed.
    PortFull,
    /// An input has no data; resume once upstream pushed.
    NeedData,
    /// Data is held; call `work()`.
    Ready,
}

/// A node of the execution graph.
///
/// Invariants:
/// - `work()` is only called right after `prepare()` returned `Ready`.
/// - Both methods are called from one thread at a time per node.
pub trait Processor: Send {
    /// Human-readable node name (stable).
    fn name(&self) -> &'static str;

    fn prepare(&mut self) -> Result<Status, OpError>;

    fn work(&mut self) -> Result<(), OpError>;
}
