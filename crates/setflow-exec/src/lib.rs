#![forbid(unsafe_code)]
//! setflow-exec: processor-graph driver, built-in endpoints and the runtime
//! that turns a `SetPlan` into a running graph.
//!
//! Execution is single-threaded and cooperative. Every node answers
//! `prepare()` without blocking; the executor round-robins until all nodes
//! finish or the graph stalls.

pub mod nodes;
pub mod replay;
pub mod runtime;
pub mod scheduler;

pub use nodes::{BatchSource, CollectSink, Collected};
pub use replay::plan_fingerprint;
pub use runtime::{
    load_relations, run_set_plan, run_set_plan_with, ExecError, RunOptions, RunOutput, RunStats,
};
pub use scheduler::{ExecReport, Executor};
