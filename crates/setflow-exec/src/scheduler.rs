//! Single-threaded cooperative driver for a graph of processors.
//!
//! Nodes are visited round-robin in insertion order. Each visit calls
//! `prepare()` once and, on `Ready`, `work()` once. A pass in which no node
//! worked, finished, or changed its answer counts as idle; too many idle
//! passes in a row mean the graph can never make progress.

use tracing::{debug, trace};

use setflow_core::id::NodeId;
use setflow_operators::{Processor, Status};

use crate::runtime::ExecError;

struct Node {
    id: NodeId,
    processor: Box<dyn Processor>,
    last: Option<Status>,
}

/// Summary of one `Executor::run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecReport {
    pub passes: u64,
    pub work_calls: u64,
}

pub struct Executor {
    nodes: Vec<Node>,
    max_idle_passes: usize,
}

impl Executor {
    pub fn new(max_idle_passes: usize) -> Self {
        Self {
            nodes: Vec::new(),
            max_idle_passes: max_idle_passes.max(1),
        }
    }

    /// Register a node. Nodes are driven in the order they were added, so
    /// add producers before consumers.
    pub fn add(&mut self, processor: Box<dyn Processor>) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u64);
        self.nodes.push(Node {
            id,
            processor,
            last: None,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drive every node until all report `Finished`.
    pub fn run(&mut self) -> Result<ExecReport, ExecError> {
        let mut report = ExecReport::default();
        let mut idle = 0usize;

        loop {
            report.passes += 1;
            let mut progressed = false;
            let mut pending = 0usize;

            for node in &mut self.nodes {
                if node.last == Some(Status::Finished) {
                    continue;
                }
                let status = node
                    .processor
                    .prepare()
                    .map_err(|source| ExecError::Operator {
                        node: node.processor.name(),
                        source,
                    })?;
                trace!(node = %node.id, name = node.processor.name(), ?status, "prepared");

                match status {
                    Status::Ready => {
                        node.processor.work().map_err(|source| ExecError::Operator {
                            node: node.processor.name(),
                            source,
                        })?;
                        report.work_calls += 1;
                        progressed = true;
                        pending += 1;
                    }
                    Status::Finished => {
                        debug!(node = %node.id, name = node.processor.name(), "node finished");
                        progressed = true;
                    }
                    Status::NeedData | Status::PortFull => {
                        if node.last != Some(status) {
                            progressed = true;
                        }
                        pending += 1;
                    }
                }
                node.last = Some(status);
            }

            if pending == 0 {
                return Ok(report);
            }
            if progressed {
                idle = 0;
                continue;
            }
            idle += 1;
            if idle >= self.max_idle_passes {
                let waiting = self
                    .nodes
                    .iter()
                    .filter(|n| n.last != Some(Status::Finished))
                    .map(|n| format!("{}:{}={:?}", n.id, n.processor.name(), n.last))
                    .collect();
                return Err(ExecError::Stalled {
                    passes: report.passes,
                    waiting,
                });
            }
        }
    }
}
