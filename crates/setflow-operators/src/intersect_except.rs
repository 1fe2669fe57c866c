//! Two-input INTERSECT / EXCEPT processor.
//!
//! The node first drains the right input into a [`SetEngine`], then filters
//! the left input against it. While accumulating it emits one zero-row batch
//! per right batch so downstream sees a live, well-formed stream before any
//! real output exists.

use serde::Serialize;
use tracing::{debug, debug_span, trace, Span};

use setflow_core::id::OpId;
use setflow_core::schema::Schema;
use setflow_core::types::RowBatch;
use setflow_mem::MemoryBudgetImpl;

use crate::keys::KeySpec;
use crate::port::{InputPort, OutputPort};
use crate::set::{SetEngine, SetMethod, SetMode};
use crate::traits::{OpError, Processor, Status};

/// Ports of a two-input node. `left` is input 0, `right` is input 1.
#[derive(Debug)]
pub struct BinaryPorts {
    pub left: InputPort,
    pub right: InputPort,
    pub output: OutputPort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading the right input into the set.
    Accumulating,
    /// Reading the left input and emitting survivors.
    Filtering,
}

#[derive(Debug)]
enum Staged {
    /// Zero-row batch emitted for each accumulated right batch.
    Liveness(RowBatch),
    Filtered(RowBatch),
}

impl Staged {
    fn into_batch(self) -> RowBatch {
        match self {
            Staged::Liveness(b) | Staged::Filtered(b) => b,
        }
    }
}

/// Counters for one operator instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetOpStats {
    pub right_batches: u64,
    pub right_rows: u64,
    pub left_batches: u64,
    pub left_rows: u64,
    pub output_rows: u64,
    pub liveness_batches: u64,
    pub distinct_keys: u64,
}

pub struct IntersectOrExcept {
    op_id: OpId,
    mode: SetMode,
    phase: Phase,
    left: InputPort,
    right: InputPort,
    output: OutputPort,
    /// `None` once the node was cancelled.
    engine: Option<SetEngine>,
    held: Option<RowBatch>,
    staged: Option<Staged>,
    stats: SetOpStats,
    span: Span,
}

impl IntersectOrExcept {
    pub fn new(op_id: OpId, mode: SetMode, header: &Schema, ports: BinaryPorts) -> Self {
        let keys = KeySpec::from_header(header);
        let span = debug_span!("intersect_except", op = %op_id, mode = %mode);
        span.in_scope(|| {
            debug!(
                key_columns = keys.len(),
                columns = header.len(),
                "operator created"
            )
        });
        Self {
            op_id,
            mode,
            phase: Phase::Accumulating,
            left: ports.left,
            right: ports.right,
            output: ports.output,
            engine: Some(SetEngine::new(keys)),
            held: None,
            staged: None,
            stats: SetOpStats::default(),
            span,
        }
    }

    /// Charge the set's growth against `budget`.
    pub fn with_budget(mut self, budget: &MemoryBudgetImpl) -> Self {
        self.engine = self.engine.map(|e| e.with_budget(budget));
        self
    }

    pub fn op_id(&self) -> OpId {
        self.op_id
    }

    pub fn mode(&self) -> SetMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> SetOpStats {
        self.stats
    }

    pub fn method(&self) -> Option<SetMethod> {
        self.engine.as_ref().and_then(SetEngine::method)
    }

    fn active_input(&self) -> &InputPort {
        match self.phase {
            Phase::Accumulating => &self.right,
            Phase::Filtering => &self.left,
        }
    }

    fn cancel(&mut self) {
        self.left.close();
        self.right.close();
        self.held = None;
        self.staged = None;
        self.engine = None;
    }
}

impl Processor for IntersectOrExcept {
    fn name(&self) -> &'static str {
        "intersect_except"
    }

    fn prepare(&mut self) -> Result<Status, OpError> {
        let span = self.span.clone();
        let _enter = span.enter();

        if self.output.is_finished() {
            if self.engine.is_some() {
                debug!(phase = ?self.phase, "output closed, cancelling");
            }
            self.cancel();
            return Ok(Status::Finished);
        }

        if !self.output.can_push() {
            self.active_input().set_not_needed();
            return Ok(Status::PortFull);
        }

        if let Some(staged) = self.staged.take() {
            let batch = staged.into_batch();
            trace!(rows = batch.num_rows(), "pushing staged batch");
            self.output.push(batch)?;
        }

        if self.held.is_some() {
            return Ok(Status::Ready);
        }

        if self.phase == Phase::Accumulating && self.right.is_finished() {
            self.phase = Phase::Filtering;
            self.right.set_not_needed();
            let distinct = self.engine.as_ref().map(SetEngine::len).unwrap_or(0);
            self.stats.distinct_keys = distinct as u64;
            debug!(
                right_batches = self.stats.right_batches,
                right_rows = self.stats.right_rows,
                distinct_keys = distinct,
                method = ?self.method(),
                "right input exhausted, filtering left"
            );
        }

        if self.phase == Phase::Filtering && self.left.is_finished() {
            self.output.finish();
            self.engine = None;
            debug!(
                left_rows = self.stats.left_rows,
                output_rows = self.stats.output_rows,
                "left input exhausted, finished"
            );
            return Ok(Status::Finished);
        }

        let input = self.active_input();
        input.set_needed();
        if !input.has_data() {
            return Ok(Status::NeedData);
        }
        let batch = input.pull()?;
        self.held = Some(batch);
        Ok(Status::Ready)
    }

    fn work(&mut self) -> Result<(), OpError> {
        let span = self.span.clone();
        let _enter = span.enter();

        let batch = self
            .held
            .take()
            .ok_or_else(|| OpError::invariant("work() called without a held batch"))?;
        if self.staged.is_some() {
            return Err(OpError::invariant(
                "work() called while an output batch is still staged",
            ));
        }
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| OpError::invariant("work() called on a cancelled operator"))?;

        let rows = batch.num_rows();
        match self.phase {
            Phase::Accumulating => {
                let liveness = batch.empty_like();
                let new_keys = engine.insert(&batch)?;
                self.stats.right_batches += 1;
                self.stats.right_rows += rows as u64;
                self.stats.liveness_batches += 1;
                trace!(rows, new_keys, distinct_keys = engine.len(), "accumulated right batch");
                self.staged = Some(Staged::Liveness(liveness));
            }
            Phase::Filtering => {
                let (mask, kept) = engine.contains(&batch, self.mode)?;
                let filtered = batch.into_filtered(&mask)?;
                self.stats.left_batches += 1;
                self.stats.left_rows += rows as u64;
                self.stats.output_rows += kept as u64;
                trace!(rows, kept, "filtered left batch");
                self.staged = Some(Staged::Filtered(filtered));
            }
        }
        Ok(())
    }
}
