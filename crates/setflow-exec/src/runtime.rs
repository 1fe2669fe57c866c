//! Runtime: instantiate a `SetPlan` as a processor graph and drive it.
//!
//! - One `BatchSource` per relation occurrence.
//! - One `IntersectOrExcept` per plan operator, all charging a single
//!   query-wide `MemoryBudgetImpl`.
//! - One `CollectSink` on the root.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use setflow_core::config::EngineConfig;
use setflow_core::id::{NodeId, OpId, PortId};
use setflow_core::types::RowBatch;
use setflow_io::readers::csv::read_csv_path;
use setflow_mem::MemoryBudgetImpl;
use setflow_operators::{connect, BinaryPorts, InputPort, IntersectOrExcept, OpError};
use setflow_planner::{PlanInput, RelationSource, SetPlan};

use crate::nodes::{BatchSource, CollectSink};
use crate::replay::plan_fingerprint;
use crate::scheduler::Executor;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("operator {node}: {source}")]
    Operator {
        node: &'static str,
        #[source]
        source: OpError,
    },
    /// A full round of passes made no progress.
    #[error("graph stalled after {passes} passes; waiting: {waiting:?}")]
    Stalled { passes: u64, waiting: Vec<String> },
    #[error("invalid plan: {0}")]
    Invalid(String),
    #[error(transparent)]
    Core(#[from] setflow_core::Error),
    #[error("input: {0}")]
    Io(#[from] setflow_io::IoError),
    #[error("hashing error: {0}")]
    Hash(String),
}

/// Per-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// blake3 fingerprint of the plan (hex).
    pub plan_hash: String,
    pub sources: usize,
    pub operators: usize,
    pub input_rows: u64,
    pub output_batches: u64,
    /// Zero-row batches among `output_batches`.
    pub empty_batches: u64,
    pub output_rows: u64,
    pub passes: u64,
    pub work_calls: u64,
    pub peak_memory_bytes: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub batches: Vec<RowBatch>,
    pub stats: RunStats,
}

impl RunOutput {
    /// Output batches that carry rows.
    pub fn non_empty(&self) -> impl Iterator<Item = &RowBatch> {
        self.batches.iter().filter(|b| !b.is_empty())
    }
}

/// Optional knobs for one run beyond the engine config.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after this many output rows; upstream work is cancelled.
    pub limit: Option<usize>,
}

fn check_input(relation: &str, plan: &SetPlan, id: NodeId, batches: &[RowBatch]) -> Result<u64, ExecError> {
    let header = plan
        .source(id)
        .map(|s| &s.header)
        .ok_or_else(|| ExecError::Invalid(format!("source {id} missing from plan")))?;
    let mut rows = 0u64;
    for batch in batches {
        batch.validate()?;
        if batch.num_columns() != header.len() {
            return Err(ExecError::Invalid(format!(
                "relation '{relation}' batch has {} columns, header has {}",
                batch.num_columns(),
                header.len()
            )));
        }
        rows += batch.num_rows() as u64;
    }
    Ok(rows)
}

/// Each port is consumed by exactly one downstream node.
fn take_input(
    input: PlanInput,
    source_inputs: &mut HashMap<NodeId, InputPort>,
    op_inputs: &mut HashMap<OpId, InputPort>,
) -> Result<InputPort, ExecError> {
    let port = match input {
        PlanInput::Source(id) => source_inputs.remove(&id),
        PlanInput::Op(id) => op_inputs.remove(&id),
    };
    port.ok_or_else(|| ExecError::Invalid(format!("{input:?} is unknown or wired twice")))
}

/// Run `plan` over in-memory relation data keyed by relation name.
pub fn run_set_plan(
    plan: &SetPlan,
    inputs: &BTreeMap<String, Vec<RowBatch>>,
    config: &EngineConfig,
) -> Result<RunOutput, ExecError> {
    run_set_plan_with(plan, inputs, config, RunOptions::default())
}

pub fn run_set_plan_with(
    plan: &SetPlan,
    inputs: &BTreeMap<String, Vec<RowBatch>>,
    config: &EngineConfig,
    options: RunOptions,
) -> Result<RunOutput, ExecError> {
    config.validate()?;
    let started = Instant::now();
    let plan_hash = plan_fingerprint(plan)?;
    info!(
        plan_hash = %plan_hash,
        sources = plan.sources.len(),
        operators = plan.ops.len(),
        mem_cap_bytes = config.mem_cap_bytes,
        "starting set query"
    );

    let budget = MemoryBudgetImpl::new(config.mem_cap_bytes);
    let mut exec = Executor::new(config.max_idle_passes);
    let mut next_port = 0u64;
    let mut port_id = || {
        next_port += 1;
        PortId::new(next_port)
    };

    let mut source_inputs: HashMap<NodeId, InputPort> = HashMap::new();
    let mut op_inputs: HashMap<OpId, InputPort> = HashMap::new();
    let mut input_rows = 0u64;

    for source in &plan.sources {
        let batches = inputs.get(&source.relation).ok_or_else(|| {
            ExecError::Invalid(format!("no input data for relation '{}'", source.relation))
        })?;
        input_rows += check_input(&source.relation, plan, source.id, batches)?;
        let (out, inp) = connect(port_id());
        exec.add(Box::new(BatchSource::new(out, batches.clone())));
        source_inputs.insert(source.id, inp);
    }

    for op in &plan.ops {
        let left = take_input(op.left, &mut source_inputs, &mut op_inputs)?;
        let right = take_input(op.right, &mut source_inputs, &mut op_inputs)?;
        let (output, downstream) = connect(port_id());
        let node = IntersectOrExcept::new(
            op.op_id,
            op.mode,
            &op.header,
            BinaryPorts {
                left,
                right,
                output,
            },
        )
        .with_budget(&budget);
        exec.add(Box::new(node));
        op_inputs.insert(op.op_id, downstream);
    }

    let root = take_input(plan.root, &mut source_inputs, &mut op_inputs)?;
    let (sink, collected) = CollectSink::new(root);
    exec.add(Box::new(sink.with_limit(options.limit)));

    let report = exec.run()?;
    let batches = collected.take();

    let stats = RunStats {
        plan_hash,
        sources: plan.sources.len(),
        operators: plan.ops.len(),
        input_rows,
        output_batches: batches.len() as u64,
        empty_batches: batches.iter().filter(|b| b.is_empty()).count() as u64,
        output_rows: batches.iter().map(|b| b.num_rows() as u64).sum(),
        passes: report.passes,
        work_calls: report.work_calls,
        peak_memory_bytes: budget.peak_bytes(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        output_rows = stats.output_rows,
        output_batches = stats.output_batches,
        passes = stats.passes,
        peak_memory_bytes = stats.peak_memory_bytes,
        elapsed_ms = stats.elapsed_ms,
        "set query finished"
    );
    Ok(RunOutput { batches, stats })
}

/// Read every relation's CSV file. Relative paths resolve against `base_dir`.
pub fn load_relations(
    relations: &[RelationSource],
    base_dir: Option<&Path>,
    batch_rows: usize,
) -> Result<BTreeMap<String, Vec<RowBatch>>, ExecError> {
    let mut out = BTreeMap::new();
    for rel in relations {
        let path = Path::new(&rel.source);
        let path = match base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        let batches = read_csv_path(&path, rel.header.clone(), batch_rows)?;
        info!(relation = %rel.name, path = %path.display(), batches = batches.len(), "loaded relation");
        out.insert(rel.name.clone(), batches);
    }
    Ok(out)
}
