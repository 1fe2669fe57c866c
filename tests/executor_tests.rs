//! Graph-level execution: hand-wired pipelines, cancellation and stalls.


use setflow_core::budget::MemoryBudget;
use setflow_core::config::EngineConfig;
use setflow_core::id::{OpId, PortId};
use setflow_exec::{run_set_plan_with, BatchSource, CollectSink, ExecError, Executor, RunOptions};
use setflow_mem::MemoryBudgetImpl;
use setflow_operators::{
    connect, BinaryPorts, InputPort, IntersectOrExcept, OpError, Processor, SetMode, Status,
};
use setflow_planner::{parse_set_query, plan_set_query, Catalog};

use test_data_gen::*;

/// Consumer that never asks for data.
struct Deaf {
    _input: InputPort,
}

impl Processor for Deaf {
    fn name(&self) -> &'static str {
        "deaf"
    }
    fn prepare(&mut self) -> Result<Status, OpError> {
        Ok(Status::NeedData)
    }
    fn work(&mut self) -> Result<(), OpError> {
        Err(OpError::invariant("deaf never works"))
    }
}

#[test]
fn test_hand_wired_pipeline() {
    let (left_out, left_in) = connect(PortId::new(1));
    let (right_out, right_in) = connect(PortId::new(2));
    let (op_out, sink_in) = connect(PortId::new(3));
    let budget = MemoryBudgetImpl::new(1 << 20);

    let mut exec = Executor::new(1);
    exec.add(Box::new(BatchSource::new(
        left_out,
        vec![int_batch(&[1, 2, 3]), int_batch(&[4, 2])],
    )));
    exec.add(Box::new(BatchSource::new(
        right_out,
        vec![int_batch(&[2]), int_batch(&[]), int_batch(&[3])],
    )));
    exec.add(Box::new(
        IntersectOrExcept::new(
            OpId::new(0),
            SetMode::Except,
            &int_header(),
            BinaryPorts {
                left: left_in,
                right: right_in,
                output: op_out,
            },
        )
        .with_budget(&budget),
    ));
    let (sink, collected) = CollectSink::new(sink_in);
    exec.add(Box::new(sink));

    let report = exec.run().expect("run");
    assert!(report.work_calls > 0);

    let batches = collected.take();
    // One liveness batch per right batch, then one filtered batch per left batch.
    assert_eq!(batches.len(), 5);
    assert!(batches[..3].iter().all(|b| b.num_rows() == 0));
    assert_eq!(collect_ints(&batches), vec![1, 4]);
    // The engine is dropped once the operator finishes.
    assert_eq!(budget.used_bytes(), 0);
}

#[test]
fn test_unread_output_stalls_graph() {
    let (out, inp) = connect(PortId::new(0));
    let mut exec = Executor::new(3);
    exec.add(Box::new(BatchSource::new(out, vec![int_batch(&[1]), int_batch(&[2])])));
    exec.add(Box::new(Deaf { _input: inp }));
    match exec.run() {
        Err(ExecError::Stalled { waiting, .. }) => {
            assert_eq!(waiting.len(), 2);
            assert!(waiting.iter().any(|w| w.contains("deaf")));
        }
        other => panic!("expected stall, got {other:?}"),
    }
}

#[test]
fn test_limit_cancels_whole_chain() {
    let mut catalog = Catalog::new();
    for name in ["a", "b", "c"] {
        catalog.insert(name.to_string(), int_header());
    }
    let plan = plan_set_query(
        &parse_set_query("a EXCEPT b EXCEPT c").unwrap(),
        &catalog,
    )
    .unwrap();

    let left: Vec<i64> = (0..1000).collect();
    let data = inputs(&[
        ("a", int_batches(&left, 10)),
        ("b", int_batches(&[1, 3, 5], 2)),
        ("c", int_batches(&[0], 1)),
    ]);

    let full = run_set_plan_with(&plan, &data, &EngineConfig::default(), RunOptions::default())
        .expect("full run");
    let limited = run_set_plan_with(
        &plan,
        &data,
        &EngineConfig::default(),
        RunOptions { limit: Some(5) },
    )
    .expect("limited run");

    assert_eq!(collect_ints(&limited.batches), vec![2, 4, 6, 7, 8]);
    assert_eq!(limited.stats.output_rows, 5);
    assert!(limited.stats.work_calls < full.stats.work_calls);
}

#[test]
fn test_liveness_batches_reach_the_sink() {
    let mut catalog = Catalog::new();
    catalog.insert("a".into(), int_header());
    catalog.insert("b".into(), int_header());
    let plan = plan_set_query(&parse_set_query("a INTERSECT b").unwrap(), &catalog).unwrap();
    let data = inputs(&[
        ("a", vec![int_batch(&[9])]),
        ("b", int_batches(&[1, 2, 3, 4], 1)),
    ]);
    let out = run_set_plan_with(&plan, &data, &EngineConfig::default(), RunOptions::default())
        .expect("run");
    assert_eq!(out.stats.empty_batches, 5);
    assert_eq!(out.non_empty().count(), 0);
    assert_eq!(out.stats.output_rows, 0);
}
