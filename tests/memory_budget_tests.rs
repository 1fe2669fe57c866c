//! Memory budget enforcement tests


use setflow_core::budget::{BudgetGuard, MemoryBudget};
use setflow_core::config::EngineConfig;
use setflow_exec::{run_set_plan, ExecError};
use setflow_mem::MemoryBudgetImpl;
use setflow_operators::{KeySpec, OpError, SetEngine};
use setflow_planner::{parse_set_query, plan_set_query, Catalog};
use std::thread;

use test_data_gen::*;

#[test]
fn test_budget_acquire_release() {
    let budget = MemoryBudgetImpl::new(1024 * 1024); // 1MB
    assert_eq!(budget.used_bytes(), 0);

    let guard = budget
        .try_acquire(100 * 1024, "test")
        .expect("Acquire failed");
    assert_eq!(budget.used_bytes(), 100 * 1024);
    assert_eq!(guard.bytes(), 100 * 1024);

    drop(guard);
    assert_eq!(budget.used_bytes(), 0);
    assert_eq!(budget.peak_bytes(), 100 * 1024);
}

#[test]
fn test_budget_exhaustion() {
    let budget = MemoryBudgetImpl::new(500 * 1024); // 500KB

    let guard1 = budget
        .try_acquire(400 * 1024, "test")
        .expect("First acquire failed");

    // 600KB total would exceed the cap
    assert!(budget.try_acquire(200 * 1024, "test").is_none());
    assert!(budget.acquire(200 * 1024, "test").is_err());
    assert_eq!(budget.used_bytes(), 400 * 1024);

    drop(guard1);
    let _guard2 = budget
        .try_acquire(200 * 1024, "test")
        .expect("Acquire after release failed");
    assert_eq!(budget.used_bytes(), 200 * 1024);
}

#[test]
fn test_guard_grow_is_all_or_nothing() {
    let budget = MemoryBudgetImpl::new(1000);
    let mut guard = budget.try_acquire(0, "grow").expect("zero acquire");
    guard.grow(600).expect("first grow");
    assert!(guard.grow(600).is_err());
    assert_eq!(guard.bytes(), 600);
    assert_eq!(budget.used_bytes(), 600);
    assert!(guard.try_resize(100));
    assert_eq!(budget.used_bytes(), 100);
}

#[test]
fn test_concurrent_guards_never_exceed_capacity() {
    let budget = MemoryBudgetImpl::new(64 * 1024);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let budget = budget.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    if let Some(g) = budget.try_acquire(4 * 1024, "thread") {
                        assert!(budget.used_bytes() <= budget.capacity_bytes());
                        drop(g);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("thread panicked");
    }
    assert_eq!(budget.used_bytes(), 0);
    assert!(budget.peak_bytes() <= 64 * 1024);
}

#[test]
fn test_set_engine_charges_new_keys_only() {
    let budget = MemoryBudgetImpl::new(1024 * 1024);
    let mut engine = SetEngine::new(KeySpec::from_header(&int_header())).with_budget(&budget);

    engine.insert(&int_batch(&[1, 2, 3])).expect("insert");
    let after_first = engine.charged_bytes();
    assert!(after_first > 0);
    assert_eq!(budget.used_bytes(), after_first);

    // Keys already present cost nothing.
    engine.insert(&int_batch(&[3, 2, 1, 1])).expect("insert");
    assert_eq!(engine.charged_bytes(), after_first);

    engine.insert(&int_batch(&[4])).expect("insert");
    assert!(engine.charged_bytes() > after_first);

    drop(engine);
    assert_eq!(budget.used_bytes(), 0);
}

#[test]
fn test_engine_fails_when_cap_is_reached() {
    let budget = MemoryBudgetImpl::new(256);
    let mut engine = SetEngine::new(KeySpec::from_header(&int_header())).with_budget(&budget);
    let values: Vec<i64> = (0..1000).collect();
    let err = engine.insert(&int_batch(&values)).unwrap_err();
    assert!(matches!(err, OpError::ResourceExhausted(_)));
    assert!(budget.used_bytes() <= 256);
}

#[test]
fn test_query_aborts_over_cap_and_reports_peak_under_it() {
    let header = int_header();
    let mut catalog = Catalog::new();
    catalog.insert("a".into(), header.clone());
    catalog.insert("b".into(), header);
    let plan = plan_set_query(&parse_set_query("a INTERSECT b").unwrap(), &catalog).unwrap();

    let right: Vec<i64> = (0..10_000).collect();
    let data = inputs(&[
        ("a", int_batches(&[1, 2, 3], 2)),
        ("b", int_batches(&right, 1000)),
    ]);

    let small = EngineConfig {
        mem_cap_bytes: 4 * 1024,
        ..EngineConfig::default()
    };
    match run_set_plan(&plan, &data, &small) {
        Err(ExecError::Operator { node, source }) => {
            assert_eq!(node, "intersect_except");
            assert!(matches!(source, OpError::ResourceExhausted(_)));
        }
        other => panic!("expected resource exhaustion, got {other:?}"),
    }

    let big = EngineConfig {
        mem_cap_bytes: 16 * 1024 * 1024,
        ..EngineConfig::default()
    };
    let out = run_set_plan(&plan, &data, &big).expect("run under cap");
    assert_eq!(collect_ints(&out.batches), vec![1, 2, 3]);
    assert!(out.stats.peak_memory_bytes > 0);
    assert!(out.stats.peak_memory_bytes <= big.mem_cap_bytes);
}
