use criterion::{black_box, criterion_group, criterion_main, Criterion};
use setflow_core::config::EngineConfig;
use setflow_core::schema::{DataType, Field, Schema};
use setflow_core::types::{Column, RowBatch, Scalar};
use setflow_exec::run_set_plan;
use setflow_mem::MemoryBudgetImpl;
use setflow_operators::{KeySpec, SetEngine, SetMode};
use setflow_planner::{parse_set_query, plan_set_query, Catalog};
use std::collections::BTreeMap;

fn int_header() -> Schema {
    Schema::new(vec![Field::new("id", DataType::Int64, false)])
}

fn str_header() -> Schema {
    Schema::new(vec![Field::new("name", DataType::Utf8, false)])
}

fn mixed_header() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ])
}

fn make_batch(header: &Schema, rows: usize, offset: usize) -> RowBatch {
    let columns = header
        .fields
        .iter()
        .map(|f| {
            let values = (offset..offset + rows)
                .map(|i| match f.data_type {
                    DataType::Utf8 => Scalar::Str(format!("key-{}", i % 4096)),
                    _ => Scalar::I64((i % 4096) as i64),
                })
                .collect();
            Column::new(f.name.clone(), values)
        })
        .collect();
    RowBatch { columns }
}

fn bench_set_engine(c: &mut Criterion) {
    let budget = MemoryBudgetImpl::new(256 * 1024 * 1024);
    for (label, header) in [
        ("key64", int_header()),
        ("key_string", str_header()),
        ("hashed", mixed_header()),
    ] {
        let build = make_batch(&header, 8192, 0);
        let probe = make_batch(&header, 8192, 2048);

        c.bench_function(&format!("set_engine_insert_{label}"), |b| {
            b.iter(|| {
                let mut engine = SetEngine::new(KeySpec::from_header(&header)).with_budget(&budget);
                black_box(engine.insert(&build).unwrap());
            })
        });

        let mut engine = SetEngine::new(KeySpec::from_header(&header)).with_budget(&budget);
        engine.insert(&build).unwrap();
        c.bench_function(&format!("set_engine_probe_{label}"), |b| {
            b.iter(|| black_box(engine.contains(&probe, SetMode::Except).unwrap()))
        });
    }
}

fn bench_set_query(c: &mut Criterion) {
    let header = int_header();
    let mut catalog = Catalog::new();
    for name in ["a", "b", "c"] {
        catalog.insert(name.to_string(), header.clone());
    }
    let plan = plan_set_query(
        &parse_set_query("a EXCEPT b INTERSECT c").unwrap(),
        &catalog,
    )
    .unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert(
        "a".to_string(),
        (0..16).map(|i| make_batch(&header, 1024, i * 1024)).collect::<Vec<_>>(),
    );
    inputs.insert("b".to_string(), vec![make_batch(&header, 1024, 0)]);
    inputs.insert("c".to_string(), vec![make_batch(&header, 4096, 512)]);
    let config = EngineConfig::default();

    c.bench_function("set_query_chain", |b| {
        b.iter(|| black_box(run_set_plan(&plan, &inputs, &config).unwrap().stats.output_rows))
    });
}

criterion_group!(setops, bench_set_engine, bench_set_query);
criterion_main!(setops);
