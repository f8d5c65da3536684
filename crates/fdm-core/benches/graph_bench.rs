// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Node Framework Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Graph construction and execution over a synthetic registry: a wide
//! layer of independent nodes feeding a chain of aggregates.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fdm_core::{
    DerivationGraph, Derived, Executor, InMemoryRecording, NodeInputs, NodeSpec, ParameterSource,
    Registry, Requirement,
};
use fdm_types::{Attributes, EngineConfig, FdmError, FdmResult, Parameter, SampleArray};

const SENSORS: usize = 32;
const SAMPLES: usize = 3600 * 8;

fn scale(inputs: &NodeInputs<'_>) -> FdmResult<Derived> {
    let p = inputs
        .present()
        .next()
        .ok_or_else(|| FdmError::Contract("no input".into()))?;
    Ok(Derived::values(p.require_values()?.map(|v| v * 0.3048)))
}

fn total(inputs: &NodeInputs<'_>) -> FdmResult<Derived> {
    let mut present = inputs.present();
    let first = present
        .next()
        .ok_or_else(|| FdmError::Contract("no input".into()))?
        .require_values()?
        .clone();
    let sum = present.try_fold(first, |acc, p| acc.zip_with(p.require_values()?, |a, b| a + b))?;
    Ok(Derived::values(sum))
}

fn registry() -> Registry {
    let mut specs: Vec<NodeSpec> = (0..SENSORS)
        .map(|i| NodeSpec::new(format!("Sensor {i} Scaled"), scale).parameter(format!("Sensor {i}")))
        .collect();
    let scaled: Vec<String> = (0..SENSORS).map(|i| format!("Sensor {i} Scaled")).collect();
    let mut total_spec = NodeSpec::new("Total", total).requires(Requirement::any_of(scaled.clone()));
    for name in &scaled {
        total_spec = total_spec.parameter(name.clone());
    }
    specs.push(total_spec);
    specs.push(NodeSpec::new("Total Scaled", scale).parameter("Total"));
    Registry::from_specs(specs).unwrap()
}

fn recording() -> InMemoryRecording {
    let params = (0..SENSORS).map(|i| {
        let values = SampleArray::from_values((0..SAMPLES).map(|j| (j + i) as f64).collect());
        Parameter::new(format!("Sensor {i}"), values, 8.0, 0.0).unwrap()
    });
    InMemoryRecording::with_parameters(params, Attributes::default())
}

// ── graph construction ──────────────────────────────────────────────

fn bench_graph_build(c: &mut Criterion) {
    let registry = registry();
    let rec = recording();
    let available = rec.available_names();
    c.bench_function("graph_build_34_nodes", |b| {
        b.iter(|| DerivationGraph::build(black_box(&registry), &available, rec.attributes()))
    });
}

// ── execution ───────────────────────────────────────────────────────

fn bench_run_sequential(c: &mut Criterion) {
    let config = EngineConfig {
        parallel: false,
        ..EngineConfig::default()
    };
    let executor = Executor::new(registry(), config).unwrap();
    let rec = recording();
    c.bench_function("run_sequential_8hz_1h", |b| {
        b.iter(|| executor.run(black_box(&rec)))
    });
}

fn bench_run_parallel(c: &mut Criterion) {
    let executor = Executor::new(registry(), EngineConfig::default()).unwrap();
    let rec = recording();
    c.bench_function("run_parallel_8hz_1h", |b| {
        b.iter(|| executor.run(black_box(&rec)))
    });
}

criterion_group!(benches, bench_graph_build, bench_run_sequential, bench_run_parallel);
criterion_main!(benches);
