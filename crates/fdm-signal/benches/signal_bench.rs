// ─────────────────────────────────────────────────────────────────────
// Flight Data Monitor — Signal Library Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Criterion benchmarks over a one-hour recording: alignment across
//! common rate pairs, sensor blending, and gap repair.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fdm_signal::{
    align, blend_parameters, blend_two_parameters, repair_mask, RepairOptions,
};
use fdm_types::{BlendConfig, Parameter, SampleArray, Timebase};

const HOUR_S: usize = 3600;

fn sine(frequency: f64, offset: f64) -> Parameter {
    let n = (HOUR_S as f64 * frequency) as usize;
    let values = SampleArray::from_values(
        (0..n)
            .map(|i| (i as f64 / frequency * 0.05).sin() * 1000.0)
            .collect(),
    );
    Parameter::new("Sine", values, frequency, offset).unwrap()
}

fn gappy(frequency: f64) -> SampleArray {
    let p = sine(frequency, 0.0);
    let mut values = p.values().unwrap().clone();
    for i in (0..values.len()).step_by(37) {
        values.mask(i);
        values.mask(i + 1);
    }
    values
}

// ── align() ─────────────────────────────────────────────────────────

fn bench_align_upsample(c: &mut Criterion) {
    let slave = sine(1.0, 0.25);
    let master = Timebase::new(8.0, 0.0).unwrap();
    c.bench_function("align_1hz_to_8hz_1h", |b| {
        b.iter(|| align(black_box(&slave), master, true))
    });
}

fn bench_align_downsample(c: &mut Criterion) {
    let slave = sine(16.0, 0.0);
    let master = Timebase::new(4.0, 0.1).unwrap();
    c.bench_function("align_16hz_to_4hz_1h", |b| {
        b.iter(|| align(black_box(&slave), master, true))
    });
}

// ── blending ────────────────────────────────────────────────────────

fn bench_blend_two(c: &mut Criterion) {
    let a = sine(4.0, 0.0);
    let b2 = sine(4.0, 0.125);
    let config = BlendConfig::default();
    c.bench_function("blend_two_4hz_1h", |b| {
        b.iter(|| blend_two_parameters(black_box(&a), black_box(&b2), &config))
    });
}

fn bench_blend_many(c: &mut Criterion) {
    let p1 = sine(2.0, 0.0);
    let p2 = sine(4.0, 0.0);
    let p3 = sine(1.0, 0.0);
    let config = BlendConfig::default();
    c.bench_function("blend_parameters_3_sensors_1h", |b| {
        b.iter(|| {
            blend_parameters(
                black_box(&[Some(&p1), Some(&p2), Some(&p3)]),
                None,
                None,
                &config,
            )
        })
    });
}

// ── repair_mask() ───────────────────────────────────────────────────

fn bench_repair_mask(c: &mut Criterion) {
    let values = gappy(8.0);
    c.bench_function("repair_mask_8hz_1h", |b| {
        b.iter(|| repair_mask(black_box(&values), RepairOptions::within(10.0, 8.0)))
    });
}

criterion_group!(
    benches,
    bench_align_upsample,
    bench_align_downsample,
    bench_blend_two,
    bench_blend_many,
    bench_repair_mask,
);
criterion_main!(benches);
