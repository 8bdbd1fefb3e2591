//! Criterion benchmarks for the trace measurements and batch mapping
//!
//! Run with: cargo bench -p batchmeas_core

use std::collections::BTreeMap;

use batchmeas_core::analysis::{Measurement, MeasurementTarget, map_all};
use batchmeas_core::measure::{self, MeasureConfig};
use batchmeas_core::model::{
    CellId, CombinationKey, FieldData, ParameterAxis, ParameterGrid, ResultRecord, ResultSet,
    TimeSeries,
};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;

/// One second at 0.1 ms: resting, then a plateau with spikes riding on it
fn plateau_trace(samples: usize) -> Vec<f64> {
    (0..samples)
        .map(|i| {
            let t = i as f64 * 0.1;
            if !(200.0..500.0).contains(&t) {
                -70.0
            } else if i % 150 == 0 {
                25.0
            } else {
                -40.0 + (t * 0.3).sin()
            }
        })
        .collect()
}

fn batch(grid: &ParameterGrid, samples: usize) -> ResultSet {
    let trace = plateau_trace(samples);
    grid.combinations()
        .map(|c| {
            let fields: BTreeMap<String, FieldData> = serde_json::from_value(json!({
                "simData": {"V_soma": {"cell_0": trace}},
                "net": {"cells": [{"gid": 0}]}
            }))
            .unwrap();
            (
                CombinationKey::encode(&c.indices),
                ResultRecord::new(c.values, fields),
            )
        })
        .collect()
}

fn bench_single_trace(c: &mut Criterion) {
    let trace = plateau_trace(10_000);
    let series = TimeSeries::new(&trace, 0.1).unwrap();
    let config = MeasureConfig::default();

    c.bench_function("spike_times_1s", |b| {
        b.iter(|| measure::spike_times(black_box(&series), black_box(-20.0)))
    });
    c.bench_function("plateau_amplitude_1s", |b| {
        b.iter(|| measure::plateau_amplitude(black_box(&series), black_box(&config)))
    });
    c.bench_function("plateau_duration_1s", |b| {
        b.iter(|| measure::plateau_duration(black_box(&series), black_box(&config)))
    });
}

fn bench_trace_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("clip_spikes");
    for samples in [2_500, 10_000, 40_000].iter() {
        let trace = plateau_trace(*samples);
        group.bench_with_input(BenchmarkId::new("samples", samples), samples, |b, _| {
            let series = TimeSeries::new(&trace, 0.1).unwrap();
            b.iter(|| measure::clip_spikes(black_box(&series), 3.0, -20.0))
        });
    }
    group.finish();
}

fn bench_map_batch(c: &mut Criterion) {
    let grid = ParameterGrid::new(vec![
        ParameterAxis::linspace("glutAmp", 0.5, 2.0, 10),
        ParameterAxis::linspace("loc", 0.1, 0.9, 5),
    ])
    .unwrap();
    let results = batch(&grid, 10_000);
    let target = MeasurementTarget::soma(CellId(0));
    let config = MeasureConfig::default();
    let measurements = [
        Measurement::PlateauAmplitude,
        Measurement::PlateauDuration,
        Measurement::SpikeFrequency,
    ];

    c.bench_function("map_all_10x5", |b| {
        b.iter(|| {
            map_all(
                black_box(&grid),
                black_box(&results),
                &target,
                &measurements,
                &config,
            )
        })
    });
}

criterion_group!(
    benches,
    bench_single_trace,
    bench_trace_length,
    bench_map_batch,
);
criterion_main!(benches);
