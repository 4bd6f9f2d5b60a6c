//! Benchmarks for history recording and gap lookups
//!
//! A full field of 60Hz histories covering a bit more than one lap, queried the
//! way a relative board does every frame.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use slipstream::gap::relative_gap;
use slipstream::history::{EntityHistory, HistoryConfig, HistoryStore};
use slipstream::test_utils::grid;
use std::hint::black_box;

const LAP: f64 = 5_000.0;
const SPEED: f64 = 60.0;
const HZ: f64 = 60.0;

/// One car driving `laps` laps at constant speed, sampled at 60Hz.
fn driven(offset: f64, laps: f64) -> EntityHistory {
    let mut history = EntityHistory::new(HistoryConfig::default());
    let samples = (laps * LAP / SPEED * HZ) as usize;
    for i in 0..samples {
        let time = i as f64 / HZ;
        let distance = offset + time * SPEED;
        history.record(distance, time, (distance / LAP).floor() as i32, LAP);
    }
    history
}

fn bench_time_at_distance(c: &mut Criterion) {
    let history = driven(0.0, 1.5);
    let first = history.first().map_or(0.0, |p| p.distance);
    let last = history.last_known_distance();

    let mut group = c.benchmark_group("time_at_distance");
    group.throughput(Throughput::Elements(history.len() as u64));
    group.bench_function("interpolated", |b| {
        let mut d = first;
        b.iter(|| {
            d += 37.3;
            if d >= last {
                d = first;
            }
            black_box(history.time_at_distance(black_box(d)))
        })
    });
    group.finish();
}

fn bench_relative_gap(c: &mut Criterion) {
    let subject = driven(0.0, 1.5);
    let target = driven(150.0, 1.5);

    c.bench_function("relative_gap_pair", |b| {
        b.iter(|| black_box(relative_gap(black_box(&subject), black_box(&target), LAP)))
    });
}

fn bench_store_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_ingest");
    for cars in [8, 32, 128] {
        let frames: Vec<_> = (0..600)
            .map(|i| grid(LAP as f32, cars, 0).time(f64::from(i) / HZ).build())
            .collect();
        group.throughput(Throughput::Elements(cars as u64));
        group.bench_with_input(BenchmarkId::from_parameter(cars), &frames, |b, frames| {
            b.iter(|| {
                let store = HistoryStore::default();
                for frame in frames {
                    store.ingest(black_box(frame));
                }
                black_box(store.len())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_time_at_distance, bench_relative_gap, bench_store_ingest);
criterion_main!(benches);
