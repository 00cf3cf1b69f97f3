use automata_bisim::{
    prelude::*,
    random::{generate_random_nts, SILENT},
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const SIZES: [usize; 3] = [100, 400, 1600];
const SYMBOLS: usize = 3;
const EDGES_PER_STATE: usize = 3;

fn data(size: usize) -> Nts<char> {
    generate_random_nts(
        &mut fastrand::Rng::with_seed(size as u64),
        size,
        SYMBOLS,
        EDGES_PER_STATE,
    )
}

fn benchings(c: &mut Criterion) {
    let mut group = c.benchmark_group("weak");
    for size in SIZES {
        let ts = data(size);
        group.bench_with_input(BenchmarkId::new("change_tracking", size), &ts, |b, ts| {
            b.iter(|| weak_bisimulation(black_box(ts), [SILENT], None))
        });
        group.bench_with_input(BenchmarkId::new("saturation", size), &ts, |b, ts| {
            b.iter(|| weak_bisimulation_saturated(black_box(ts), [SILENT], None))
        });
    }
    group.finish();

    let mut group = c.benchmark_group("delayed");
    for size in SIZES {
        let ts = data(size);
        group.bench_with_input(BenchmarkId::new("change_tracking", size), &ts, |b, ts| {
            b.iter(|| delayed_bisimulation(black_box(ts), [SILENT], None))
        });
        group.bench_with_input(BenchmarkId::new("saturation", size), &ts, |b, ts| {
            b.iter(|| delayed_bisimulation_saturated(black_box(ts), [SILENT], None))
        });
    }
    group.finish();

    c.bench_function("strong", |b| {
        let ts = data(SIZES[2]);
        b.iter(|| bisimulation(black_box(&ts), None))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = benchings
}
criterion_main!(benches);
