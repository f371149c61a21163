//! Criterion benchmarks for the clustered scheduler.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rupture_bench::{reference_profile, stress_profile};
use rupture_engine::assign_clusters;

fn bench_assign_clusters_20k(c: &mut Criterion) {
    let p = stress_profile(42);
    let n = p.fixture.element_count();
    c.bench_function("assign_clusters_20k", |b| {
        b.iter(|| {
            let layout = assign_clusters(&p.fixture.stable_dt, n, 2, None).unwrap();
            black_box(layout.cluster_count());
        });
    });
}

fn bench_advance_1k(c: &mut Criterion) {
    let p = reference_profile(42);
    c.bench_function("advance_1k_to_16", |b| {
        b.iter(|| {
            let mut sim = p.simulation().unwrap();
            let outcome = sim.advance(16.0).unwrap();
            black_box(outcome);
        });
    });
}

fn bench_advance_1k_global(c: &mut Criterion) {
    // Rate 1 collapses to a single cluster: the global-stepping baseline.
    let mut p = reference_profile(42);
    p.config.rate = 1;
    c.bench_function("advance_1k_to_16_rate1", |b| {
        b.iter(|| {
            let mut sim = p.simulation().unwrap();
            let outcome = sim.advance(16.0).unwrap();
            black_box(outcome);
        });
    });
}

fn bench_advance_20k(c: &mut Criterion) {
    let p = stress_profile(42);
    let mut group = c.benchmark_group("stress");
    group.sample_size(10);
    group.bench_function("advance_20k_to_16", |b| {
        b.iter(|| {
            let mut sim = p.simulation().unwrap();
            let outcome = sim.advance(16.0).unwrap();
            black_box(outcome);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_assign_clusters_20k,
    bench_advance_1k,
    bench_advance_1k_global,
    bench_advance_20k
);
criterion_main!(benches);
