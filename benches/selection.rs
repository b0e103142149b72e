//! Selection Benchmarks
//!
//! Measures one balancing decision per discipline across realistic pool
//! sizes (10, 100, 500 backends) with randomized weights.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use wbalance::{Algorithm, BackendConf, Balancer};

fn build_balancer(count: usize) -> Balancer {
    let mut rng = rand::thread_rng();
    let snapshot: Vec<BackendConf> = (0..count)
        .map(|i| BackendConf {
            name: format!("10.10.0.{}", i),
            addr: format!("10.10.0.{}", i),
            port: 80,
            weight: 1 + rng.gen_range(0..5),
        })
        .collect();
    Balancer::new(&snapshot).unwrap()
}

fn bench_discipline(c: &mut Criterion, name: &str, algorithm: Algorithm, key: &[u8]) {
    let mut group = c.benchmark_group(format!("selection/{}", name));

    for size in [10, 100, 500] {
        let balancer = build_balancer(size);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| balancer.select(black_box(algorithm), black_box(key)).unwrap());
        });
    }

    group.finish();
}

fn bench_wrr_simple(c: &mut Criterion) {
    bench_discipline(c, "wrr_simple", Algorithm::WrrSimple, b"");
}

fn bench_wrr_smooth(c: &mut Criterion) {
    bench_discipline(c, "wrr_smooth", Algorithm::WrrSmooth, b"");
}

fn bench_sticky(c: &mut Criterion) {
    bench_discipline(c, "sticky", Algorithm::Sticky, b"d");
}

fn bench_least_conns(c: &mut Criterion) {
    bench_discipline(c, "wlc_smooth", Algorithm::WlcSmooth, b"");
}

criterion_group!(
    benches,
    bench_wrr_simple,
    bench_wrr_smooth,
    bench_sticky,
    bench_least_conns
);
criterion_main!(benches);
