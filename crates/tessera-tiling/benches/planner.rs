//! Planner throughput on long tensor lists.
//!
//! The planner runs once per launch on the host thread, so its cost is paid
//! on every operator call. These benches track the partition walk, the chunk
//! solver and the full pipeline as the tensor count grows to the record cap.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tessera_common::{DType, PlatformLimits};
use tessera_tiling::{
    AlignedSizeList, CorePartitioner, MAX_TENSORS, OpFamily, PlanRequest, plan, solve_chunk,
};

/// Deterministic mix of tiny, medium and large tensors.
fn shapes(count: usize) -> Vec<Vec<u64>> {
    (0..count as u64)
        .map(|i| match i % 4 {
            0 => vec![i + 1],
            1 => vec![64, i + 3],
            2 => vec![0],
            _ => vec![1024, 17 + i % 9],
        })
        .collect()
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");
    for count in [8usize, 64, MAX_TENSORS] {
        let raw: Vec<u64> = shapes(count).iter().map(|s| s.iter().product()).collect();
        let sizes = AlignedSizeList::from_raw_counts(&raw, 4, 32).unwrap_or_else(|e| panic!("{e}"));
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &sizes, |b, sizes| {
            b.iter(|| CorePartitioner::new(48).partition(black_box(sizes)));
        });
    }
    group.finish();
}

fn bench_solve_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve_chunk");
    for family in [OpFamily::Unary, OpFamily::LerpList, OpFamily::RoundOffNumber] {
        let profile = family.profile(DType::BF16);
        group.bench_function(family.name(), |b| {
            b.iter(|| solve_chunk(black_box(&profile), 2, 16, black_box(196_608)));
        });
    }
    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let limits = PlatformLimits::default();
    let mut group = c.benchmark_group("plan");
    for count in [8usize, 64, MAX_TENSORS] {
        let req = PlanRequest::for_family(shapes(count), DType::F32, OpFamily::BinaryList);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &req, |b, req| {
            b.iter(|| plan(black_box(req), &limits));
        });
        group.bench_with_input(BenchmarkId::new("encode", count), &req, |b, req| {
            let desc = plan(req, &limits).unwrap_or_else(|e| panic!("{e}"));
            b.iter(|| black_box(&desc).encode());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_partition, bench_solve_chunk, bench_plan);
criterion_main!(benches);
