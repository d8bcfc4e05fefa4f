//! Benchmarks for kernel phases
//!
//! This benchmark suite measures:
//! - Compile, assemble and compute of the 1-D and 2-D benchmark kernels
//! - Compute under different schedules of one kernel
//! - Reference engine against the dense oracle on small problems

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use tenbench_exec::{DenseEngine, Kernel, ReferenceEngine, TensorEngine};
use tenbench_planner::{Assignment, OutputRaceStrategy, ParallelUnit, Schedule};
use tenbench_sparse::{FixtureBuilder, SparseTensor};

fn vector(name: &str, n: usize, entries: usize, seed: u64) -> SparseTensor<i64> {
    FixtureBuilder::new(name, vec![n])
        .entries(entries)
        .seed(seed)
        .build()
        .unwrap()
}

fn matrix(name: &str, rows: usize, cols: usize, entries: usize, seed: u64) -> SparseTensor<i64> {
    FixtureBuilder::new(name, vec![rows, cols])
        .entries(entries)
        .seed(seed)
        .build()
        .unwrap()
}

/// Benchmark each phase of D(i) = A(i) * B(i) * C(i)
fn bench_elementwise_phases(c: &mut Criterion) {
    let mut group = c.benchmark_group("elementwise_phases");

    for size in [10_000usize, 100_000, 1_000_000] {
        let nnz = size / 10;
        let a = vector("A", size, nnz, 1);
        let b = vector("B", size, nnz, 2);
        let cv = FixtureBuilder::<i64>::new("C", vec![size]).at(vec![0]).build().unwrap();
        let stmt = Assignment::parse("D(i) = A(i) * B(i) * C(i)").unwrap();
        let engine = ReferenceEngine::new();
        group.throughput(Throughput::Elements(nnz as u64));

        group.bench_with_input(BenchmarkId::new("compile", size), &size, |bench, _| {
            bench.iter(|| {
                let program = engine
                    .compile(black_box(&stmt), &[&a, &b, &cv], &Schedule::new())
                    .unwrap();
                black_box(program);
            });
        });

        let program = engine.compile(&stmt, &[&a, &b, &cv], &Schedule::new()).unwrap();
        group.bench_with_input(BenchmarkId::new("assemble", size), &size, |bench, _| {
            bench.iter(|| black_box(engine.assemble(&program).unwrap()));
        });

        let mut out = engine.assemble(&program).unwrap();
        group.bench_with_input(BenchmarkId::new("compute", size), &size, |bench, _| {
            bench.iter(|| engine.compute(&program, black_box(&mut out)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark compute of D(i) = A(i,j) * B(i,j) * C(j) under several schedules
fn bench_matvec_schedules(c: &mut Criterion) {
    let mut group = c.benchmark_group("matvec_schedules");
    let (rows, cols, nnz) = (2_000, 1_000, 100_000);

    let a = matrix("A", rows, cols, nnz, 11);
    let b = matrix("B", rows, cols, nnz, 12);
    let cv = vector("C", cols, cols / 4, 13);
    let stmt = Assignment::parse("D(i) = A(i,j) * B(i,j) * C(j)").unwrap();
    let engine = ReferenceEngine::new();

    let schedules = [
        ("default", Schedule::new()),
        ("split_i_64", Schedule::new().split("i", "i0", "i1", 64)),
        (
            "parallel_i",
            Schedule::new().parallelize("i", ParallelUnit::CpuThread, OutputRaceStrategy::NoRaces),
        ),
        (
            "parallel_j_temporary",
            Schedule::new()
                .reorder(["j", "i"])
                .parallelize("j", ParallelUnit::CpuThread, OutputRaceStrategy::Temporary),
        ),
        (
            "parallel_j_atomics",
            Schedule::new()
                .reorder(["j", "i"])
                .parallelize("j", ParallelUnit::CpuThread, OutputRaceStrategy::Atomics),
        ),
    ];

    for (label, schedule) in schedules {
        let mut kernel = Kernel::new(&engine, stmt.clone(), vec![&a, &b, &cv]).with_schedule(schedule);
        kernel.compile().unwrap();
        kernel.assemble().unwrap();
        group.bench_function(label, |bench| {
            bench.iter(|| black_box(kernel.compute().unwrap()));
        });
    }

    group.finish();
}

/// Benchmark the reference engine against the dense oracle
fn bench_engines(c: &mut Criterion) {
    let mut group = c.benchmark_group("engines");

    for size in [16usize, 32, 64] {
        let a = matrix("A", size, size, size * 2, 21);
        let b = matrix("B", size, size, size * 2, 22);
        let cv = vector("C", size, size / 2, 23);
        let stmt = Assignment::parse("D(i) = A(i,j) * B(i,j) * C(j)").unwrap();

        group.bench_with_input(BenchmarkId::new("reference", size), &size, |bench, _| {
            bench.iter(|| {
                black_box(tenbench_exec::run(&ReferenceEngine, &stmt, &[&a, &b, &cv], None).unwrap())
            });
        });
        group.bench_with_input(BenchmarkId::new("dense", size), &size, |bench, _| {
            bench.iter(|| black_box(tenbench_exec::run(&DenseEngine, &stmt, &[&a, &b, &cv], None).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_elementwise_phases,
    bench_matvec_schedules,
    bench_engines
);
criterion_main!(benches);
