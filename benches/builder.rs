//! Expression builder and constraint store benchmarks.
//!
//! Run with:
//! ```bash
//! cargo bench --bench builder
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use symcore::array::Array;
use symcore::assignment::Assignment;
use symcore::builder::ExprBuilder;
use symcore::config::BuilderConfig;
use symcore::constraints::ConstraintSet;
use symcore::reference::{ArrayRef, ExprRef};
use symcore::updates::UpdateLog;

// ============================================================================
// Helpers
// ============================================================================

fn input_bytes(b: &ExprBuilder, size: u32) -> (ArrayRef, Vec<ExprRef>) {
    let a = b.mk_array(Array::symbolic("input", size));
    let log = UpdateLog::new(a);
    let bytes = (0..size as u64).map(|i| b.mk_read(log, b.mk_const(i, 32))).collect();
    (a, bytes)
}

/// Random arithmetic over input bytes, widened to 32 bits.
fn build_random_expr(b: &ExprBuilder, bytes: &[ExprRef], num_ops: usize, seed: u64) -> ExprRef {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut nodes: Vec<ExprRef> = bytes.iter().map(|&x| b.mk_zext(x, 32)).collect();

    for _ in 0..num_ops {
        let i = rng.random_range(0..nodes.len());
        let j = rng.random_range(0..nodes.len());
        let (l, r) = (nodes[i], nodes[j]);
        nodes[i] = match rng.random_range(0..6) {
            0 => b.mk_add(l, r),
            1 => b.mk_sub(l, r),
            2 => b.mk_mul(l, r),
            3 => b.mk_and(l, r),
            4 => b.mk_xor(l, r),
            _ => b.mk_or(l, b.mk_const(rng.random_range(0..256), 32)),
        };
    }

    nodes.into_iter().fold(b.mk_const(0, 32), |acc, n| b.mk_add(acc, n))
}

/// A 32-bit little-endian word written byte by byte, then read back.
fn write_read_word(b: &ExprBuilder, value: ExprRef) -> ExprRef {
    let buf = b.mk_array(Array::constant("buf", vec![0; 8]));
    let log = (0..4u32).fold(UpdateLog::new(buf), |log, i| {
        b.extend(log, b.mk_const(i as u64, 32), b.mk_extract(value, 8 * i, 8))
    });
    b.mk_read_le(log, b.mk_const(0, 32), 4)
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_random_expr(c: &mut Criterion) {
    let mut group = c.benchmark_group("builder/random_expr");

    for num_ops in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(num_ops as u64));
        group.bench_with_input(BenchmarkId::from_parameter(num_ops), &num_ops, |bench, &num_ops| {
            bench.iter(|| {
                let b = ExprBuilder::new(BuilderConfig::default().with_table_bits(12));
                let (_, bytes) = input_bytes(&b, 16);
                build_random_expr(&b, &bytes, num_ops, 42)
            });
        });
    }

    group.finish();
}

fn bench_hash_consing(c: &mut Criterion) {
    let mut group = c.benchmark_group("builder/hash_consing");

    // Rebuilding an existing graph only hits the table.
    let b = ExprBuilder::default();
    let (_, bytes) = input_bytes(&b, 16);
    build_random_expr(&b, &bytes, 1000, 7);
    group.bench_function("rebuild_1000", |bench| {
        bench.iter(|| build_random_expr(&b, &bytes, 1000, 7));
    });

    group.finish();
}

fn bench_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("builder/write_read");

    group.bench_function("word_roundtrip", |bench| {
        let b = ExprBuilder::default();
        let (_, bytes) = input_bytes(&b, 4);
        let word = b.mk_read_le(UpdateLog::new(b.mk_array(Array::symbolic("w", 4))), b.mk_const(0, 32), 4);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        bench.iter(|| {
            let k = bytes[rng.random_range(0..bytes.len())];
            write_read_word(&b, b.mk_add(word, b.mk_zext(k, 32)))
        });
    });

    group.finish();
}

fn bench_constraints(c: &mut Criterion) {
    let mut group = c.benchmark_group("constraints/add");

    for n in [10, 50, 200] {
        group.bench_with_input(BenchmarkId::new("path", n), &n, |bench, &n| {
            bench.iter(|| {
                let b = ExprBuilder::default();
                let (_, bytes) = input_bytes(&b, 32);
                let mut rng = ChaCha8Rng::seed_from_u64(3);
                let mut path = ConstraintSet::default();
                for _ in 0..n {
                    let x = bytes[rng.random_range(0..bytes.len())];
                    let y = bytes[rng.random_range(0..bytes.len())];
                    let e = if rng.random_bool(0.2) {
                        b.mk_eq(b.mk_const(rng.random_range(0..256), 8), x)
                    } else {
                        b.mk_ule(x, b.mk_add(y, b.mk_const(1, 8)))
                    };
                    if !path.add_constraint(&b, e) {
                        break;
                    }
                }
                path.len()
            });
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("assignment/evaluate");

    let b = ExprBuilder::default();
    let (input, bytes) = input_bytes(&b, 16);
    let e = build_random_expr(&b, &bytes, 2000, 11);
    let mut a = Assignment::new(false);
    a.bind(&b, input, (0..16).collect());

    group.bench_function("random_2000", |bench| {
        bench.iter(|| a.evaluate(&b, e));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_random_expr,
    bench_hash_consing,
    bench_write_read,
    bench_constraints,
    bench_evaluate,
);

criterion_main!(benches);
