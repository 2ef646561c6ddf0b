//! GEMM throughput benchmarks
//!
//! Covers the three dispatch regimes: the scalar small-matrix path, the
//! tiled SIMD path inside one cache block, and shapes spanning multiple
//! blocks. Throughput is reported in elements of `2*M*N*K` flops.
//!
//! Usage:
//!   cargo bench --bench matmul

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use opkern::{Engine, MatmulParams, TensorView, TensorViewMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn rand_f32(n: usize, rng: &mut StdRng) -> Vec<f32> {
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn bench_square(c: &mut Criterion) {
    let engine = Engine::default();
    let mut rng = StdRng::seed_from_u64(42);
    let mut group = c.benchmark_group("matmul_square");

    for &size in &[32usize, 128, 512, 1024] {
        let a = rand_f32(size * size, &mut rng);
        let b = rand_f32(size * size, &mut rng);
        let mut out = vec![0.0f32; size * size];
        group.throughput(Throughput::Elements((2 * size * size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bench, &size| {
            bench.iter(|| {
                let av = TensorView::new(&a, &[size, size]).unwrap();
                let bv = TensorView::new(&b, &[size, size]).unwrap();
                let mut ov = TensorViewMut::new(&mut out, &[size, size]).unwrap();
                engine
                    .matmul(MatmulParams::default(), av, bv, &mut ov)
                    .unwrap();
                black_box(&out);
            });
        });
    }
    group.finish();
}

fn bench_transposed(c: &mut Criterion) {
    let engine = Engine::default();
    let mut rng = StdRng::seed_from_u64(43);
    let size = 512usize;
    let a = rand_f32(size * size, &mut rng);
    let b = rand_f32(size * size, &mut rng);
    let mut out = vec![0.0f32; size * size];
    let mut group = c.benchmark_group("matmul_512_layouts");
    group.throughput(Throughput::Elements((2 * size * size * size) as u64));

    for (label, trans_a, trans_b) in [
        ("nn", false, false),
        ("tn", true, false),
        ("nt", false, true),
        ("tt", true, true),
    ] {
        group.bench_function(label, |bench| {
            bench.iter(|| {
                let av = TensorView::new(&a, &[size, size]).unwrap();
                let bv = TensorView::new(&b, &[size, size]).unwrap();
                let mut ov = TensorViewMut::new(&mut out, &[size, size]).unwrap();
                engine
                    .matmul(
                        MatmulParams {
                            trans_a,
                            trans_b,
                            accumulate: false,
                        },
                        av,
                        bv,
                        &mut ov,
                    )
                    .unwrap();
                black_box(&out);
            });
        });
    }
    group.finish();
}

fn bench_batched(c: &mut Criterion) {
    let engine = Engine::default();
    let mut rng = StdRng::seed_from_u64(44);
    let (batch, m, n, k) = (16usize, 64usize, 64usize, 64usize);
    let a = rand_f32(batch * m * k, &mut rng);
    let b = rand_f32(k * n, &mut rng);
    let mut out = vec![0.0f32; batch * m * n];
    let mut group = c.benchmark_group("matmul_batched");
    group.throughput(Throughput::Elements((2 * batch * m * n * k) as u64));

    group.bench_function("16x64x64x64_shared_rhs", |bench| {
        bench.iter(|| {
            let av = TensorView::new(&a, &[batch, m, k]).unwrap();
            let bv = TensorView::new(&b, &[k, n]).unwrap();
            let mut ov = TensorViewMut::new(&mut out, &[batch, m, n]).unwrap();
            engine
                .matmul(MatmulParams::default(), av, bv, &mut ov)
                .unwrap();
            black_box(&out);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_square, bench_transposed, bench_batched);
criterion_main!(benches);
