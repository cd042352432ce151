// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for the stress kernels at their default stress sizes.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kernels::{matmul, FftPlan, Matrix, PrimeWindow};
use rand::SeedableRng;

fn bench_matmul(c: &mut Criterion) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    let a = Matrix::random(256, 256, &mut rng);
    let b = Matrix::random(256, 256, &mut rng);
    let mut out = Matrix::zeros(256, 256);
    c.bench_function("matmul_256", |bench| {
        bench.iter(|| matmul(black_box(&a), black_box(&b), &mut out).unwrap())
    });
}

fn bench_fft(c: &mut Criterion) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(2);
    let plan = FftPlan::new(1 << 16).unwrap();
    let source = plan.random_input(&mut rng);
    let mut buf = source.clone();
    c.bench_function("fft_65536", |bench| {
        bench.iter(|| {
            buf.copy_from_slice(&source);
            plan.process(black_box(&mut buf)).unwrap()
        })
    });
}

fn bench_prime_window(c: &mut Criterion) {
    c.bench_function("prime_window_5000", |bench| {
        bench.iter(|| PrimeWindow::new(black_box(1_000_000), 5000).scan())
    });
}

criterion_group!(benches, bench_matmul, bench_fft, bench_prime_window);
criterion_main!(benches);
