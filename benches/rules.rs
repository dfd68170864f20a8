//! Criterion benchmarks for trial-spec generation.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fluxgate::difficulty::ComplexityLevel;
use fluxgate::prng::Prng;
use fluxgate::rules::{self, ChaosFlags, ChaosPolicy, SessionCipher};

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");

    for level in ComplexityLevel::ALL {
        group.bench_with_input(
            BenchmarkId::from_parameter(level.label()),
            &level,
            |b, &level| {
                let mut prng = Prng::new(42);
                let cipher = SessionCipher::random(&mut prng);
                b.iter(|| {
                    let spec = rules::generate(black_box(level), &cipher, &mut prng);
                    black_box(spec)
                });
            },
        );
    }

    group.finish();
}

fn bench_chaos_sampling(c: &mut Criterion) {
    c.bench_function("chaos_sample_max_load", |b| {
        let mut prng = Prng::new(42);
        let policy = ChaosPolicy::default();
        b.iter(|| {
            black_box(ChaosFlags::sample(
                ComplexityLevel::MaximumLoad,
                &policy,
                &mut prng,
            ))
        });
    });
}

criterion_group!(benches, bench_generate, bench_chaos_sampling);
criterion_main!(benches);
