//! Benchmarks for transfer entropy estimation and band extraction
//!
//! Measures:
//! - KSG estimate for fixed embeddings at several series lengths
//! - Surrogate null distribution construction
//! - Ragwitz embedding search
//! - Bidirectional TE with automatic embedding
//! - Zero-phase band-pass filtering and decimation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use infoflow::embedding::ragwitz_search;
use infoflow::simulation::{coupled_ar_pair, sine_mixture};
use infoflow::{
    compute_te, decimate, filt, ContinuousTransferEntropyEstimator, Embedding, EmbeddingParams,
    Engine, EngineConfig, KraskovTransferEntropy, TeOptions,
};

fn prepared_estimator(n: usize) -> KraskovTransferEntropy {
    let (x, y) = coupled_ar_pair(n, 0.6, 42);
    let mut est = KraskovTransferEntropy::new();
    est.initialise(Embedding::Fixed(EmbeddingParams::with_histories(1, 1).unwrap()))
        .unwrap();
    est.set_observations(&x, &y).unwrap();
    est
}

fn bench_ksg_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("ksg_estimate");
    group.sample_size(10);

    for n in [250, 500, 1000, 2000] {
        let mut est = prepared_estimator(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| black_box(est.compute_average_local_of_observations().unwrap()))
        });
    }

    group.finish();
}

fn bench_surrogates(c: &mut Criterion) {
    let mut group = c.benchmark_group("surrogates");
    group.sample_size(10);

    let mut est = prepared_estimator(500);
    for count in [10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(est.compute_significance(count).unwrap()))
        });
    }

    group.finish();
}

fn bench_ragwitz(c: &mut Criterion) {
    let (x, _) = coupled_ar_pair(500, 0.6, 3);
    c.bench_function("ragwitz_search_5x5", |b| {
        b.iter(|| ragwitz_search(black_box(&x), 5, 5, 4, 0).unwrap())
    });
}

fn bench_auto_embedded_te(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_te_auto");
    group.sample_size(10);

    let engine = Engine::start(EngineConfig::default()).unwrap();
    let options = TeOptions {
        knns: vec![4],
        status: false,
        ..TeOptions::default()
    };
    for n in [500, 2000] {
        let (x, y) = coupled_ar_pair(n, 0.5, 1);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| compute_te(&engine, black_box(&x), black_box(&y), &options).unwrap())
        });
    }

    group.finish();
}

fn bench_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtering");
    let signal = sine_mixture(20_000, 250.0, &[(4.0, 1.0), (10.0, 0.5), (40.0, 0.2)], 0.1, 9);

    for order in [2, 3, 5] {
        group.bench_with_input(BenchmarkId::new("bandpass", order), &order, |b, &order| {
            b.iter(|| filt(black_box(&signal), 8.0, 12.0, 250.0, order).unwrap())
        });
    }
    group.bench_function("decimate_4", |b| {
        b.iter(|| decimate(black_box(&signal), 4).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_ksg_estimate,
    bench_surrogates,
    bench_ragwitz,
    bench_auto_embedded_te,
    bench_filtering,
);

criterion_main!(benches);
