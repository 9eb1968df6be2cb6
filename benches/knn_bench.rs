use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use minhash_knn::algo::hash::HashFamily;
use minhash_knn::algo::minhash::SignatureComputer;
use minhash_knn::algo::tokenizer;
use minhash_knn::{MinHash, MinHashParams, Query, QueryMode, SparseMatrix};

/// Generate synthetic text data for benchmarking
fn generate_texts(n: usize) -> Vec<String> {
    let domains = [
        "rust programming memory safety borrow checker ownership lifetime",
        "python data science machine learning pandas numpy tensorflow",
        "javascript web development react angular vue node express",
        "go concurrency goroutines channels microservices kubernetes docker",
        "database sql postgresql mysql redis mongodb cassandra",
        "security authentication authorization oauth jwt encryption",
    ];
    (0..n)
        .map(|i| {
            let base = domains[i % domains.len()];
            format!("{base} item-{i} extra-context-{}", i % 100)
        })
        .collect()
}

fn generate_rows(n: usize) -> Vec<Vec<u64>> {
    generate_texts(n)
        .iter()
        .map(|t| tokenizer::text_features(t, 3))
        .collect()
}

fn fitted(rows: &[Vec<u64>]) -> MinHash {
    let mut engine = MinHash::with_params(MinHashParams::default()).unwrap();
    engine.fit(SparseMatrix::from_rows(rows.to_vec())).unwrap();
    engine
}

fn bench_signature(c: &mut Criterion) {
    let rows = generate_rows(1);
    let computer = SignatureComputer::new(HashFamily::build(400, 1), 4).unwrap();
    c.bench_function("signature/400_functions", |b| {
        b.iter(|| black_box(computer.compute(black_box(&rows[0]))))
    });
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);
    for size in [1000, 5000] {
        let rows = generate_rows(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| black_box(fitted(rows).len()))
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let rows = generate_rows(5000);
    let engine = fitted(&rows);
    let mut group = c.benchmark_group("query");
    for mode in [QueryMode::Fast, QueryMode::Refined] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{mode:?}")),
            &mode,
            |b, &mode| {
                b.iter(|| {
                    black_box(
                        engine
                            .neighbors(Query::Features(&rows[17]), 10, mode)
                            .unwrap(),
                    )
                })
            },
        );
    }
    group.finish();
}

fn bench_neighbors_of_indexed(c: &mut Criterion) {
    let rows = generate_rows(2000);
    let engine = fitted(&rows);
    c.bench_function("neighbors_of_indexed/2000", |b| {
        b.iter(|| black_box(engine.neighbors_of_indexed(5, QueryMode::Fast).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_signature,
    bench_fit,
    bench_query,
    bench_neighbors_of_indexed,
);
criterion_main!(benches);
