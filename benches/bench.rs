//! Criterion benchmarks for autocomplete indexing and search.
//!
//! - Prefix expansion and score encoding
//! - Indexing under both strategies
//! - Searching with hydration

use std::hint::black_box;
use std::sync::Arc;

use autocomplete::analysis::prefixes;
use autocomplete::prelude::*;
use autocomplete::score::encode_score;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde::Serialize;
use tokio::runtime::Runtime;

#[derive(Serialize)]
struct Car {
    id: String,
    name: String,
}

impl Document for Car {
    type Payload = Car;

    fn id(&self) -> &str {
        &self.id
    }

    fn term(&self) -> &str {
        &self.name
    }

    fn payload(&self) -> &Car {
        self
    }
}

/// Generate test documents for benchmarking.
fn generate_cars(count: usize) -> Vec<Car> {
    let makes = ["Mercedes", "Toyota", "Volkswagen", "Peugeot", "Hyundai", "Renault"];
    let models = ["S500", "Prius", "Golf GTI", "208", "Ioniq 5", "Clio"];

    (0..count)
        .map(|i| Car {
            id: i.to_string(),
            name: format!("{} {} {}", makes[i % makes.len()], models[(i / 7) % models.len()], i),
        })
        .collect()
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");

    group.bench_function("prefixes", |b| {
        b.iter(|| prefixes(black_box("Volkswagen Golf GTI Performance 2024")))
    });

    group.bench_function("encode_score", |b| b.iter(|| encode_score(black_box(1_234_567))));

    group.finish();
}

fn bench_index(c: &mut Criterion) {
    let runtime = Runtime::new().expect("tokio runtime");
    let cars = generate_cars(1000);
    let mut group = c.benchmark_group("index");
    group.throughput(Throughput::Elements(cars.len() as u64));

    let cars = &cars;
    for index_type in [IndexType::Prefixes, IndexType::Terms] {
        group.bench_with_input(BenchmarkId::from_parameter(index_type), &index_type, |b, &index_type| {
            b.to_async(&runtime).iter(move || async move {
                let engine = Autocomplete::new(Arc::new(MemoryStore::new_default()), "bench", index_type);
                for (rank, car) in cars.iter().enumerate() {
                    engine.index("cars", car, rank as u64).await.expect("index");
                }
            })
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let runtime = Runtime::new().expect("tokio runtime");
    let cars = generate_cars(5000);
    let mut group = c.benchmark_group("search");

    for index_type in [IndexType::Prefixes, IndexType::Terms] {
        let engine = Autocomplete::new(Arc::new(MemoryStore::new_default()), "bench", index_type);
        runtime.block_on(async {
            for (rank, car) in cars.iter().enumerate() {
                engine.index("cars", car, rank as u64).await.expect("index");
            }
        });

        let engine = &engine;
        for order in [SortOrder::Lexicographical, SortOrder::Score] {
            let id = BenchmarkId::new(index_type.to_string(), order);
            group.bench_function(id, |b| {
                b.to_async(&runtime).iter(move || async move {
                    engine
                        .search(black_box("cars"), black_box("toyota"), order)
                        .await
                        .expect("search")
                })
            });
        }
    }

    group.bench_function("intersection", |b| {
        let engine = Autocomplete::new(Arc::new(MemoryStore::new_default()), "bench", IndexType::Prefixes);
        runtime.block_on(async {
            for (rank, car) in cars.iter().enumerate() {
                engine.index("cars", car, rank as u64).await.expect("index");
            }
        });

        let engine = &engine;
        b.to_async(&runtime).iter(move || async move {
            engine
                .search("cars", black_box("toy pri"), SortOrder::ReverseScore)
                .await
                .expect("search")
        })
    });

    group.finish();
}

criterion_group!(benches, bench_analysis, bench_index, bench_search);
criterion_main!(benches);
