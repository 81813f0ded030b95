//! Benchmarks for batched traversal.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use gather::{traverse, DataSource, Query, Runtime, SourceResult};

struct Numbers;

#[async_trait]
impl DataSource for Numbers {
    type Identity = u32;
    type Value = String;

    fn name(&self) -> &str {
        "numbers"
    }

    async fn fetch(&self, id: &u32) -> SourceResult<Option<String>> {
        Ok(Some(id.to_string()))
    }

    async fn batch(&self, ids: &[u32]) -> SourceResult<HashMap<u32, String>> {
        Ok(ids.iter().map(|id| (*id, id.to_string())).collect())
    }
}

fn bench_traverse(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("traverse");
    for size in [16u32, 128, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let source = Arc::new(Numbers);
                let query = traverse(0..size, |n| Query::fetch(&source, n));
                let values = rt.block_on(Runtime::new().run(query)).unwrap();
                black_box(values)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_traverse);
criterion_main!(benches);
