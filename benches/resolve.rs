use atomrouter::adapter::{CollectionAdapter, MemoryAdapter};
use atomrouter::target::{ResourceType, RouteTable, TargetBuilder, TargetResolver};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;
use std::collections::BTreeMap;
use std::hint::black_box;
use std::sync::Arc;

/// Service route, `collections` roots with media, one generic entry route
/// and one regex pattern.
fn table(collections: usize) -> RouteTable {
    let mut builder = RouteTable::builder()
        .route("service", "/", ResourceType::Service)
        .unwrap();
    for i in 0..collections {
        let adapter: Arc<dyn CollectionAdapter> = Arc::new(MemoryAdapter::new(format!("c{i}")).with_media("media/"));
        builder = builder.collection(&format!("/c{i}"), adapter).unwrap();
    }
    builder
        .route("entry", "/{collection}/{entry}", ResourceType::Entry)
        .unwrap()
        .pattern("archive", r"^/archive/(\d{4})$", &["year"], ResourceType::Collection)
        .unwrap()
        .build()
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for size in [4usize, 32, 128] {
        let table = table(size);
        let resolver = TargetResolver::new(&table);
        let last = size - 1;
        let paths = [
            ("literal", "/".to_string()),
            ("first_entry", "/c0/hello".to_string()),
            ("last_media", format!("/c{last}/media/pic")),
            ("generic", "/drafts/hello".to_string()),
            ("pattern", "/archive/2024".to_string()),
            ("miss", "/no/such/thing".to_string()),
        ];
        for (label, path) in &paths {
            group.bench_with_input(BenchmarkId::new(*label, size), path, |b, path| {
                b.iter(|| resolver.resolve_path(&Method::GET, black_box(path)))
            });
        }
    }
    group.finish();
}

fn bench_url_for(c: &mut Criterion) {
    let table = table(32);
    let builder = TargetBuilder::new(&table);
    let params: BTreeMap<String, String> = [
        ("entry".to_string(), "hello world".to_string()),
        ("page".to_string(), "2".to_string()),
    ]
    .into();
    c.bench_function("url_for_with_overflow", |b| {
        b.iter(|| builder.url_for(black_box("c7.entry"), &params))
    });
}

criterion_group!(benches, bench_resolve, bench_url_for);
criterion_main!(benches);
