use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fsdocs_store::{Document, Store};
use serde_json::json;
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Benchmark: Key Resolution
// ============================================================================

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    let temp = TempDir::new().unwrap();
    let flat = Store::builder().root(temp.path()).connect_blocking().unwrap();
    let sharded = Store::builder().root(temp.path()).prefix_length(2).connect_blocking().unwrap();

    group.bench_function("flat_key", |b| {
        b.iter(|| black_box(flat.resolve("doc-12345").unwrap()));
    });

    group.bench_function("sharded_key", |b| {
        b.iter(|| black_box(sharded.resolve("doc-12345").unwrap()));
    });

    group.bench_function("nested_key", |b| {
        b.iter(|| black_box(flat.resolve("tenants/acme/users/doc-12345").unwrap()));
    });

    group.finish();
}

// ============================================================================
// Benchmark: Versioned Writes
// ============================================================================

fn document(size: usize) -> Document {
    Document::try_from(json!({ "title": "internet", "age": 35.5, "body": "x".repeat(size) }))
        .unwrap()
}

fn bench_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("writes");
    group.measurement_time(Duration::from_secs(10));

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Store::builder().root(temp.path()).prefix_length(2).connect_blocking().unwrap();

    for (name, size) in [("1KB", 1024), ("10KB", 10 * 1024), ("100KB", 100 * 1024)] {
        group.throughput(Throughput::Bytes(u64::try_from(size).unwrap_or(u64::MAX)));

        // Each iteration appends the next version of one key.
        group.bench_with_input(BenchmarkId::new("put_blocking_next_version", name), &size, |b, &size| {
            let mut doc = document(size);
            let key = format!("blocking-{name}");
            b.iter(|| assert!(store.put_blocking(&key, &mut doc).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("put_async_next_version", name), &size, |b, &size| {
            let key = format!("async-{name}");
            let mut doc = document(size);
            b.iter(|| rt.block_on(async { assert!(store.put(&key, &mut doc).await.unwrap()) }));
        });
    }

    // First versions pay for directory materialization.
    let counter = AtomicU64::new(0);
    group.bench_function("put_first_version", |b| {
        b.iter(|| {
            let key = format!("fresh-{}", counter.fetch_add(1, Ordering::Relaxed));
            let mut doc = document(256);
            assert!(store.put_blocking(&key, &mut doc).unwrap());
        });
    });

    let mut contended = document(256);
    assert!(store.put_blocking("contended", &mut contended).unwrap());
    group.bench_function("put_conflict", |b| {
        b.iter(|| {
            let mut stale = document(256);
            assert!(!store.put_blocking("contended", &mut stale).unwrap());
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark: Reads
// ============================================================================

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("reads");

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Store::builder().root(temp.path()).connect_blocking().unwrap();

    let mut doc = document(10 * 1024);
    for _ in 0..3 {
        assert!(store.put_blocking("read-bench", &mut doc).unwrap());
    }

    group.bench_function("get_current_blocking", |b| {
        b.iter(|| black_box(store.get_blocking("read-bench").unwrap()));
    });

    group.bench_function("get_snapshot_blocking", |b| {
        b.iter(|| black_box(store.get_version_blocking("read-bench", 2).unwrap()));
    });

    group.bench_function("get_current_async", |b| {
        b.to_async(&rt).iter(|| async { black_box(store.get("read-bench").await.unwrap()) });
    });

    group.bench_function("get_absent", |b| {
        b.iter(|| black_box(store.get_blocking("missing").unwrap()));
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_resolution, bench_writes, bench_reads);

criterion_main!(benches);
