//! Concurrent Cache Benchmarks
//!
//! Benchmarks for measuring shared cache performance across different
//! access patterns and thread counts.

use counting_cache::config::{AdaptiveCacheConfig, MemoryCacheParams};
use counting_cache::{
    AdaptiveCountingMemoryCache, CloseableRef, CountingMemoryCache, SuggestedTrimStrategy,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const CACHE_SIZE: usize = 10_000;
const OPS_PER_THREAD: usize = 1_000;

type Counting = CountingMemoryCache<usize, usize>;
type Adaptive = AdaptiveCountingMemoryCache<usize, usize>;

fn params() -> MemoryCacheParams {
    MemoryCacheParams {
        max_cache_size: CACHE_SIZE * 16,
        max_cache_entries: CACHE_SIZE,
        max_eviction_queue_size: CACHE_SIZE * 16,
        max_eviction_queue_entries: CACHE_SIZE,
        max_cache_entry_size: 16,
        params_check_interval: Duration::from_secs(60),
    }
}

fn make_counting() -> Arc<Counting> {
    Arc::new(CountingMemoryCache::new(
        |v: &usize| (v % 10) + 1,
        SuggestedTrimStrategy,
        params(),
    ))
}

fn make_adaptive() -> Arc<Adaptive> {
    Arc::new(AdaptiveCountingMemoryCache::new(
        |v: &usize| (v % 10) + 1,
        SuggestedTrimStrategy,
        params(),
        AdaptiveCacheConfig {
            ghost_list_max_size: 1024,
            ..AdaptiveCacheConfig::default()
        },
    ))
}

fn fill<P>(cache: &counting_cache::MemoryCache<usize, usize, P>)
where
    P: counting_cache::ExclusivePolicy<usize, usize> + 'static,
{
    for i in 0..CACHE_SIZE {
        drop(cache.cache(i, &CloseableRef::of(i)));
    }
}

/// Benchmark concurrent read operations
fn concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concurrent Reads");
    group.throughput(Throughput::Elements((8 * OPS_PER_THREAD) as u64));

    let counting = make_counting();
    let adaptive = make_adaptive();
    fill(&counting);
    fill(&adaptive);

    group.bench_function("Counting", |b| {
        b.iter(|| {
            let cache = Arc::clone(&counting);
            run_threads(8, move |t, i| {
                black_box(cache.get(&((t * OPS_PER_THREAD + i) % CACHE_SIZE)));
            });
        });
    });

    group.bench_function("Adaptive", |b| {
        b.iter(|| {
            let cache = Arc::clone(&adaptive);
            run_threads(8, move |t, i| {
                black_box(cache.get(&((t * OPS_PER_THREAD + i) % CACHE_SIZE)));
            });
        });
    });

    group.finish();
}

/// Benchmark concurrent write operations
fn concurrent_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concurrent Writes");
    group.throughput(Throughput::Elements((8 * OPS_PER_THREAD) as u64));

    group.bench_function("Counting", |b| {
        let cache = make_counting();
        b.iter(|| {
            let cache = Arc::clone(&cache);
            run_threads(8, move |t, i| {
                let key = t * OPS_PER_THREAD + i;
                drop(black_box(cache.cache(key, &CloseableRef::of(key))));
            });
        });
    });

    group.bench_function("Adaptive", |b| {
        let cache = make_adaptive();
        b.iter(|| {
            let cache = Arc::clone(&cache);
            run_threads(8, move |t, i| {
                let key = t * OPS_PER_THREAD + i;
                drop(black_box(cache.cache(key, &CloseableRef::of(key))));
            });
        });
    });

    group.finish();
}

/// Benchmark mixed workloads (80% reads, 20% writes) across thread counts
fn concurrent_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concurrent Mixed");

    for threads in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements((threads * OPS_PER_THREAD) as u64));

        let counting = make_counting();
        fill(&counting);
        group.bench_with_input(BenchmarkId::new("Counting", threads), &threads, |b, &threads| {
            b.iter(|| {
                let cache = Arc::clone(&counting);
                run_threads(threads, move |t, i| mixed_op(&cache, t, i));
            });
        });

        let adaptive = make_adaptive();
        fill(&adaptive);
        group.bench_with_input(BenchmarkId::new("Adaptive", threads), &threads, |b, &threads| {
            b.iter(|| {
                let cache = Arc::clone(&adaptive);
                run_threads(threads, move |t, i| mixed_op(&cache, t, i));
            });
        });
    }

    group.finish();
}

fn mixed_op<P>(cache: &counting_cache::MemoryCache<usize, usize, P>, t: usize, i: usize)
where
    P: counting_cache::ExclusivePolicy<usize, usize> + 'static,
{
    let key = (t * OPS_PER_THREAD + i) % CACHE_SIZE;
    if i % 5 == 0 {
        drop(cache.cache(key, &CloseableRef::of(key)));
    } else {
        black_box(cache.get(&key));
    }
}

fn run_threads<F>(threads: usize, op: F)
where
    F: Fn(usize, usize) + Send + Sync + 'static,
{
    let op = Arc::new(op);
    let mut handles = Vec::with_capacity(threads);
    for t in 0..threads {
        let op = Arc::clone(&op);
        handles.push(thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                op(t, i);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

criterion_group!(benches, concurrent_reads, concurrent_writes, concurrent_mixed);
criterion_main!(benches);
