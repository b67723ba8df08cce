use counting_cache::config::{AdaptiveCacheConfig, MemoryCacheParams};
use counting_cache::{
    AdaptiveCountingMemoryCache, CloseableRef, CountingMemoryCache, MemoryTrimType,
    SuggestedTrimStrategy,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

const CACHE_SIZE: usize = 1000;

// Room for every value; the eviction queue holds all of them once released.
fn params() -> MemoryCacheParams {
    MemoryCacheParams {
        max_cache_size: CACHE_SIZE * 64,
        max_cache_entries: CACHE_SIZE,
        max_eviction_queue_size: CACHE_SIZE * 64,
        max_eviction_queue_entries: CACHE_SIZE,
        max_cache_entry_size: 64,
        params_check_interval: Duration::from_secs(60),
    }
}

fn make_counting() -> CountingMemoryCache<usize, usize> {
    CountingMemoryCache::new(|_: &usize| 32, SuggestedTrimStrategy, params())
}

fn make_adaptive() -> AdaptiveCountingMemoryCache<usize, usize> {
    AdaptiveCountingMemoryCache::new(
        |_: &usize| 32,
        SuggestedTrimStrategy,
        params(),
        AdaptiveCacheConfig {
            ghost_list_max_size: CACHE_SIZE as i32,
            ..AdaptiveCacheConfig::default()
        },
    )
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Cache Operations");

    // Single queue
    {
        let cache = make_counting();
        for i in 0..CACHE_SIZE {
            drop(cache.cache(i, &CloseableRef::of(i)));
        }

        group.bench_function("Counting get hit", |b| {
            b.iter(|| {
                for i in 0..100 {
                    black_box(cache.get(&(i % CACHE_SIZE)));
                }
            });
        });

        group.bench_function("Counting get miss", |b| {
            b.iter(|| {
                for i in 0..100 {
                    black_box(cache.get(&(i + CACHE_SIZE)));
                }
            });
        });

        group.bench_function("Counting cache", |b| {
            b.iter(|| {
                for i in 0..100 {
                    black_box(cache.cache(i, &CloseableRef::of(i)));
                }
            });
        });

        group.bench_function("Counting probe", |b| {
            b.iter(|| {
                for i in 0..100 {
                    cache.probe(black_box(&(i % CACHE_SIZE)));
                }
            });
        });
    }

    // Adaptive queues
    {
        let cache = make_adaptive();
        for i in 0..CACHE_SIZE {
            drop(cache.cache(i, &CloseableRef::of(i)));
        }

        group.bench_function("Adaptive get hit", |b| {
            b.iter(|| {
                for i in 0..100 {
                    black_box(cache.get(&(i % CACHE_SIZE)));
                }
            });
        });

        group.bench_function("Adaptive get miss", |b| {
            b.iter(|| {
                for i in 0..100 {
                    black_box(cache.get(&(i + CACHE_SIZE)));
                }
            });
        });

        group.bench_function("Adaptive cache", |b| {
            b.iter(|| {
                for i in 0..100 {
                    black_box(cache.cache(i, &CloseableRef::of(i)));
                }
            });
        });
    }

    // Refill then trim everything
    group.bench_function("Counting fill and trim", |b| {
        let cache = make_counting();
        b.iter(|| {
            for i in 0..100 {
                drop(cache.cache(i, &CloseableRef::of(i)));
            }
            cache.trim(MemoryTrimType::OnAppBackgrounded);
            black_box(cache.count());
        });
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
