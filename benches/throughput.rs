//! Throughput benchmarks: Corretto vs Moka vs QuickCache.
//!
//! Corretto's read path pins the entry, runs a closure and unpins, so the
//! comparison against plain `get` calls shows what the pinning contract
//! costs. The same key sets are replayed against all three caches.
//!
//! Run with:
//!     cargo bench --bench throughput

use corretto::CacheBuilder;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use moka::sync::Cache as MokaCache;
use quick_cache::sync::Cache as QuickCache;

/// Number of entries each cache is pre-filled with and its logical capacity.
const CAP: u64 = 10_000;

/// Operations executed per criterion iteration (hot-loop size).
const OPS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Group 1: pinned_get_hit
// ---------------------------------------------------------------------------
// All keys are present → measures pure read throughput with no eviction.

fn bench_pinned_get_hit(c: &mut Criterion) {
    let corretto: corretto::Cache<u64, u64> = CacheBuilder::new()
        .capacity(CAP as i64)
        .loader(|key: &u64| Some(*key * 2))
        .build();
    for i in 0..CAP {
        corretto.do_with(&i, |_| ()).unwrap();
    }

    let moka: MokaCache<u64, u64> = MokaCache::new(CAP);
    for i in 0..CAP {
        moka.insert(i, i * 2);
    }

    let qc: QuickCache<u64, u64> = QuickCache::new(CAP as usize);
    for i in 0..CAP {
        qc.insert(i, i * 2);
    }

    let mut group = c.benchmark_group("pinned_get_hit");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("corretto", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(corretto.do_with(black_box(&i), |v| *v).unwrap());
            }
        })
    });

    group.bench_function("moka", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(moka.get(black_box(&i)));
            }
        })
    });

    group.bench_function("quick_cache", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(qc.get(black_box(&i)));
            }
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 2: load_evicting
// ---------------------------------------------------------------------------
// Always-new keys — every operation loads a value and evicts an old entry.

fn bench_load_evicting(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_evicting");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("corretto", |b| {
        let cache: corretto::Cache<u64, u64> = CacheBuilder::new()
            .capacity(CAP as i64)
            .loader(|key: &u64| Some(*key))
            .build();
        let mut key = 0u64;
        b.iter(|| {
            for _ in 0..OPS {
                cache.do_with(black_box(&key), |v| *v).unwrap();
                key = key.wrapping_add(1);
            }
        })
    });

    group.bench_function("moka", |b| {
        let cache: MokaCache<u64, u64> = MokaCache::new(CAP);
        let mut key = 0u64;
        b.iter(|| {
            for _ in 0..OPS {
                cache.insert(black_box(key), black_box(key));
                key = key.wrapping_add(1);
            }
        })
    });

    group.bench_function("quick_cache", |b| {
        let cache: QuickCache<u64, u64> = QuickCache::new(CAP as usize);
        let mut key = 0u64;
        b.iter(|| {
            for _ in 0..OPS {
                cache.insert(black_box(key), black_box(key));
                key = key.wrapping_add(1);
            }
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 3: concurrent_pinned_get — 8-thread hit workload
// ---------------------------------------------------------------------------

fn bench_concurrent_pinned_get(c: &mut Criterion) {
    use std::sync::{Arc, Barrier};
    use std::time::{Duration, Instant};

    const THREADS: usize = 8;
    const OPS_PER_THREAD: u64 = 2_000;

    let cache: corretto::Cache<u64, u64> = CacheBuilder::new()
        .capacity(CAP as i64)
        .loader(|key: &u64| Some(*key))
        .build();
    for i in 0..CAP {
        cache.do_with(&i, |_| ()).unwrap();
    }
    let cache = Arc::new(cache);

    let mut group = c.benchmark_group("concurrent_8t_pinned_get");
    group.throughput(Throughput::Elements(THREADS as u64 * OPS_PER_THREAD));

    group.bench_function("corretto", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let barrier = Arc::new(Barrier::new(THREADS + 1));
                let handles: Vec<_> = (0..THREADS)
                    .map(|t| {
                        let cache = Arc::clone(&cache);
                        let barrier = Arc::clone(&barrier);
                        std::thread::spawn(move || {
                            barrier.wait();
                            let start = Instant::now();
                            let base = t as u64 * OPS_PER_THREAD;
                            for j in 0..OPS_PER_THREAD {
                                let k = (base.wrapping_add(j * 7_919)) % CAP;
                                black_box(cache.do_with(black_box(&k), |v| *v).unwrap());
                            }
                            start.elapsed()
                        })
                    })
                    .collect();
                barrier.wait();
                let elapsed = handles.into_iter().map(|h| h.join().unwrap()).max().unwrap();
                total += elapsed;
            }
            total
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_pinned_get_hit,
    bench_load_evicting,
    bench_concurrent_pinned_get,
);
criterion_main!(benches);
