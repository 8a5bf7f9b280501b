// Buffer pool performance benchmarks: page pin/unpin, LRU eviction, and
// concurrent fetch/unpin under contention.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rustydb_core::stats::Stats;
use rustydb_core::storage::{BufferPoolManager, DiskManager};
use rustydb_core::wal::LogManager;
use std::sync::Arc;
use tempfile::TempDir;

fn create_pool(pool_size: usize) -> (BufferPoolManager, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let data_disk = Arc::new(DiskManager::new(temp_dir.path().join("data.db")).unwrap());
    let log_disk = DiskManager::new(temp_dir.path().join("bench.wal")).unwrap();
    let log_manager = Arc::new(LogManager::new(log_disk, true, Arc::new(Stats::default())));
    let manager = BufferPoolManager::new(pool_size, data_disk, log_manager, Arc::new(Stats::default()));
    (manager, temp_dir)
}

fn bench_new_page_pin_unpin(c: &mut Criterion) {
    let (manager, _temp) = create_pool(1000);

    c.bench_function("new_page_pin_unpin", |b| {
        b.iter(|| {
            let (page_id, _frame_id) = manager.new_page().unwrap();
            manager.unpin_page(black_box(page_id), false).unwrap();
        });
    });
}

fn bench_fetch_resident_page(c: &mut Criterion) {
    let (manager, _temp) = create_pool(1000);
    let (page_id, _) = manager.new_page().unwrap();
    manager.unpin_page(page_id, false).unwrap();

    c.bench_function("fetch_resident_page", |b| {
        b.iter(|| {
            let _frame_id = manager.fetch_page(black_box(page_id)).unwrap();
            manager.unpin_page(page_id, false).unwrap();
        });
    });
}

fn bench_eviction_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction_pressure");

    for pool_size in [16usize, 64, 256] {
        group.bench_with_input(
            BenchmarkId::from_parameter(pool_size),
            &pool_size,
            |b, &pool_size| {
                let (manager, _temp) = create_pool(pool_size);
                b.iter(|| {
                    // Touch 2x the pool's capacity so every iteration forces
                    // at least one eviction through the LRU replacer.
                    for _ in 0..(pool_size * 2) {
                        let (page_id, _) = manager.new_page().unwrap();
                        manager.unpin_page(black_box(page_id), true).unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_concurrent_fetch(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_fetch");

    for num_threads in [1usize, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            &num_threads,
            |b, &num_threads| {
                let (manager, _temp) = create_pool(1000);
                let manager = Arc::new(manager);
                let page_ids: Vec<_> = (0..100)
                    .map(|_| {
                        let (page_id, _) = manager.new_page().unwrap();
                        manager.unpin_page(page_id, false).unwrap();
                        page_id
                    })
                    .collect();

                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|i| {
                            let mgr = Arc::clone(&manager);
                            let ids = page_ids.clone();
                            std::thread::spawn(move || {
                                for j in 0..10 {
                                    let page_id = ids[(i * 10 + j) % ids.len()];
                                    if let Ok(_frame_id) = mgr.fetch_page(page_id) {
                                        mgr.unpin_page(page_id, false).ok();
                                    }
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().ok();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_flush_all_pages(c: &mut Criterion) {
    let (manager, _temp) = create_pool(256);
    for _ in 0..200 {
        let (page_id, _) = manager.new_page().unwrap();
        manager.unpin_page(page_id, true).unwrap();
    }

    c.bench_function("flush_all_pages", |b| {
        b.iter(|| {
            manager.flush_all_pages().unwrap();
            black_box(&manager);
        });
    });
}

criterion_group!(
    benches,
    bench_new_page_pin_unpin,
    bench_fetch_resident_page,
    bench_eviction_pressure,
    bench_concurrent_fetch,
    bench_flush_all_pages
);
criterion_main!(benches);
