// Transaction and lock manager performance benchmarks: begin/commit
// lifecycle, isolation-level selection, and lock contention under strict
// two-phase locking.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rustydb_core::common::RecordId;
use rustydb_core::stats::Stats;
use rustydb_core::storage::DiskManager;
use rustydb_core::transaction::{IsolationLevel, LockManager, TransactionManager};
use rustydb_core::wal::LogManager;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn create_manager() -> (TransactionManager, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let disk = DiskManager::new(temp_dir.path().join("bench.wal")).unwrap();
    let stats = Arc::new(Stats::default());
    let log_manager = Arc::new(LogManager::new(disk, true, Arc::clone(&stats)));
    let lock_manager = Arc::new(LockManager::new(Duration::from_millis(100), Arc::clone(&stats)));
    (TransactionManager::new(lock_manager, log_manager, stats), temp_dir)
}

fn bench_begin_commit(c: &mut Criterion) {
    let (manager, _temp) = create_manager();

    c.bench_function("begin_commit", |b| {
        b.iter(|| {
            let txn = manager.begin().unwrap();
            manager.commit(&txn).ok();
            black_box(txn.id);
        });
    });
}

fn bench_begin_with_isolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("begin_with_isolation");

    let levels = [
        IsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable,
    ];

    for level in levels {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{level:?}")),
            &level,
            |b, &level| {
                let (manager, _temp) = create_manager();
                b.iter(|| {
                    let txn = manager.begin_with_isolation(level).unwrap();
                    black_box(txn.id);
                    manager.commit(&txn).ok();
                });
            },
        );
    }

    group.finish();
}

fn bench_lock_acquire_release(c: &mut Criterion) {
    let (manager, _temp) = create_manager();
    let lock_manager = Arc::clone(manager.lock_manager());

    c.bench_function("lock_shared_then_unlock", |b| {
        b.iter(|| {
            let txn = manager.begin().unwrap();
            let rid = RecordId::new(0, black_box(0));
            lock_manager.lock_shared(&txn, rid).ok();
            lock_manager.unlock(&txn, rid);
            manager.commit(&txn).ok();
        });
    });
}

fn bench_concurrent_transactions(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_transactions");

    for num_threads in [1usize, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            &num_threads,
            |b, &num_threads| {
                let temp_dir = TempDir::new().unwrap();
                let disk = DiskManager::new(temp_dir.path().join("bench.wal")).unwrap();
                let stats = Arc::new(Stats::default());
                let log_manager = Arc::new(LogManager::new(disk, true, Arc::clone(&stats)));
                let lock_manager = Arc::new(LockManager::new(Duration::from_millis(100), Arc::clone(&stats)));
                let manager = Arc::new(TransactionManager::new(lock_manager, log_manager, stats));

                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let mgr = Arc::clone(&manager);
                            std::thread::spawn(move || {
                                for _ in 0..10 {
                                    if let Ok(txn) = mgr.begin() {
                                        mgr.commit(&txn).ok();
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

fn bench_lock_contention_single_resource(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let disk = DiskManager::new(temp_dir.path().join("bench.wal")).unwrap();
    let stats = Arc::new(Stats::default());
    let log_manager = Arc::new(LogManager::new(disk, true, Arc::clone(&stats)));
    let lock_manager = Arc::new(LockManager::new(Duration::from_millis(50), Arc::clone(&stats)));
    let manager = Arc::new(TransactionManager::new(
        Arc::clone(&lock_manager),
        log_manager,
        stats,
    ));
    let hotspot = RecordId::new(0, 0);

    c.bench_function("lock_contention_single_resource", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let mgr = Arc::clone(&manager);
                    let lm = Arc::clone(&lock_manager);
                    std::thread::spawn(move || {
                        for _ in 0..10 {
                            if let Ok(txn) = mgr.begin() {
                                lm.lock_exclusive(&txn, hotspot).ok();
                                lm.unlock(&txn, hotspot);
                                mgr.commit(&txn).ok();
                            }
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().ok();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_begin_commit,
    bench_begin_with_isolation,
    bench_lock_acquire_release,
    bench_concurrent_transactions,
    bench_lock_contention_single_resource
);
criterion_main!(benches);
