//! B+Tree index benchmarks: insert throughput in sequential and shuffled
//! key order, range scans over the leaf chain, and delete-heavy churn that
//! keeps the rebalancing paths hot.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use loamdb::storage::StoreOptions;
use loamdb::{BPlusTree, BlockStore, Key, KeyType, RowId};
use tempfile::tempdir;

fn rid(n: u32) -> RowId {
    RowId::new(n, 0)
}

fn fresh_store(pool_pages: usize) -> (tempfile::TempDir, BlockStore) {
    let dir = tempdir().unwrap();
    let store = BlockStore::open_with(dir.path(), StoreOptions { pool_pages }).unwrap();
    (dir, store)
}

fn shuffled(count: usize) -> Vec<i32> {
    let mut keys: Vec<i32> = (0..count as i32).collect();
    for i in (1..keys.len()).rev() {
        let j = (i * 2_654_435_761) % (i + 1);
        keys.swap(i, j);
    }
    keys
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_insert");

    for count in [1_000usize, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("sequential", count), count, |b, &count| {
            b.iter_with_setup(
                || fresh_store(count / 100 + 64),
                |(dir, mut store)| {
                    let mut tree = BPlusTree::create(&mut store, KeyType::Int).unwrap();
                    for k in 0..count as i32 {
                        tree.insert(Key::Int(k), rid(k as u32)).unwrap();
                    }
                    (dir, store)
                },
            );
        });

        group.bench_with_input(BenchmarkId::new("shuffled", count), count, |b, &count| {
            b.iter_with_setup(
                || {
                    let (dir, store) = fresh_store(count / 100 + 64);
                    (dir, store, shuffled(count))
                },
                |(dir, mut store, keys)| {
                    let mut tree = BPlusTree::create(&mut store, KeyType::Int).unwrap();
                    for k in keys {
                        tree.insert(Key::Int(k), rid(k as u32)).unwrap();
                    }
                    (dir, store)
                },
            );
        });
    }

    group.finish();
}

fn bench_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_range");

    for count in [10_000usize].iter() {
        let (_dir, mut store) = fresh_store(count / 100 + 64);
        let mut tree = BPlusTree::create(&mut store, KeyType::Int).unwrap();
        for k in 0..*count as i32 {
            tree.insert(Key::Int(k), rid(k as u32)).unwrap();
        }
        let root = tree.root_id();
        drop(tree);

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("full_scan", count), count, |b, &count| {
            let tree = BPlusTree::open(&mut store, root).unwrap();
            b.iter(|| {
                let hits = tree
                    .range(black_box(Key::Int(0)), black_box(Key::Int(count as i32)))
                    .unwrap();
                black_box(hits.len())
            });
        });

        group.throughput(Throughput::Elements(100));
        group.bench_function(BenchmarkId::new("narrow_window", count), |b| {
            let tree = BPlusTree::open(&mut store, root).unwrap();
            b.iter(|| {
                let hits = tree
                    .range(black_box(Key::Int(4_950)), black_box(Key::Int(5_050)))
                    .unwrap();
                black_box(hits.len())
            });
        });
    }

    group.finish();
}

fn bench_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_delete");

    for count in [1_000usize].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("drain", count), count, |b, &count| {
            b.iter_with_setup(
                || {
                    let (dir, mut store) = fresh_store(count / 100 + 64);
                    let root = {
                        let mut tree = BPlusTree::create(&mut store, KeyType::Int).unwrap();
                        for k in 0..count as i32 {
                            tree.insert(Key::Int(k), rid(k as u32)).unwrap();
                        }
                        tree.root_id()
                    };
                    (dir, store, root)
                },
                |(dir, mut store, root)| {
                    let mut tree = BPlusTree::open(&mut store, root).unwrap();
                    for k in 0..count as i32 {
                        tree.delete_key(Key::Int(k)).unwrap();
                    }
                    (dir, store)
                },
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_range, bench_delete);
criterion_main!(benches);
