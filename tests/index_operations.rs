//! End-to-end index behaviour: multiset semantics, duplicate routing, and
//! the point operations, driven through the public crate surface only.

use loamdb::storage::StoreOptions;
use loamdb::{BPlusTree, BlockStore, Key, KeyType, RowId};
use tempfile::tempdir;

fn rid(page: u32, slot: u32) -> RowId {
    RowId::new(page, slot)
}

fn open_store(dir: &std::path::Path, pool_pages: usize) -> BlockStore {
    BlockStore::open_with(dir, StoreOptions { pool_pages }).unwrap()
}

#[test]
fn range_returns_the_inserted_multiset_regardless_of_order() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path(), 2048);
    let mut tree = BPlusTree::create(&mut store, KeyType::Int).unwrap();

    // Insert in a deliberately scrambled order, with duplicates.
    let pairs: Vec<(i32, RowId)> = (0..900)
        .map(|i| ((i * 37) % 300, rid(i as u32, 0)))
        .collect();
    for &(key, value) in &pairs {
        tree.insert(Key::Int(key), value).unwrap();
    }

    let mut got = tree.range(Key::Int(50), Key::Int(250)).unwrap();
    let mut expected: Vec<RowId> = pairs
        .iter()
        .filter(|(k, _)| (50..250).contains(k))
        .map(|&(_, v)| v)
        .collect();
    got.sort_by_key(|r| r.page);
    expected.sort_by_key(|r| r.page);
    assert_eq!(got, expected);

    // The half-open bound excludes the high key.
    let at_edge = tree.range(Key::Int(249), Key::Int(250)).unwrap();
    assert!(!at_edge.is_empty());
    assert!(tree.range(Key::Int(300), Key::Int(400)).unwrap().is_empty());
}

#[test]
fn one_duplicate_grows_a_chain_of_length_one() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path(), 32);
    let mut tree = BPlusTree::create(&mut store, KeyType::Int).unwrap();
    let before = store.used_pages();

    tree.insert(Key::Int(9), rid(1, 1)).unwrap();
    tree.insert(Key::Int(9), rid(2, 2)).unwrap();

    // The duplicate claimed exactly one overflow page; the key occupies a
    // single leaf slot and the range sees both values.
    assert_eq!(store.used_pages(), before + 1);
    assert_eq!(
        tree.range(Key::Int(9), Key::Int(10)).unwrap(),
        vec![rid(1, 1), rid(2, 2)]
    );
}

#[test]
fn delete_key_reports_the_value_count_and_excludes_the_key() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path(), 64);
    let mut tree = BPlusTree::create(&mut store, KeyType::Int).unwrap();

    for slot in 0..5 {
        tree.insert(Key::Int(77), rid(0, slot)).unwrap();
    }
    tree.insert(Key::Int(76), rid(9, 9)).unwrap();
    tree.insert(Key::Int(78), rid(8, 8)).unwrap();

    assert_eq!(tree.delete_key(Key::Int(77)).unwrap(), 5);
    assert_eq!(
        tree.range(Key::Int(70), Key::Int(80)).unwrap(),
        vec![rid(9, 9), rid(8, 8)]
    );
    assert_eq!(tree.delete_key(Key::Int(77)).unwrap(), 0);
}

#[test]
fn delete_entry_promotes_a_chain_value_into_the_primary_slot() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path(), 32);
    let mut tree = BPlusTree::create(&mut store, KeyType::Int).unwrap();

    tree.insert(Key::Int(4), rid(1, 0)).unwrap();
    tree.insert(Key::Int(4), rid(2, 0)).unwrap();
    tree.insert(Key::Int(4), rid(3, 0)).unwrap();

    // Removing the primary value keeps the other two reachable.
    assert!(tree.delete_entry(Key::Int(4), rid(1, 0)).unwrap());
    let mut left = tree.range(Key::Int(4), Key::Int(5)).unwrap();
    left.sort_by_key(|r| r.page);
    assert_eq!(left, vec![rid(2, 0), rid(3, 0)]);

    // Removing a chain value leaves the primary untouched.
    assert!(tree.delete_entry(Key::Int(4), rid(2, 0)).unwrap());
    assert_eq!(tree.range(Key::Int(4), Key::Int(5)).unwrap(), vec![rid(3, 0)]);

    assert!(!tree.delete_entry(Key::Int(4), rid(2, 0)).unwrap());
}

#[test]
fn update_moves_a_row_locator_without_disturbing_neighbours() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path(), 32);
    let mut tree = BPlusTree::create(&mut store, KeyType::Int).unwrap();

    for k in 1..=3 {
        tree.insert(Key::Int(k), rid(k as u32, 0)).unwrap();
    }

    assert!(tree.update(Key::Int(2), rid(2, 0), rid(20, 5)).unwrap());
    assert_eq!(
        tree.range(Key::Int(1), Key::Int(4)).unwrap(),
        vec![rid(1, 0), rid(20, 5), rid(3, 0)]
    );
}

#[test]
fn float_index_orders_and_ranges_like_the_int_one() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path(), 64);
    let mut tree = BPlusTree::create(&mut store, KeyType::Float).unwrap();

    for (i, k) in [2.5, -1.0, 0.25, 10.0, -3.5].into_iter().enumerate() {
        tree.insert(Key::Float(k), rid(i as u32, 0)).unwrap();
    }

    assert_eq!(
        tree.range(Key::Float(-2.0), Key::Float(3.0)).unwrap(),
        vec![rid(1, 0), rid(2, 0), rid(0, 0)]
    );
    assert_eq!(tree.delete_key(Key::Float(-3.5)).unwrap(), 1);
    assert!(tree.update(Key::Float(10.0), rid(3, 0), rid(30, 0)).unwrap());
}

#[test]
fn a_same_tree_reopens_through_its_root_id() {
    let dir = tempdir().unwrap();
    let mut store = open_store(dir.path(), 64);

    let root = {
        let mut tree = BPlusTree::create(&mut store, KeyType::Int).unwrap();
        tree.insert(Key::Int(1), rid(1, 0)).unwrap();
        tree.insert(Key::Int(2), rid(2, 0)).unwrap();
        tree.root_id()
    };

    let tree = BPlusTree::open(&mut store, root).unwrap();
    assert_eq!(tree.key_type(), KeyType::Int);
    assert_eq!(
        tree.range(Key::Int(0), Key::Int(5)).unwrap(),
        vec![rid(1, 0), rid(2, 0)]
    );
}
