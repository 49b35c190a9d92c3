//! # LoamDB - Teaching-Grade Single-File Storage Engine
//!
//! LoamDB is the storage core of a teaching database: a simulated block
//! device, a formatted-page framework over it, and a B+Tree secondary index
//! with duplicate-key overflow chains and full split/borrow/merge
//! rebalancing. Everything above it — SQL, the table layer, transactions —
//! is an external collaborator reaching in through two narrow interfaces:
//! the block store (allocate/free/read/write a 4096-byte page by ID) and
//! the index controller (insert/delete/update/range over typed keys).
//!
//! ## Quick Start
//!
//! ```no_run
//! use loamdb::{BPlusTree, BlockStore, Key, KeyType, RowId};
//!
//! # fn main() -> loamdb::Result<()> {
//! let mut store = BlockStore::open("./loam")?;
//! let mut index = BPlusTree::create(&mut store, KeyType::Int)?;
//!
//! index.insert(Key::Int(42), RowId::new(7, 3))?;
//! let hits = index.range(Key::Int(0), Key::Int(100))?;
//! assert_eq!(hits, vec![RowId::new(7, 3)]);
//!
//! let root = index.root_id(); // persist this to reopen the index
//! store.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │   B+Tree Index Controller (BPlusTree)    │
//! ├─────────────────────┬────────────────────┤
//! │  Tree Node Pages    │  Overflow Chains   │
//! ├─────────────────────┴────────────────────┤
//! │  Formatted / Linked / Record Pages       │
//! ├──────────────────────────────────────────┤
//! │  Block Store (bitmap + 4096-byte pool)   │
//! ├──────────────────────────────────────────┤
//! │  Flat artifacts: loam.bitmap loam.blocks │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Ground Rules
//!
//! - Pages are addressed only by integer ID, never by live pointer. Every
//!   operation reacquires the pages it needs and writes them back before
//!   returning; at most one mutable handle per page exists at a time.
//! - Single-threaded by contract. The exclusive `&mut BlockStore` borrow
//!   held by the index controller enforces it at compile time.
//! - Persistence is wholesale: the pool is loaded when a store opens and
//!   written back when it closes. There is no incremental flush and no
//!   crash consistency inside this core.
//!
//! ## Module Overview
//!
//! - [`storage`]: block pool, allocation bitmap, formatted/linked/record
//!   pages
//! - [`btree`]: typed keys, tree node and overflow pages, the index
//!   controller
//! - [`error`]: the crate-wide error taxonomy

pub mod btree;
pub mod error;
pub mod storage;

pub use btree::{BPlusTree, Key, KeyType};
pub use error::{Error, Result};
pub use storage::{BlockStore, PageId, RowId, SlotId, StoreOptions, NULL_PAGE, PAGE_SIZE};
