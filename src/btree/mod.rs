//! # B+Tree Secondary Index
//!
//! A duplicate-aware B+Tree over the block store. Keys are typed and
//! fixed-width ([`KeyType::Int`] or [`KeyType::Float`]); values are opaque
//! [`RowId`](crate::storage::RowId) locators the index stores and returns
//! without interpreting.
//!
//! ## Node layout
//!
//! Every node is one 4096-byte page: a 28-byte header (kind and key-type
//! tags, key count, next-leaf and parent IDs) followed by three parallel
//! arrays sized by `capacity = (4096 - 28) / (key_size + 12)` — sorted
//! keys, 8-byte child entries, and (leaves only) 4-byte overflow-chain
//! heads. Keys are unique per node; a key's duplicates hang off its leaf
//! slot as a singly-linked chain of [`OverflowPage`]s, 510 values each.
//!
//! ## Occupancy
//!
//! With `min_keys = (capacity + 1) / 2`:
//!
//! - over `capacity` keys: the node must split
//! - under `min_keys` keys (non-root): the node borrows from a sibling or
//!   merges with one
//! - over `min_keys` keys: the node can lend one entry to a sibling
//!
//! The controller ([`BPlusTree`]) runs both propagations iteratively by
//! following the parent ID stored in every node header.

pub mod key;
pub mod node;
pub mod overflow;
pub mod tree;

pub use key::{Key, KeyType};
pub use node::{Node, NodeKind};
pub use overflow::OverflowPage;
pub use tree::BPlusTree;
