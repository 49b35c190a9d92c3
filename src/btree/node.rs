//! # Tree Node Pages
//!
//! One B+Tree node per page. Nodes address the whole 4096-byte block
//! directly (no formatted header/data split):
//!
//! ```text
//! Offset  Size  Field      Description
//! ------  ----  ---------  ----------------------------------------
//! 0       4     -          reserved
//! 4       4     kind       0 = inner, 1 = leaf (explicit tags)
//! 8       4     key type   0 = i32, 1 = f64 (explicit tags)
//! 12      4     key size   4 or 8, matching the key type
//! 16      4     len        number of keys
//! 20      4     next leaf  leaf chain successor, NULL_PAGE otherwise
//! 24      4     parent     NULL_PAGE at the root
//! 28      ...   arrays     keys, then children, then overflow heads
//! ```
//!
//! The data region holds three parallel arrays sized by
//! `capacity = (4096 - 28) / (key_size + 8 + 4)`: fixed-width keys, 8-byte
//! child entries (`[page u32][slot u32]`; inner nodes use only the page
//! half), and 4-byte overflow-head page IDs. Inner nodes never touch the
//! overflow region; it stays zeroed on disk and reads back as nil heads.
//!
//! A [`Node`] is an owned copy of its page. Mutations happen in memory and
//! reach the store through an explicit [`Node::save`]; a node may exceed
//! `capacity` while a split is in flight, but saving one is a bug — the
//! on-disk arrays have room for exactly `capacity` entries.
//!
//! Leaf entries are multisets: the child slot holds the primary value for a
//! key and every further duplicate lives in the overflow chain hanging off
//! that rank (see the `overflow` module).

use std::cmp::Ordering;

use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::btree::key::{Key, KeyType};
use crate::btree::overflow::OverflowPage;
use crate::error::{Error, Result};
use crate::storage::{BlockStore, PageId, RowId, NULL_PAGE, PAGE_SIZE};

/// Bytes before the key array.
pub const NODE_HEADER_SIZE: usize = 28;

/// Encoded width of one child entry.
const CHILD_SIZE: usize = 8;

/// Encoded width of one overflow-head entry.
const HEAD_SIZE: usize = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct NodeHeader {
    reserved: [u8; 4],
    kind: U32,
    key_type: U32,
    key_size: U32,
    len: U32,
    next_leaf: U32,
    parent: U32,
}

const _: () = assert!(std::mem::size_of::<NodeHeader>() == NODE_HEADER_SIZE);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Inner,
    Leaf,
}

impl NodeKind {
    /// The persisted kind tag.
    pub fn tag(self) -> u32 {
        match self {
            NodeKind::Inner => 0,
            NodeKind::Leaf => 1,
        }
    }
}

/// A run of node entries in transit between two nodes during a split or
/// merge. Keys, children, and overflow heads move together.
pub struct Entries {
    keys: Vec<Key>,
    children: Vec<RowId>,
    heads: Vec<PageId>,
}

impl Entries {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// One B+Tree node, loaded into memory. See the module docs for the page
/// layout.
#[derive(Debug)]
pub struct Node {
    id: PageId,
    kind: NodeKind,
    key_type: KeyType,
    capacity: usize,
    next_leaf: PageId,
    parent: PageId,
    keys: Vec<Key>,
    children: Vec<RowId>,
    heads: Vec<PageId>,
    dirty: bool,
}

/// Keys a node of the given key type can hold before it must split.
pub fn capacity_for(key_type: KeyType) -> usize {
    (PAGE_SIZE - NODE_HEADER_SIZE) / (key_type.key_size() + CHILD_SIZE + HEAD_SIZE)
}

impl Node {
    /// Claim a fresh, empty node page.
    pub fn new(store: &mut BlockStore, key_type: KeyType, kind: NodeKind) -> Result<Self> {
        Ok(Self {
            id: store.allocate()?,
            kind,
            key_type,
            capacity: capacity_for(key_type),
            next_leaf: NULL_PAGE,
            parent: NULL_PAGE,
            keys: Vec::new(),
            children: Vec::new(),
            heads: Vec::new(),
            dirty: true,
        })
    }

    pub fn open(store: &BlockStore, id: PageId) -> Result<Self> {
        let mut buf = [0u8; PAGE_SIZE];
        store.read(id, &mut buf, 0)?;

        let header = NodeHeader::ref_from_bytes(&buf[..NODE_HEADER_SIZE])
            .map_err(|e| Error::Corrupt(format!("node header on page {id}: {e:?}")))?;
        let kind = match header.kind.get() {
            0 => NodeKind::Inner,
            1 => NodeKind::Leaf,
            other => {
                return Err(Error::Corrupt(format!(
                    "node page {id} carries unknown kind tag {other}"
                )))
            }
        };
        let key_type = KeyType::from_tag(header.key_type.get())?;
        let key_size = key_type.key_size();
        if header.key_size.get() as usize != key_size {
            return Err(Error::Corrupt(format!(
                "node page {id} declares key size {} for {key_type:?} keys",
                header.key_size.get()
            )));
        }
        let capacity = capacity_for(key_type);
        let len = header.len.get() as usize;
        if len > capacity {
            return Err(Error::Corrupt(format!(
                "node page {id} claims {len} keys, capacity is {capacity}"
            )));
        }

        let children_at = NODE_HEADER_SIZE + capacity * key_size;
        let heads_at = children_at + capacity * CHILD_SIZE;
        let mut keys = Vec::with_capacity(len);
        let mut children = Vec::with_capacity(len);
        let mut heads = Vec::with_capacity(len);
        for i in 0..len {
            let key_off = NODE_HEADER_SIZE + i * key_size;
            keys.push(Key::decode(key_type, &buf[key_off..key_off + key_size]));

            let child_off = children_at + i * CHILD_SIZE;
            match kind {
                NodeKind::Leaf => {
                    children.push(RowId::read_from(&buf[child_off..child_off + CHILD_SIZE]));
                    let head_off = heads_at + i * HEAD_SIZE;
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(&buf[head_off..head_off + HEAD_SIZE]);
                    heads.push(PageId::from_le_bytes(raw));
                }
                NodeKind::Inner => {
                    // The slot half of an inner child entry is meaningless.
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(&buf[child_off..child_off + 4]);
                    children.push(RowId::new(PageId::from_le_bytes(raw), 0));
                    heads.push(NULL_PAGE);
                }
            }
        }

        Ok(Self {
            id,
            kind,
            key_type,
            capacity,
            next_leaf: header.next_leaf.get(),
            parent: header.parent.get(),
            keys,
            children,
            heads,
            dirty: false,
        })
    }

    /// Write the node back if it was mutated.
    pub fn save(&self, store: &mut BlockStore) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        assert!(
            self.keys.len() <= self.capacity,
            "node {} holds {} keys, over its capacity {}; split before saving",
            self.id,
            self.keys.len(),
            self.capacity
        );

        let mut buf = [0u8; PAGE_SIZE];
        let header = NodeHeader {
            reserved: [0u8; 4],
            kind: U32::new(self.kind.tag()),
            key_type: U32::new(self.key_type.tag()),
            key_size: U32::new(self.key_type.key_size() as u32),
            len: U32::new(self.keys.len() as u32),
            next_leaf: U32::new(self.next_leaf),
            parent: U32::new(self.parent),
        };
        buf[..NODE_HEADER_SIZE].copy_from_slice(header.as_bytes());

        let key_size = self.key_type.key_size();
        let children_at = NODE_HEADER_SIZE + self.capacity * key_size;
        let heads_at = children_at + self.capacity * CHILD_SIZE;
        for (i, key) in self.keys.iter().enumerate() {
            let key_off = NODE_HEADER_SIZE + i * key_size;
            key.encode_into(&mut buf[key_off..key_off + key_size]);
        }
        for (i, child) in self.children.iter().enumerate() {
            let child_off = children_at + i * CHILD_SIZE;
            match self.kind {
                NodeKind::Leaf => child.write_to(&mut buf[child_off..child_off + CHILD_SIZE]),
                // Inner entries persist only the page half; the slot half
                // stays zero.
                NodeKind::Inner => {
                    buf[child_off..child_off + 4].copy_from_slice(&child.page.to_le_bytes())
                }
            }
        }
        if self.kind == NodeKind::Leaf {
            for (i, head) in self.heads.iter().enumerate() {
                let head_off = heads_at + i * HEAD_SIZE;
                buf[head_off..head_off + HEAD_SIZE].copy_from_slice(&head.to_le_bytes());
            }
        }

        store.write(self.id, &buf, 0)
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Minimum key count a non-root node must keep.
    pub fn min_keys(&self) -> usize {
        (self.capacity + 1) / 2
    }

    pub fn needs_split(&self) -> bool {
        self.keys.len() > self.capacity
    }

    pub fn needs_merge(&self) -> bool {
        self.keys.len() < self.min_keys()
    }

    /// Whether a sibling may take an entry without pushing this node under
    /// its minimum.
    pub fn can_lend(&self) -> bool {
        self.keys.len() > self.min_keys()
    }

    pub fn next_leaf_id(&self) -> PageId {
        assert!(self.is_leaf(), "node {} is not a leaf", self.id);
        self.next_leaf
    }

    pub fn set_next_leaf_id(&mut self, id: PageId) {
        assert!(self.is_leaf(), "node {} is not a leaf", self.id);
        self.next_leaf = id;
        self.dirty = true;
    }

    pub fn parent_id(&self) -> PageId {
        self.parent
    }

    pub fn set_parent_id(&mut self, id: PageId) {
        self.parent = id;
        self.dirty = true;
    }

    pub fn key(&self, rank: usize) -> Key {
        self.keys[rank]
    }

    pub fn set_key(&mut self, rank: usize, key: Key) {
        self.keys[rank] = key;
        self.dirty = true;
    }

    /// Page of the `rank`-th subtree. Inner nodes only.
    pub fn child_page(&self, rank: usize) -> PageId {
        assert!(!self.is_leaf(), "node {} is not an inner node", self.id);
        self.children[rank].page
    }

    /// Primary value stored for the `rank`-th key. Leaves only.
    pub fn value(&self, rank: usize) -> RowId {
        assert!(self.is_leaf(), "node {} is not a leaf", self.id);
        self.children[rank]
    }

    /// Head of the overflow chain for the `rank`-th key, `NULL_PAGE` when
    /// the key has a single value. Leaves only.
    pub fn overflow_head(&self, rank: usize) -> PageId {
        assert!(self.is_leaf(), "node {} is not a leaf", self.id);
        self.heads[rank]
    }

    /// Rank of the child entry pointing at `id`. Inner nodes only.
    pub fn position_of_child(&self, id: PageId) -> Option<usize> {
        assert!(!self.is_leaf(), "node {} is not an inner node", self.id);
        self.children.iter().position(|child| child.page == id)
    }

    // --- binary search over the sorted key array ---

    /// First rank whose key is `>= key`; `len` when every key is smaller.
    pub fn lower_bound(&self, key: Key) -> usize {
        self.keys
            .partition_point(|k| k.cmp_same(key) == Ordering::Less)
    }

    /// First rank whose key is `> key`; `len` when no key is greater.
    pub fn upper_bound(&self, key: Key) -> usize {
        self.keys
            .partition_point(|k| k.cmp_same(key) != Ordering::Greater)
    }

    /// Largest rank whose key is `<= key`, `None` when the node is empty or
    /// every key is greater.
    pub fn le_bound(&self, key: Key) -> Option<usize> {
        self.upper_bound(key).checked_sub(1)
    }

    /// Largest rank whose key is `< key`, `None` when the node is empty or
    /// every key is at least `key`.
    pub fn lt_bound(&self, key: Key) -> Option<usize> {
        self.lower_bound(key).checked_sub(1)
    }

    // --- entry-level mutation shared by splits and merges ---

    /// Insert an entry at `rank`, shifting the tail right.
    pub fn insert_at(&mut self, rank: usize, key: Key, child: RowId, head: PageId) {
        assert!(rank <= self.keys.len(), "rank {rank} past the end");
        self.keys.insert(rank, key);
        self.children.insert(rank, child);
        self.heads.insert(rank, head);
        self.dirty = true;
    }

    /// Remove the entry at `rank` and return it.
    pub fn remove_at(&mut self, rank: usize) -> (Key, RowId, PageId) {
        assert!(rank < self.keys.len(), "rank {rank} past the end");
        self.dirty = true;
        (
            self.keys.remove(rank),
            self.children.remove(rank),
            self.heads.remove(rank),
        )
    }

    /// Detach every entry from `at` onward.
    pub fn split_tail(&mut self, at: usize) -> Entries {
        assert!(at <= self.keys.len(), "rank {at} past the end");
        self.dirty = true;
        Entries {
            keys: self.keys.split_off(at),
            children: self.children.split_off(at),
            heads: self.heads.split_off(at),
        }
    }

    /// Append entries detached from another node of the same kind.
    pub fn append(&mut self, tail: Entries) {
        self.keys.extend(tail.keys);
        self.children.extend(tail.children);
        self.heads.extend(tail.heads);
        self.dirty = true;
    }

    // --- leaf multiset operations ---

    /// Insert one value for `key`. A new key enters at its sorted rank with
    /// a nil overflow head; a duplicate routes into the key's overflow
    /// chain, appending to the first non-full page or linking a fresh tail.
    pub fn insert_in_leaf(&mut self, store: &mut BlockStore, key: Key, value: RowId) -> Result<()> {
        assert!(self.is_leaf(), "node {} is not a leaf", self.id);
        let rank = self.lower_bound(key);
        if rank == self.keys.len() || self.keys[rank].cmp_same(key) != Ordering::Equal {
            self.insert_at(rank, key, value, NULL_PAGE);
            return Ok(());
        }

        let mut current = self.heads[rank];
        let mut last = None;
        while current != NULL_PAGE {
            let mut page = OverflowPage::open(store, current)?;
            if page.insert(value) {
                return page.save(store);
            }
            last = Some(current);
            current = page.next_id();
        }

        // Every chain page is full (or there is no chain yet): grow a tail.
        let mut tail = OverflowPage::new(store)?;
        tail.insert(value);
        tail.save(store)?;
        match last {
            Some(prev_id) => {
                let mut prev = OverflowPage::open(store, prev_id)?;
                prev.set_next_id(tail.id());
                prev.save(store)?;
            }
            None => {
                self.heads[rank] = tail.id();
                self.dirty = true;
            }
        }
        Ok(())
    }

    /// Remove the `rank`-th key with its whole overflow chain, freeing
    /// every chain page. Returns the number of values removed.
    pub fn delete_all_in_leaf(&mut self, store: &mut BlockStore, rank: usize) -> Result<usize> {
        assert!(self.is_leaf(), "node {} is not a leaf", self.id);
        assert!(rank < self.keys.len(), "rank {rank} past the end");
        let mut removed = 1;
        let mut current = self.heads[rank];
        while current != NULL_PAGE {
            let page = OverflowPage::open(store, current)?;
            removed += page.len();
            let next = page.next_id();
            store.free(current)?;
            current = next;
        }
        self.remove_at(rank);
        Ok(removed)
    }

    /// Remove one specific value from the `rank`-th key. Deleting the
    /// primary value promotes a value popped from the first non-empty chain
    /// page into the primary slot; with nothing left to promote the key
    /// goes away entirely. Chain pages emptied here stay linked — only
    /// [`Node::delete_all_in_leaf`] reclaims them.
    pub fn delete_in_leaf(
        &mut self,
        store: &mut BlockStore,
        rank: usize,
        value: RowId,
    ) -> Result<bool> {
        assert!(self.is_leaf(), "node {} is not a leaf", self.id);
        assert!(rank < self.keys.len(), "rank {rank} past the end");

        if self.children[rank] == value {
            let mut current = self.heads[rank];
            while current != NULL_PAGE {
                let mut page = OverflowPage::open(store, current)?;
                if let Some(promoted) = page.pop_back() {
                    page.save(store)?;
                    self.children[rank] = promoted;
                    self.dirty = true;
                    return Ok(true);
                }
                current = page.next_id();
            }
            self.delete_all_in_leaf(store, rank)?;
            return Ok(true);
        }

        let mut current = self.heads[rank];
        while current != NULL_PAGE {
            let mut page = OverflowPage::open(store, current)?;
            if page.delete(value) {
                page.save(store)?;
                return Ok(true);
            }
            current = page.next_id();
        }
        Ok(false)
    }

    /// Replace one value for `key` in place, in the primary slot or inside
    /// the chain. Returns false when `key` or `old` is absent.
    pub fn update_in_leaf(
        &mut self,
        store: &mut BlockStore,
        key: Key,
        old: RowId,
        new: RowId,
    ) -> Result<bool> {
        assert!(self.is_leaf(), "node {} is not a leaf", self.id);
        let rank = self.lower_bound(key);
        if rank == self.keys.len() || self.keys[rank].cmp_same(key) != Ordering::Equal {
            return Ok(false);
        }
        if self.children[rank] == old {
            self.children[rank] = new;
            self.dirty = true;
            return Ok(true);
        }
        let mut current = self.heads[rank];
        while current != NULL_PAGE {
            let mut page = OverflowPage::open(store, current)?;
            if page.update(old, new) {
                page.save(store)?;
                return Ok(true);
            }
            current = page.next_id();
        }
        Ok(false)
    }

    /// Every value stored for the `rank`-th key: the primary value followed
    /// by the chain contents in chain order.
    pub fn collect_values(&self, store: &BlockStore, rank: usize) -> Result<Vec<RowId>> {
        assert!(self.is_leaf(), "node {} is not a leaf", self.id);
        assert!(rank < self.keys.len(), "rank {rank} past the end");
        let mut values = vec![self.children[rank]];
        let mut current = self.heads[rank];
        while current != NULL_PAGE {
            let page = OverflowPage::open(store, current)?;
            values.extend_from_slice(page.values());
            current = page.next_id();
        }
        Ok(values)
    }
}
