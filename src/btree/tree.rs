//! # B+Tree Index Controller
//!
//! [`BPlusTree`] owns no pages. It borrows the [`BlockStore`] for its whole
//! lifetime and remembers only the root page ID and the key type; every
//! operation reacquires the nodes it touches by ID, mutates them in memory,
//! and writes them back before returning. No node handle survives across an
//! operation boundary.
//!
//! ## Shape of the tree
//!
//! ```text
//!                [Inner: 10 | 40 | 70]
//!                /         |         \
//!     [Leaf: 10..39]  [Leaf: 40..69]  [Leaf: 70..]
//!          |--------------->|------------->|  (next-leaf chain)
//! ```
//!
//! Inner separators are inclusive lower bounds of their subtrees, not
//! guaranteed minima: inserting a key below every separator lowers the
//! leftmost separator along the descent path only. A separator can therefore
//! sit below its subtree's smallest key after later deletions; descents
//! still land on the right leaf because separators never sit above it.
//!
//! ## Rebalancing
//!
//! Splits and merges propagate iteratively, walking stored parent IDs. A
//! node over capacity gives the tail `[capacity/2 + 1, end)` of its entries
//! to a fresh right sibling and posts the sibling's first key into the
//! parent. A non-root node under `min_keys` first tries to borrow one entry
//! from the left sibling, then from the right, and merges with a sibling
//! (preferring left) when neither can lend. Roots are exempt from the
//! minimum; an inner root left with a single child hands the root role to
//! that child and is freed.

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::btree::key::{Key, KeyType};
use crate::btree::node::{Node, NodeKind};
use crate::btree::overflow::OverflowPage;
use crate::error::Result;
use crate::storage::{BlockStore, PageId, RowId, NULL_PAGE};

/// The index controller. The exclusive borrow of the store serializes all
/// access by construction; there is no locking anywhere beneath.
pub struct BPlusTree<'s> {
    store: &'s mut BlockStore,
    root: PageId,
    key_type: KeyType,
}

impl<'s> BPlusTree<'s> {
    /// Create a new empty index: one leaf page serving as the root.
    pub fn create(store: &'s mut BlockStore, key_type: KeyType) -> Result<Self> {
        let root = Node::new(store, key_type, NodeKind::Leaf)?;
        root.save(store)?;
        let root_id = root.id();
        debug!(root = root_id, ?key_type, "created index");
        Ok(Self {
            store,
            root: root_id,
            key_type,
        })
    }

    /// Open an existing index by its root page. The key type is read back
    /// from the root node header; an unknown tag fails with
    /// [`Error::UnsupportedKeyType`](crate::error::Error::UnsupportedKeyType).
    pub fn open(store: &'s mut BlockStore, root: PageId) -> Result<Self> {
        let node = Node::open(store, root)?;
        let key_type = node.key_type();
        debug!(root, ?key_type, "opened index");
        Ok(Self {
            store,
            root,
            key_type,
        })
    }

    /// The current root page. It changes when the root splits or the tree
    /// height collapses; the collaborator owning the index must re-persist
    /// whatever it reads here.
    pub fn root_id(&self) -> PageId {
        self.root
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Insert one `(key, value)` pair. Duplicate keys are allowed; each
    /// extra value for a key grows its leaf slot's overflow chain.
    pub fn insert(&mut self, key: Key, value: RowId) -> Result<()> {
        self.check_key(key);
        let mut node = Node::open(self.store, self.root)?;
        while !node.is_leaf() {
            let rank = match node.le_bound(key) {
                Some(rank) => rank,
                None => {
                    // Every separator exceeds the key: lower the leftmost
                    // one so it stays an inclusive bound for this subtree.
                    // An equal key takes the Some arm and never lands here.
                    node.set_key(0, key);
                    node.save(self.store)?;
                    0
                }
            };
            node = Node::open(self.store, node.child_page(rank))?;
        }
        node.insert_in_leaf(self.store, key, value)?;
        self.propagate_split(node)
    }

    /// Remove a key with every value stored for it. Returns the number of
    /// values removed, 0 when the key is absent.
    pub fn delete_key(&mut self, key: Key) -> Result<usize> {
        self.check_key(key);
        let mut leaf = self.leaf_for(key)?;
        let rank = leaf.lower_bound(key);
        if rank == leaf.len() || leaf.key(rank).cmp_same(key) != Ordering::Equal {
            return Ok(0);
        }
        let removed = leaf.delete_all_in_leaf(self.store, rank)?;
        self.propagate_merge(leaf)?;
        Ok(removed)
    }

    /// Remove exactly one value stored for a key. Returns whether the
    /// `(key, value)` pair existed.
    pub fn delete_entry(&mut self, key: Key, value: RowId) -> Result<bool> {
        self.check_key(key);
        let mut leaf = self.leaf_for(key)?;
        let rank = leaf.lower_bound(key);
        if rank == leaf.len() || leaf.key(rank).cmp_same(key) != Ordering::Equal {
            return Ok(false);
        }
        let removed = leaf.delete_in_leaf(self.store, rank, value)?;
        self.propagate_merge(leaf)?;
        Ok(removed)
    }

    /// Replace one value for a key in place. Occupancy is untouched, so no
    /// rebalancing can follow. Returns whether the `(key, old)` pair existed.
    pub fn update(&mut self, key: Key, old: RowId, new: RowId) -> Result<bool> {
        self.check_key(key);
        let mut leaf = self.leaf_for(key)?;
        let replaced = leaf.update_in_leaf(self.store, key, old, new)?;
        leaf.save(self.store)?;
        Ok(replaced)
    }

    /// Every value whose key falls in the half-open interval `[low, high)`,
    /// in ascending key order, walking the leaf chain front to back. Values
    /// for one key come out primary first, then in chain order.
    pub fn range(&self, low: Key, high: Key) -> Result<Vec<RowId>> {
        self.check_key(low);
        self.check_key(high);
        let mut values = Vec::new();
        if low.cmp_same(high) != Ordering::Less {
            return Ok(values);
        }

        let mut node = self.leaf_for(low)?;
        let mut rank = node.lower_bound(low);
        loop {
            while rank < node.len() {
                if node.key(rank).cmp_same(high) != Ordering::Less {
                    return Ok(values);
                }
                values.extend(node.collect_values(self.store, rank)?);
                rank += 1;
            }
            let next = node.next_leaf_id();
            if next == NULL_PAGE {
                return Ok(values);
            }
            node = Node::open(self.store, next)?;
            rank = 0;
        }
    }

    /// Free every page of the tree: each leaf's overflow chains, then the
    /// nodes, children before their parent, the root last. Consumes the
    /// controller; the root ID is dead afterwards.
    pub fn clear(self) -> Result<()> {
        let mut stack = vec![self.root];
        let mut nodes = Vec::new();
        while let Some(id) = stack.pop() {
            let node = Node::open(self.store, id)?;
            if node.is_leaf() {
                for rank in 0..node.len() {
                    let mut chain = node.overflow_head(rank);
                    while chain != NULL_PAGE {
                        let page = OverflowPage::open(self.store, chain)?;
                        let next = page.next_id();
                        self.store.free(chain)?;
                        chain = next;
                    }
                }
            } else {
                for rank in 0..node.len() {
                    stack.push(node.child_page(rank));
                }
            }
            nodes.push(id);
        }
        // The stack discipline lists every node before its descendants;
        // freeing in reverse order frees children before parents, the root
        // last.
        for id in nodes.into_iter().rev() {
            self.store.free(id)?;
        }
        debug!(root = self.root, "cleared index");
        Ok(())
    }

    /// Descend to the leaf owning `key` without touching separators.
    fn leaf_for(&self, key: Key) -> Result<Node> {
        let mut node = Node::open(self.store, self.root)?;
        while !node.is_leaf() {
            let rank = node.le_bound(key).unwrap_or(0);
            node = Node::open(self.store, node.child_page(rank))?;
        }
        Ok(node)
    }

    fn check_key(&self, key: Key) {
        assert!(
            key.key_type() == self.key_type,
            "index holds {:?} keys, got {key:?}",
            self.key_type
        );
    }

    /// Split every over-full node from `node` upward, allocating a new root
    /// when the old root itself splits. Saves every node it touches.
    fn propagate_split(&mut self, mut node: Node) -> Result<()> {
        while node.needs_split() {
            let mid = node.capacity() / 2;
            let moved = node.split_tail(mid + 1);
            let mut sibling = Node::new(self.store, self.key_type, node.kind())?;
            sibling.append(moved);

            if node.is_leaf() {
                sibling.set_next_leaf_id(node.next_leaf_id());
                node.set_next_leaf_id(sibling.id());
            } else {
                adopt_children(self.store, &sibling, 0)?;
            }

            let mut parent = if node.parent_id() == NULL_PAGE {
                let mut root = Node::new(self.store, self.key_type, NodeKind::Inner)?;
                root.insert_at(0, node.key(0), RowId::new(node.id(), 0), NULL_PAGE);
                trace!(
                    old_root = node.id(),
                    new_root = root.id(),
                    "root split, tree grows a level"
                );
                self.root = root.id();
                root
            } else {
                Node::open(self.store, node.parent_id())?
            };

            let separator = sibling.key(0);
            let rank = parent.lower_bound(separator);
            parent.insert_at(rank, separator, RowId::new(sibling.id(), 0), NULL_PAGE);
            node.set_parent_id(parent.id());
            sibling.set_parent_id(parent.id());

            trace!(
                node = node.id(),
                sibling = sibling.id(),
                parent = parent.id(),
                kept = node.len(),
                moved = sibling.len(),
                "split"
            );
            node.save(self.store)?;
            sibling.save(self.store)?;
            node = parent;
        }
        node.save(self.store)
    }

    /// Restore minimum occupancy from `node` upward: borrow from a sibling
    /// when one has surplus, merge otherwise, and let the underflow travel
    /// to the parent when a merge removes one of its entries. Saves every
    /// node it touches.
    fn propagate_merge(&mut self, mut node: Node) -> Result<()> {
        loop {
            if node.parent_id() == NULL_PAGE {
                return self.collapse_root(node);
            }
            if !node.needs_merge() {
                return node.save(self.store);
            }

            let mut parent = Node::open(self.store, node.parent_id())?;
            let rank = parent.position_of_child(node.id()).unwrap_or_else(|| {
                panic!(
                    "node {} claims parent {} which does not list it",
                    node.id(),
                    parent.id()
                )
            });

            if rank > 0 {
                let mut left = Node::open(self.store, parent.child_page(rank - 1))?;
                if left.can_lend() {
                    let (key, child, head) = left.remove_at(left.len() - 1);
                    node.insert_at(0, key, child, head);
                    if !node.is_leaf() {
                        reparent(self.store, child.page, node.id())?;
                    }
                    parent.set_key(rank, node.key(0));
                    trace!(node = node.id(), from = left.id(), "borrowed from left");
                    left.save(self.store)?;
                    node.save(self.store)?;
                    return parent.save(self.store);
                }
            }
            if rank + 1 < parent.len() {
                let mut right = Node::open(self.store, parent.child_page(rank + 1))?;
                if right.can_lend() {
                    let (key, child, head) = right.remove_at(0);
                    node.insert_at(node.len(), key, child, head);
                    if !node.is_leaf() {
                        reparent(self.store, child.page, node.id())?;
                    }
                    parent.set_key(rank + 1, right.key(0));
                    trace!(node = node.id(), from = right.id(), "borrowed from right");
                    right.save(self.store)?;
                    node.save(self.store)?;
                    return parent.save(self.store);
                }
            }

            // Neither sibling can lend: merge, preferring the left one. The
            // survivor is always the left node of the pair, so the leaf
            // chain splices by inheriting the consumed node's successor.
            if rank > 0 {
                let mut left = Node::open(self.store, parent.child_page(rank - 1))?;
                let absorbed_from = left.len();
                left.append(node.split_tail(0));
                if left.is_leaf() {
                    left.set_next_leaf_id(node.next_leaf_id());
                } else {
                    adopt_children(self.store, &left, absorbed_from)?;
                }
                parent.remove_at(rank);
                self.store.free(node.id())?;
                trace!(survivor = left.id(), consumed = node.id(), "merged left");
                left.save(self.store)?;
            } else if rank + 1 < parent.len() {
                let mut right = Node::open(self.store, parent.child_page(rank + 1))?;
                let absorbed_from = node.len();
                node.append(right.split_tail(0));
                if node.is_leaf() {
                    node.set_next_leaf_id(right.next_leaf_id());
                } else {
                    adopt_children(self.store, &node, absorbed_from)?;
                }
                parent.remove_at(rank + 1);
                self.store.free(right.id())?;
                trace!(survivor = node.id(), consumed = right.id(), "merged right");
                node.save(self.store)?;
            } else {
                // An only child has nobody to merge with; its underflow
                // resolves when the parent collapses or merges above.
                node.save(self.store)?;
            }
            node = parent;
        }
    }

    /// Root-level finish of a merge walk: an inner root with one remaining
    /// child hands the root role down and is freed. Leaf roots, and inner
    /// roots with two or more children, stay regardless of occupancy.
    fn collapse_root(&mut self, mut node: Node) -> Result<()> {
        debug_assert_eq!(node.id(), self.root, "merge walk surfaced off-root");
        while !node.is_leaf() && node.len() == 1 {
            let child_id = node.child_page(0);
            self.store.free(node.id())?;
            debug!(
                old_root = node.id(),
                new_root = child_id,
                "collapsed tree height"
            );
            node = Node::open(self.store, child_id)?;
            node.set_parent_id(NULL_PAGE);
            self.root = child_id;
        }
        node.save(self.store)
    }
}

/// Point `child`'s parent field at `parent`.
fn reparent(store: &mut BlockStore, child: PageId, parent: PageId) -> Result<()> {
    let mut node = Node::open(store, child)?;
    node.set_parent_id(parent);
    node.save(store)
}

/// Point the parent field of every child from rank `from` onward at `node`.
fn adopt_children(store: &mut BlockStore, node: &Node, from: usize) -> Result<()> {
    for rank in from..node.len() {
        reparent(store, node.child_page(rank), node.id())?;
    }
    Ok(())
}
