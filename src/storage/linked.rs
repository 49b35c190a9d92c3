//! # Linked Page Chain
//!
//! Doubly-linked lists of pages, threaded through two formatted-header
//! fields:
//!
//! ```text
//! header offset 4    nextID
//! header offset 8    prevID
//! ```
//!
//! `NULL_PAGE` marks a missing neighbor. Insertion and removal happen
//! relative to the current node: [`LinkedPage::push_back`] splices a node in
//! right after it, [`LinkedPage::pop_back`] splices the immediate successor
//! out and hands its ID back for the caller to free. The primitive never
//! deallocates storage itself.

use crate::error::Result;
use crate::storage::{BlockStore, Page, PageId, NULL_PAGE};

/// Header offset of the successor link.
pub const NEXT_OFFSET: usize = 4;

/// Header offset of the predecessor link.
pub const PREV_OFFSET: usize = 8;

pub struct LinkedPage {
    page: Page,
}

impl LinkedPage {
    /// Claim a fresh page with both links nil.
    pub fn new(store: &mut BlockStore) -> Result<Self> {
        let mut page = Page::alloc(store)?;
        page.set_header_u32(NEXT_OFFSET, NULL_PAGE)?;
        page.set_header_u32(PREV_OFFSET, NULL_PAGE)?;
        Ok(Self { page })
    }

    pub fn open(store: &BlockStore, id: PageId) -> Result<Self> {
        Ok(Self {
            page: Page::open(store, id)?,
        })
    }

    pub fn id(&self) -> PageId {
        self.page.id()
    }

    pub fn next_id(&self) -> Result<PageId> {
        self.page.header_u32(NEXT_OFFSET)
    }

    pub fn prev_id(&self) -> Result<PageId> {
        self.page.header_u32(PREV_OFFSET)
    }

    pub fn set_next_id(&mut self, id: PageId) -> Result<()> {
        self.page.set_header_u32(NEXT_OFFSET, id)
    }

    pub fn set_prev_id(&mut self, id: PageId) -> Result<()> {
        self.page.set_header_u32(PREV_OFFSET, id)
    }

    /// Insert `node` immediately after this page.
    ///
    /// The old successor (if any) is relinked behind `node`. Both pages are
    /// mutated in memory; the caller releases them.
    pub fn push_back(&mut self, store: &mut BlockStore, node: &mut LinkedPage) -> Result<()> {
        let old_next = self.next_id()?;
        if old_next != NULL_PAGE {
            let mut successor = LinkedPage::open(store, old_next)?;
            successor.set_prev_id(node.id())?;
            successor.release(store)?;
        }
        node.set_next_id(old_next)?;
        node.set_prev_id(self.id())?;
        self.set_next_id(node.id())
    }

    /// Splice out this page's immediate successor and return its ID, or
    /// `None` at the end of the chain. The spliced page is left allocated;
    /// freeing it is the caller's decision.
    pub fn pop_back(&mut self, store: &mut BlockStore) -> Result<Option<PageId>> {
        let victim = self.next_id()?;
        if victim == NULL_PAGE {
            return Ok(None);
        }

        let new_next = LinkedPage::open(store, victim)?.next_id()?;
        if new_next != NULL_PAGE {
            let mut after = LinkedPage::open(store, new_next)?;
            after.set_prev_id(self.id())?;
            after.release(store)?;
        }
        self.set_next_id(new_next)?;
        Ok(Some(victim))
    }

    pub fn release(self, store: &mut BlockStore) -> Result<()> {
        self.page.release(store)
    }

    pub(crate) fn page(&self) -> &Page {
        &self.page
    }

    pub(crate) fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreOptions;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, BlockStore) {
        let dir = tempdir().unwrap();
        let store = BlockStore::open_with(dir.path(), StoreOptions { pool_pages: 16 }).unwrap();
        (dir, store)
    }

    #[test]
    fn fresh_nodes_have_nil_links() {
        let (_dir, mut store) = store();

        let node = LinkedPage::new(&mut store).unwrap();

        assert_eq!(node.next_id().unwrap(), NULL_PAGE);
        assert_eq!(node.prev_id().unwrap(), NULL_PAGE);
    }

    #[test]
    fn push_back_inserts_after_the_current_node() {
        let (_dir, mut store) = store();
        let mut a = LinkedPage::new(&mut store).unwrap();
        let mut b = LinkedPage::new(&mut store).unwrap();
        let mut c = LinkedPage::new(&mut store).unwrap();
        let (ai, bi, ci) = (a.id(), b.id(), c.id());

        a.push_back(&mut store, &mut b).unwrap();
        b.release(&mut store).unwrap();
        // Inserting after `a` again lands between a and b: a -> c -> b.
        a.push_back(&mut store, &mut c).unwrap();
        c.release(&mut store).unwrap();
        a.release(&mut store).unwrap();

        let a = LinkedPage::open(&store, ai).unwrap();
        let b = LinkedPage::open(&store, bi).unwrap();
        let c = LinkedPage::open(&store, ci).unwrap();
        assert_eq!(a.next_id().unwrap(), ci);
        assert_eq!(c.prev_id().unwrap(), ai);
        assert_eq!(c.next_id().unwrap(), bi);
        assert_eq!(b.prev_id().unwrap(), ci);
        assert_eq!(b.next_id().unwrap(), NULL_PAGE);
    }

    #[test]
    fn pop_back_returns_the_successor_for_the_caller_to_free() {
        let (_dir, mut store) = store();
        let mut a = LinkedPage::new(&mut store).unwrap();
        let mut b = LinkedPage::new(&mut store).unwrap();
        let mut c = LinkedPage::new(&mut store).unwrap();
        let (ai, bi, ci) = (a.id(), b.id(), c.id());

        a.push_back(&mut store, &mut c).unwrap();
        c.release(&mut store).unwrap();
        a.push_back(&mut store, &mut b).unwrap();
        b.release(&mut store).unwrap();
        // Chain: a -> b -> c.

        let spliced = a.pop_back(&mut store).unwrap();
        assert_eq!(spliced, Some(bi));
        assert!(store.is_allocated(bi));
        store.free(bi).unwrap();
        a.release(&mut store).unwrap();

        let a = LinkedPage::open(&store, ai).unwrap();
        let c = LinkedPage::open(&store, ci).unwrap();
        assert_eq!(a.next_id().unwrap(), ci);
        assert_eq!(c.prev_id().unwrap(), ai);
    }

    #[test]
    fn pop_back_at_the_tail_returns_none() {
        let (_dir, mut store) = store();
        let mut a = LinkedPage::new(&mut store).unwrap();

        assert_eq!(a.pop_back(&mut store).unwrap(), None);
    }

    #[test]
    fn links_survive_release_and_reopen() {
        let (_dir, mut store) = store();
        let mut a = LinkedPage::new(&mut store).unwrap();
        let mut b = LinkedPage::new(&mut store).unwrap();
        let (ai, bi) = (a.id(), b.id());

        a.push_back(&mut store, &mut b).unwrap();
        a.release(&mut store).unwrap();
        b.release(&mut store).unwrap();

        let a = LinkedPage::open(&store, ai).unwrap();
        assert_eq!(a.next_id().unwrap(), bi);
        assert_eq!(a.prev_id().unwrap(), NULL_PAGE);
    }
}
