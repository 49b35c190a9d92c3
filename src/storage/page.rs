//! # Formatted Page
//!
//! A [`Page`] is an owned copy of one block split into two regions:
//!
//! ```text
//! Offset  Size  Region   Description
//! ------  ----  -------  -------------------------------------------
//! 0       64    header   typed metadata (chain links, record length)
//! 64      4032  data     payload laid out by the page type
//! ```
//!
//! Offsets passed to the accessors are region-relative: header offset 4 is
//! byte 4 of the block, data offset 0 is byte 64. Every access is
//! bounds-checked against its region and fails with
//! [`Error::OutOfRange`](crate::error::Error::OutOfRange) rather than
//! clamping.
//!
//! ## Lifecycle
//!
//! Pages come in two flavors with the same type:
//!
//! - [`Page::alloc`] claims a fresh zeroed block and starts dirty, so a new
//!   page reaches the store even if nothing else is written to it.
//! - [`Page::open`] copies an existing block and starts clean.
//!
//! Mutating accessors set the dirty flag; [`Page::release`] writes the block
//! back only when dirty, so read-only traffic never touches the store. The
//! engine is single-threaded and holds at most one page object per ID at a
//! time; release is an explicit consuming call, not a drop side effect, so
//! every mutating path ends with a visible write-back.

use crate::error::{Error, Result};
use crate::storage::{BlockStore, PageId, PAGE_DATA_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE};

pub struct Page {
    id: PageId,
    buf: Box<[u8; PAGE_SIZE]>,
    dirty: bool,
}

impl Page {
    /// Claim a fresh zeroed page from the store.
    pub fn alloc(store: &mut BlockStore) -> Result<Self> {
        let id = store.allocate()?;
        Ok(Self {
            id,
            buf: Box::new([0u8; PAGE_SIZE]),
            dirty: true,
        })
    }

    /// Open an existing page by ID.
    pub fn open(store: &BlockStore, id: PageId) -> Result<Self> {
        let mut buf = Box::new([0u8; PAGE_SIZE]);
        store.read(id, &mut buf[..], 0)?;
        Ok(Self {
            id,
            buf,
            dirty: false,
        })
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Borrow `len` header bytes starting at `offset`.
    pub fn header(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check(offset, len, PAGE_HEADER_SIZE)?;
        Ok(&self.buf[offset..offset + len])
    }

    /// Overwrite header bytes starting at `offset`.
    pub fn set_header(&mut self, src: &[u8], offset: usize) -> Result<()> {
        self.check(offset, src.len(), PAGE_HEADER_SIZE)?;
        self.buf[offset..offset + src.len()].copy_from_slice(src);
        self.dirty = true;
        Ok(())
    }

    /// Borrow `len` data bytes starting at data-relative `offset`.
    pub fn data(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check(offset, len, PAGE_DATA_SIZE)?;
        let base = PAGE_HEADER_SIZE + offset;
        Ok(&self.buf[base..base + len])
    }

    /// Overwrite data bytes starting at data-relative `offset`.
    pub fn set_data(&mut self, src: &[u8], offset: usize) -> Result<()> {
        self.check(offset, src.len(), PAGE_DATA_SIZE)?;
        let base = PAGE_HEADER_SIZE + offset;
        self.buf[base..base + src.len()].copy_from_slice(src);
        self.dirty = true;
        Ok(())
    }

    pub fn header_u16(&self, offset: usize) -> Result<u16> {
        let mut raw = [0u8; 2];
        raw.copy_from_slice(self.header(offset, 2)?);
        Ok(u16::from_le_bytes(raw))
    }

    pub fn set_header_u16(&mut self, offset: usize, value: u16) -> Result<()> {
        self.set_header(&value.to_le_bytes(), offset)
    }

    pub fn header_u32(&self, offset: usize) -> Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.header(offset, 4)?);
        Ok(u32::from_le_bytes(raw))
    }

    pub fn set_header_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.set_header(&value.to_le_bytes(), offset)
    }

    /// Write the page back if it was mutated, then drop it.
    pub fn release(self, store: &mut BlockStore) -> Result<()> {
        if self.dirty {
            store.write(self.id, &self.buf[..], 0)?;
        }
        Ok(())
    }

    fn check(&self, offset: usize, len: usize, region: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= region => Ok(()),
            _ => Err(Error::OutOfRange {
                page: self.id,
                offset,
                len,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreOptions;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, BlockStore) {
        let dir = tempdir().unwrap();
        let store = BlockStore::open_with(dir.path(), StoreOptions { pool_pages: 8 }).unwrap();
        (dir, store)
    }

    #[test]
    fn fresh_pages_start_zeroed_and_dirty() {
        let (_dir, mut store) = store();

        let page = Page::alloc(&mut store).unwrap();

        assert!(page.is_dirty());
        assert_eq!(page.header(0, 8).unwrap(), &[0u8; 8]);
        assert_eq!(page.data(0, 8).unwrap(), &[0u8; 8]);
    }

    #[test]
    fn opened_pages_start_clean() {
        let (_dir, mut store) = store();
        let id = {
            let page = Page::alloc(&mut store).unwrap();
            let id = page.id();
            page.release(&mut store).unwrap();
            id
        };

        let page = Page::open(&store, id).unwrap();

        assert!(!page.is_dirty());
    }

    #[test]
    fn header_and_data_regions_do_not_overlap() {
        let (_dir, mut store) = store();
        let mut page = Page::alloc(&mut store).unwrap();
        let id = page.id();

        page.set_header_u32(0, 0xAABBCCDD).unwrap();
        page.set_data(b"payload", 0).unwrap();
        page.release(&mut store).unwrap();

        let mut head = [0u8; 4];
        store.read(id, &mut head, 0).unwrap();
        assert_eq!(u32::from_le_bytes(head), 0xAABBCCDD);

        let mut body = [0u8; 7];
        store.read(id, &mut body, PAGE_HEADER_SIZE).unwrap();
        assert_eq!(&body, b"payload");
    }

    #[test]
    fn typed_header_accessors_round_trip() {
        let (_dir, mut store) = store();
        let mut page = Page::alloc(&mut store).unwrap();

        page.set_header_u16(12, 300).unwrap();
        page.set_header_u32(4, 0x01020304).unwrap();

        assert_eq!(page.header_u16(12).unwrap(), 300);
        assert_eq!(page.header_u32(4).unwrap(), 0x01020304);
    }

    #[test]
    fn header_access_past_the_region_fails() {
        let (_dir, mut store) = store();
        let page = Page::alloc(&mut store).unwrap();

        let err = page.header(PAGE_HEADER_SIZE - 2, 4).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
    }

    #[test]
    fn data_access_past_the_region_fails() {
        let (_dir, mut store) = store();
        let mut page = Page::alloc(&mut store).unwrap();

        let err = page.set_data(&[1, 2, 3, 4], PAGE_DATA_SIZE - 2).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
    }

    #[test]
    fn release_of_a_clean_page_writes_nothing() {
        let (_dir, mut store) = store();
        let id = {
            let mut page = Page::alloc(&mut store).unwrap();
            page.set_data(b"original", 0).unwrap();
            let id = page.id();
            page.release(&mut store).unwrap();
            id
        };

        // Mutate the block behind the page's back, then open/release a
        // clean view. The out-of-band bytes must survive.
        store.write(id, b"stomped!", PAGE_HEADER_SIZE).unwrap();
        let page = Page::open(&store, id).unwrap();
        page.release(&mut store).unwrap();

        let mut buf = [0u8; 8];
        store.read(id, &mut buf, PAGE_HEADER_SIZE).unwrap();
        assert_eq!(&buf, b"stomped!");
    }
}
