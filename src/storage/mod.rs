//! # Storage Layer
//!
//! The storage layer simulates a block device: a bounded pool of 4096-byte
//! blocks addressed by [`PageId`], held entirely in memory and persisted
//! wholesale when the store closes.
//!
//! ## Components
//!
//! - [`BlockStore`] - the pool itself: allocation bitmap, clock-hand
//!   allocator, byte-range reads/writes, and the two flat artifacts written
//!   at close (`loam.bitmap`, `loam.blocks`)
//! - [`Page`] - a formatted view over one block: 64-byte header plus
//!   4032-byte data region, with dirty tracking and write-back on release
//! - [`LinkedPage`] - doubly-linked page chains threaded through two header
//!   fields
//! - [`RecordPage`] - fixed-length slotted records over a linked page, with
//!   a 128-byte occupancy bitmap
//! - [`Bitmap`] - the byte-backed bitmap shared by the allocator and the
//!   record pages
//!
//! ## Page layout
//!
//! ```text
//! +--------------------+ 0
//! | header (64 bytes)  |   typed fields: chain links, record length, ...
//! +--------------------+ 64
//! | data (4032 bytes)  |   payload owned by the page former
//! +--------------------+ 4096
//! ```
//!
//! Tree and overflow pages bypass the header/data split and address the
//! whole block directly; see the `btree` module.

pub mod bitmap;
pub mod linked;
pub mod page;
pub mod record;
pub mod store;

pub use bitmap::Bitmap;
pub use linked::LinkedPage;
pub use page::Page;
pub use record::RecordPage;
pub use store::{BlockStore, StoreOptions, BITMAP_FILE, BLOCKS_FILE};

/// Size of one block (and of every page) in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Bytes reserved for the formatted page header.
pub const PAGE_HEADER_SIZE: usize = 64;

/// Bytes available in the formatted page data region.
pub const PAGE_DATA_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

/// Default number of pages in a block pool.
pub const DEFAULT_POOL_PAGES: usize = 4096;

/// Identifies one block in the pool.
pub type PageId = u32;

/// Identifies one record slot within a page.
pub type SlotId = u32;

/// The nil page. All-ones rather than zero, because page 0 is a
/// legitimately allocatable ID.
pub const NULL_PAGE: PageId = PageId::MAX;

/// Locator for one physical row: a page and a slot within it.
///
/// Serialized as 8 bytes, `[page: u32 LE][slot: u32 LE]`. Inner tree nodes
/// reuse the same wire format for child pointers with the slot half zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId {
    pub page: PageId,
    pub slot: SlotId,
}

impl RowId {
    pub const fn new(page: PageId, slot: SlotId) -> Self {
        Self { page, slot }
    }

    pub(crate) fn write_to(self, dst: &mut [u8]) {
        dst[0..4].copy_from_slice(&self.page.to_le_bytes());
        dst[4..8].copy_from_slice(&self.slot.to_le_bytes());
    }

    pub(crate) fn read_from(src: &[u8]) -> Self {
        let mut page = [0u8; 4];
        let mut slot = [0u8; 4];
        page.copy_from_slice(&src[0..4]);
        slot.copy_from_slice(&src[4..8]);
        Self {
            page: PageId::from_le_bytes(page),
            slot: SlotId::from_le_bytes(slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_id_round_trips_through_eight_bytes() {
        let rid = RowId::new(0xDEAD_BEEF, 42);
        let mut buf = [0u8; 8];
        rid.write_to(&mut buf);

        assert_eq!(RowId::read_from(&buf), rid);
        assert_eq!(&buf[0..4], &0xDEAD_BEEFu32.to_le_bytes());
    }

    #[test]
    fn null_page_cannot_collide_with_slot_zero() {
        assert_ne!(NULL_PAGE, 0);
    }
}
