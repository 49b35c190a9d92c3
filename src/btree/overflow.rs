//! # Overflow Chain Pages
//!
//! A leaf stores one primary value per key; every further duplicate lives in
//! a singly-linked chain of overflow pages hanging off that key's slot.
//!
//! ## Page layout
//!
//! ```text
//! Offset  Size  Field   Description
//! ------  ----  ------  -----------------------------------
//! 0       4     -       reserved
//! 4       4     next    next chain page, NULL_PAGE at the tail
//! 8       4     len     number of values on this page
//! 12      4084  values  RowId entries, 8 bytes each
//! ```
//!
//! 510 values fit per page. Chains grow at the tail: inserts land in the
//! first non-full page, and a new tail is linked only when every page is
//! full. Pages emptied by deletions stay in the chain; only removing the
//! whole key reclaims them.

use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Error, Result};
use crate::storage::{BlockStore, PageId, RowId, NULL_PAGE, PAGE_SIZE};

/// Bytes before the packed value array.
pub const OVERFLOW_HEADER_SIZE: usize = 12;

/// Encoded width of one value.
const VALUE_SIZE: usize = 8;

/// Values per overflow page.
pub const OVERFLOW_CAPACITY: usize = (PAGE_SIZE - OVERFLOW_HEADER_SIZE) / VALUE_SIZE;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct OverflowHeader {
    reserved: [u8; 4],
    next: U32,
    len: U32,
}

const _: () = assert!(std::mem::size_of::<OverflowHeader>() == OVERFLOW_HEADER_SIZE);

/// One page of a duplicate-value chain, loaded into memory.
pub struct OverflowPage {
    id: PageId,
    next: PageId,
    values: Vec<RowId>,
    dirty: bool,
}

impl OverflowPage {
    /// Claim a fresh, empty chain page.
    pub fn new(store: &mut BlockStore) -> Result<Self> {
        Ok(Self {
            id: store.allocate()?,
            next: NULL_PAGE,
            values: Vec::new(),
            dirty: true,
        })
    }

    pub fn open(store: &BlockStore, id: PageId) -> Result<Self> {
        let mut buf = [0u8; PAGE_SIZE];
        store.read(id, &mut buf, 0)?;

        let header = OverflowHeader::ref_from_bytes(&buf[..OVERFLOW_HEADER_SIZE])
            .map_err(|e| Error::Corrupt(format!("overflow header on page {id}: {e:?}")))?;
        let len = header.len.get() as usize;
        if len > OVERFLOW_CAPACITY {
            return Err(Error::Corrupt(format!(
                "overflow page {id} claims {len} values, capacity is {OVERFLOW_CAPACITY}"
            )));
        }

        let values = (0..len)
            .map(|i| {
                let offset = OVERFLOW_HEADER_SIZE + i * VALUE_SIZE;
                RowId::read_from(&buf[offset..offset + VALUE_SIZE])
            })
            .collect();
        Ok(Self {
            id,
            next: header.next.get(),
            values,
            dirty: false,
        })
    }

    /// Write the page back if it was mutated.
    pub fn save(&self, store: &mut BlockStore) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut buf = [0u8; PAGE_SIZE];
        let header = OverflowHeader {
            reserved: [0u8; 4],
            next: U32::new(self.next),
            len: U32::new(self.values.len() as u32),
        };
        buf[..OVERFLOW_HEADER_SIZE].copy_from_slice(header.as_bytes());
        for (i, value) in self.values.iter().enumerate() {
            let offset = OVERFLOW_HEADER_SIZE + i * VALUE_SIZE;
            value.write_to(&mut buf[offset..offset + VALUE_SIZE]);
        }
        store.write(self.id, &buf, 0)
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn next_id(&self) -> PageId {
        self.next
    }

    pub fn set_next_id(&mut self, id: PageId) {
        self.next = id;
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == OVERFLOW_CAPACITY
    }

    pub fn values(&self) -> &[RowId] {
        &self.values
    }

    /// Append a value. Returns false (and stores nothing) when full.
    pub fn insert(&mut self, value: RowId) -> bool {
        if self.is_full() {
            return false;
        }
        self.values.push(value);
        self.dirty = true;
        true
    }

    /// Remove the first value equal to `value`, preserving order.
    pub fn delete(&mut self, value: RowId) -> bool {
        match self.values.iter().position(|v| *v == value) {
            Some(at) => {
                self.values.remove(at);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Replace the first value equal to `old` with `new`.
    pub fn update(&mut self, old: RowId, new: RowId) -> bool {
        match self.values.iter().position(|v| *v == old) {
            Some(at) => {
                self.values[at] = new;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Take the last value off the page.
    pub fn pop_back(&mut self) -> Option<RowId> {
        let value = self.values.pop()?;
        self.dirty = true;
        Some(value)
    }
}
