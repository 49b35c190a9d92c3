//! # Slotted Record Page
//!
//! Fixed-length record storage over a [`LinkedPage`], so tables can chain
//! their pages while each page hands out slots:
//!
//! ```text
//! header offset 12           record length (u16)
//! data   [0, 128)            occupancy bitmap (up to 1024 slots)
//! data   [128, 4032)         records, slot i at 128 + i * record_len
//! ```
//!
//! `capacity = (4032 - 128) / record_len`, additionally capped by the 1024
//! bits the occupancy map can describe. The bitmap is cached in memory and
//! flushed on release only when a record operation ran, so read-only opens
//! stay writeless.

use crate::error::{Error, Result};
use crate::storage::bitmap::Bitmap;
use crate::storage::{BlockStore, LinkedPage, PageId, SlotId, PAGE_DATA_SIZE};

/// Bytes of the data region holding the occupancy bitmap.
pub const BITMAP_BYTES: usize = 128;

/// Header offset of the persisted record length.
pub const RECORD_LEN_OFFSET: usize = 12;

pub struct RecordPage {
    link: LinkedPage,
    record_len: usize,
    capacity: usize,
    used: Bitmap,
    modified: bool,
}

impl RecordPage {
    /// Claim a fresh page formatted for `record_len`-byte records.
    pub fn new(store: &mut BlockStore, record_len: u16) -> Result<Self> {
        let capacity = Self::capacity_for(record_len)?;
        let mut link = LinkedPage::new(store)?;
        link.page_mut().set_header_u16(RECORD_LEN_OFFSET, record_len)?;
        Ok(Self {
            link,
            record_len: record_len as usize,
            capacity,
            used: Bitmap::new(capacity),
            modified: false,
        })
    }

    /// Open an existing record page, reading its record length and
    /// occupancy bitmap back.
    pub fn open(store: &BlockStore, id: PageId) -> Result<Self> {
        let link = LinkedPage::open(store, id)?;
        let record_len = link.page().header_u16(RECORD_LEN_OFFSET)?;
        let capacity = Self::capacity_for(record_len).map_err(|_| {
            Error::Corrupt(format!(
                "record page {id} carries impossible record length {record_len}"
            ))
        })?;
        let used = Bitmap::from_bytes(link.page().data(0, BITMAP_BYTES)?, capacity);
        Ok(Self {
            link,
            record_len: record_len as usize,
            capacity,
            used,
            modified: false,
        })
    }

    fn capacity_for(record_len: u16) -> Result<usize> {
        let len = record_len as usize;
        if len == 0 || len > PAGE_DATA_SIZE - BITMAP_BYTES {
            return Err(Error::InvalidArgument(format!(
                "record length {len} does not fit a page"
            )));
        }
        Ok(((PAGE_DATA_SIZE - BITMAP_BYTES) / len).min(BITMAP_BYTES * 8))
    }

    pub fn id(&self) -> PageId {
        self.link.id()
    }

    pub fn record_len(&self) -> usize {
        self.record_len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    pub fn used(&self) -> usize {
        self.used.count_ones()
    }

    pub fn is_full(&self) -> bool {
        self.used() == self.capacity
    }

    pub fn has_record(&self, slot: SlotId) -> bool {
        (slot as usize) < self.capacity && self.used.get(slot as usize)
    }

    pub fn next_id(&self) -> Result<PageId> {
        self.link.next_id()
    }

    pub fn set_next_id(&mut self, id: PageId) -> Result<()> {
        self.link.set_next_id(id)
    }

    /// Store a record in the first free slot. `None` when the page is full.
    pub fn insert(&mut self, record: &[u8]) -> Result<Option<SlotId>> {
        self.check_len(record)?;
        let slot = match (0..self.capacity).find(|&i| !self.used.get(i)) {
            Some(slot) => slot,
            None => return Ok(None),
        };
        self.used.set(slot);
        self.link.page_mut().set_data(record, Self::offset_of(slot, self.record_len))?;
        self.modified = true;
        Ok(Some(slot as SlotId))
    }

    /// Copy a record out. The slot must be occupied.
    pub fn get(&self, slot: SlotId) -> Result<Vec<u8>> {
        self.check_slot(slot)?;
        let offset = Self::offset_of(slot as usize, self.record_len);
        Ok(self.link.page().data(offset, self.record_len)?.to_vec())
    }

    /// Overwrite an occupied slot in place.
    pub fn update(&mut self, slot: SlotId, record: &[u8]) -> Result<()> {
        self.check_slot(slot)?;
        self.check_len(record)?;
        let offset = Self::offset_of(slot as usize, self.record_len);
        self.link.page_mut().set_data(record, offset)?;
        self.modified = true;
        Ok(())
    }

    /// Release a slot. The record bytes are left behind; only the
    /// occupancy bit changes.
    pub fn delete(&mut self, slot: SlotId) -> Result<()> {
        self.check_slot(slot)?;
        self.used.clear(slot as usize);
        self.modified = true;
        Ok(())
    }

    /// Release every slot at once.
    pub fn clear(&mut self) {
        self.used = Bitmap::new(self.capacity);
        self.modified = true;
    }

    /// Flush the occupancy bitmap (when any record operation ran) and
    /// write the page back.
    pub fn release(mut self, store: &mut BlockStore) -> Result<()> {
        if self.modified {
            self.link.page_mut().set_data(self.used.as_bytes(), 0)?;
        }
        self.link.release(store)
    }

    fn offset_of(slot: usize, record_len: usize) -> usize {
        BITMAP_BYTES + slot * record_len
    }

    fn check_slot(&self, slot: SlotId) -> Result<()> {
        if !self.has_record(slot) {
            return Err(Error::SlotNotOccupied {
                page: self.id(),
                slot,
            });
        }
        Ok(())
    }

    fn check_len(&self, record: &[u8]) -> Result<()> {
        if record.len() != self.record_len {
            return Err(Error::InvalidArgument(format!(
                "record is {} bytes, page stores {}-byte records",
                record.len(),
                self.record_len
            )));
        }
        Ok(())
    }
}
