//! # Error Types
//!
//! Every recoverable failure in the crate flows through [`Error`]. The
//! variants mirror the conditions callers can meaningfully branch on:
//! allocation pressure, accesses to pages or slots that do not exist,
//! byte ranges that fall outside a page, and key-type tags the engine
//! does not understand.
//!
//! Structural invariant violations (a leaf showing up where an inner node
//! must be, parallel arrays of different lengths, ranks past the end in
//! internal calls) are programming errors, not runtime conditions. Those
//! panic with a descriptive message instead of returning an `Error`.

use std::io;

use thiserror::Error;

use crate::storage::{PageId, SlotId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Every slot in the block pool is allocated.
    #[error("block pool exhausted: every page is allocated")]
    AllocationExhausted,

    /// Read, write, or free of a page that is not currently allocated.
    #[error("page {0} is not allocated")]
    PageNotAllocated(PageId),

    /// Byte access past the end of a page (or of a page region).
    #[error("out of range on page {page}: offset {offset} + len {len}")]
    OutOfRange {
        page: PageId,
        offset: usize,
        len: usize,
    },

    /// A key-type tag that does not name a supported key type.
    #[error("unsupported key type tag {0}")]
    UnsupportedKeyType(u32),

    /// Record access through a slot whose occupancy bit is clear.
    #[error("slot {slot} on page {page} is not occupied")]
    SlotNotOccupied { page: PageId, slot: SlotId },

    /// A caller-supplied value that can never be valid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Persisted artifacts that fail validation on load.
    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
