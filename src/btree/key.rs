//! # Index Keys
//!
//! Keys are typed, fixed-width, comparable values. An index fixes its key
//! type at creation; the type (and with it the key width) is persisted in
//! every node header and loaded back from the root when an index is opened.
//!
//! The on-disk tags are explicit integers, never an enum's memory
//! representation:
//!
//! ```text
//! tag 0    i32, 4 bytes little-endian
//! tag 1    f64, 8 bytes little-endian
//! ```
//!
//! Unknown tags fail with
//! [`Error::UnsupportedKeyType`](crate::error::Error::UnsupportedKeyType).
//! Floats compare with `f64::total_cmp`, so even hostile inputs (NaN) order
//! deterministically instead of corrupting the sort invariants.

use std::cmp::Ordering;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Int,
    Float,
}

impl KeyType {
    /// The persisted type tag.
    pub fn tag(self) -> u32 {
        match self {
            KeyType::Int => 0,
            KeyType::Float => 1,
        }
    }

    /// Decode a persisted type tag.
    pub fn from_tag(tag: u32) -> Result<Self> {
        match tag {
            0 => Ok(KeyType::Int),
            1 => Ok(KeyType::Float),
            other => Err(Error::UnsupportedKeyType(other)),
        }
    }

    /// Encoded key width in bytes.
    pub fn key_size(self) -> usize {
        match self {
            KeyType::Int => 4,
            KeyType::Float => 8,
        }
    }
}

/// One key value. Every key in an index carries the same variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Key {
    Int(i32),
    Float(f64),
}

impl Key {
    pub fn key_type(self) -> KeyType {
        match self {
            Key::Int(_) => KeyType::Int,
            Key::Float(_) => KeyType::Float,
        }
    }

    /// Total order over keys of one type. Mixing variants is a caller bug.
    pub fn cmp_same(self, other: Key) -> Ordering {
        match (self, other) {
            (Key::Int(a), Key::Int(b)) => a.cmp(&b),
            (Key::Float(a), Key::Float(b)) => a.total_cmp(&b),
            (a, b) => panic!("mixed key types in one index: {a:?} vs {b:?}"),
        }
    }

    pub(crate) fn encode_into(self, dst: &mut [u8]) {
        match self {
            Key::Int(v) => dst[..4].copy_from_slice(&v.to_le_bytes()),
            Key::Float(v) => dst[..8].copy_from_slice(&v.to_le_bytes()),
        }
    }

    pub(crate) fn decode(key_type: KeyType, src: &[u8]) -> Key {
        match key_type {
            KeyType::Int => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&src[..4]);
                Key::Int(i32::from_le_bytes(raw))
            }
            KeyType::Float => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&src[..8]);
                Key::Float(f64::from_le_bytes(raw))
            }
        }
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(v)
    }
}

impl From<f64> for Key {
    fn from(v: f64) -> Self {
        Key::Float(v)
    }
}
