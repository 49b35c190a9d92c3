//! Byte-backed bitmap.
//!
//! Backs the block pool's allocation map and the record page occupancy map.
//! Indexes are bounds-checked with assertions; callers translate IDs into
//! valid bit positions before touching the map.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: Vec<u8>,
    len: usize,
}

impl Bitmap {
    /// A bitmap of `len` bits, all clear.
    pub fn new(len: usize) -> Self {
        Self {
            bits: vec![0u8; len.div_ceil(8)],
            len,
        }
    }

    /// Rebuild a bitmap of `len` bits from its persisted bytes.
    ///
    /// `bytes` must hold at least `len` bits; extra trailing bytes are
    /// ignored so fixed-width on-disk regions can round-trip.
    pub fn from_bytes(bytes: &[u8], len: usize) -> Self {
        let needed = len.div_ceil(8);
        assert!(
            bytes.len() >= needed,
            "bitmap needs {} bytes for {} bits, got {}",
            needed,
            len,
            bytes.len()
        );
        Self {
            bits: bytes[..needed].to_vec(),
            len,
        }
    }

    /// Number of bits tracked.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> bool {
        self.check(index);
        self.bits[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn set(&mut self, index: usize) {
        self.check(index);
        self.bits[index / 8] |= 1 << (index % 8);
    }

    pub fn clear(&mut self, index: usize) {
        self.check(index);
        self.bits[index / 8] &= !(1 << (index % 8));
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Raw backing bytes, `len.div_ceil(8)` of them.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    fn check(&self, index: usize) {
        assert!(
            index < self.len,
            "bit {} out of bounds (len {})",
            index,
            self.len
        );
    }
}
