//! # Block Store
//!
//! A bounded pool of 4096-byte blocks that simulates a block device. The
//! whole pool lives in memory while the store is open; closing it persists
//! two flat artifacts into the store directory:
//!
//! ```text
//! loam.bitmap    pool_pages / 8 bytes     allocation bitmap, one bit per slot
//! loam.blocks    pool_pages * 4096 bytes  every slot in ID order, unallocated
//!                                         slots as zeroes
//! ```
//!
//! Keeping unallocated slots in the block artifact makes every page's file
//! offset a pure function of its ID, so a reopened store sees byte-identical
//! pages without any relocation map.
//!
//! ## Allocation
//!
//! `allocate` runs a clock hand over the bitmap: probe the cursor slot, claim
//! it if free, otherwise advance and wrap. The cursor stays on the slot it
//! last claimed, so consecutive allocations probe (and skip) it before moving
//! on. A full wrap without a free slot fails with
//! [`Error::AllocationExhausted`].
//!
//! The store is constructed and torn down explicitly and passed by reference
//! to whoever needs pages. There is no process-global instance; tests run as
//! many isolated stores as they like.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::bitmap::Bitmap;
use crate::storage::{PageId, DEFAULT_POOL_PAGES, PAGE_SIZE};

/// Allocation bitmap artifact, written at close.
pub const BITMAP_FILE: &str = "loam.bitmap";

/// Block pool artifact, written at close.
pub const BLOCKS_FILE: &str = "loam.blocks";

type Block = Box<[u8; PAGE_SIZE]>;

/// Tunables for [`BlockStore::open_with`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Number of slots in the pool. Must be a non-zero multiple of 8 so the
    /// bitmap artifact is a whole number of bytes.
    pub pool_pages: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            pool_pages: DEFAULT_POOL_PAGES,
        }
    }
}

/// The in-memory block pool. See the module docs for the on-disk artifacts.
#[derive(Debug)]
pub struct BlockStore {
    dir: PathBuf,
    blocks: Vec<Option<Block>>,
    used: Bitmap,
    clock: usize,
}

impl BlockStore {
    /// Open (or start) a store in `dir` with the default pool size.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(dir, StoreOptions::default())
    }

    /// Open (or start) a store in `dir`.
    ///
    /// If both artifacts exist there, the bitmap and every allocated block
    /// are loaded; otherwise the store starts empty. Artifact sizes must
    /// agree with `opts.pool_pages`.
    pub fn open_with(dir: impl AsRef<Path>, opts: StoreOptions) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let pool = opts.pool_pages;
        if pool == 0 || pool % 8 != 0 {
            return Err(Error::InvalidArgument(format!(
                "pool_pages must be a non-zero multiple of 8, got {pool}"
            )));
        }

        let mut store = Self {
            dir,
            blocks: (0..pool).map(|_| None).collect(),
            used: Bitmap::new(pool),
            clock: 0,
        };

        let bitmap_path = store.dir.join(BITMAP_FILE);
        let blocks_path = store.dir.join(BLOCKS_FILE);
        match (bitmap_path.exists(), blocks_path.exists()) {
            (true, true) => store.load_artifacts(&bitmap_path, &blocks_path)?,
            (false, false) => {}
            _ => {
                return Err(Error::Corrupt(format!(
                    "store at {} has one artifact but not the other",
                    store.dir.display()
                )))
            }
        }

        debug!(
            dir = %store.dir.display(),
            pool_pages = pool,
            used = store.used.count_ones(),
            "opened block store"
        );
        Ok(store)
    }

    fn load_artifacts(&mut self, bitmap_path: &Path, blocks_path: &Path) -> Result<()> {
        let pool = self.blocks.len();

        let raw = fs::read(bitmap_path)?;
        if raw.len() != pool / 8 {
            return Err(Error::Corrupt(format!(
                "bitmap artifact is {} bytes, expected {} for a {}-page pool",
                raw.len(),
                pool / 8,
                pool
            )));
        }
        self.used = Bitmap::from_bytes(&raw, pool);

        let data = fs::read(blocks_path)?;
        if data.len() != pool * PAGE_SIZE {
            return Err(Error::Corrupt(format!(
                "block artifact is {} bytes, expected {} for a {}-page pool",
                data.len(),
                pool * PAGE_SIZE,
                pool
            )));
        }
        for slot in 0..pool {
            if self.used.get(slot) {
                let mut block: Block = Box::new([0u8; PAGE_SIZE]);
                let offset = slot * PAGE_SIZE;
                block.copy_from_slice(&data[offset..offset + PAGE_SIZE]);
                self.blocks[slot] = Some(block);
            }
        }
        Ok(())
    }

    /// Claim the first free slot at or after the clock cursor, wrapping once.
    pub fn allocate(&mut self) -> Result<PageId> {
        let pool = self.blocks.len();
        let start = self.clock;
        loop {
            if !self.used.get(self.clock) {
                let id = self.clock as PageId;
                self.used.set(self.clock);
                self.blocks[self.clock] = Some(Box::new([0u8; PAGE_SIZE]));
                return Ok(id);
            }
            self.clock = (self.clock + 1) % pool;
            if self.clock == start {
                return Err(Error::AllocationExhausted);
            }
        }
    }

    /// Release a page. Its bytes are discarded; a later `allocate` of the
    /// same slot hands out a zeroed block.
    pub fn free(&mut self, id: PageId) -> Result<()> {
        let slot = self.slot_of(id)?;
        self.used.clear(slot);
        self.blocks[slot] = None;
        Ok(())
    }

    /// Copy `dst.len()` bytes out of the page starting at `offset`.
    pub fn read(&self, id: PageId, dst: &mut [u8], offset: usize) -> Result<()> {
        let slot = self.slot_of(id)?;
        Self::check_bounds(id, offset, dst.len())?;
        let block = match &self.blocks[slot] {
            Some(block) => block,
            None => unreachable!("allocation bit set for page {id} but no block present"),
        };
        dst.copy_from_slice(&block[offset..offset + dst.len()]);
        Ok(())
    }

    /// Copy `src.len()` bytes into the page starting at `offset`.
    pub fn write(&mut self, id: PageId, src: &[u8], offset: usize) -> Result<()> {
        let slot = self.slot_of(id)?;
        Self::check_bounds(id, offset, src.len())?;
        let block = match &mut self.blocks[slot] {
            Some(block) => block,
            None => unreachable!("allocation bit set for page {id} but no block present"),
        };
        block[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    pub fn is_allocated(&self, id: PageId) -> bool {
        let slot = id as usize;
        slot < self.blocks.len() && self.used.get(slot)
    }

    /// Number of allocated pages.
    pub fn used_pages(&self) -> usize {
        self.used.count_ones()
    }

    /// Total number of slots in the pool.
    pub fn pool_pages(&self) -> usize {
        self.blocks.len()
    }

    /// Persist both artifacts and tear the store down.
    pub fn close(self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(BITMAP_FILE), self.used.as_bytes())?;

        let mut file = fs::File::create(self.dir.join(BLOCKS_FILE))?;
        let zero = [0u8; PAGE_SIZE];
        for block in &self.blocks {
            match block {
                Some(block) => file.write_all(&block[..])?,
                None => file.write_all(&zero)?,
            }
        }
        file.sync_all()?;

        debug!(
            dir = %self.dir.display(),
            used = self.used.count_ones(),
            "closed block store"
        );
        Ok(())
    }

    fn slot_of(&self, id: PageId) -> Result<usize> {
        let slot = id as usize;
        if slot >= self.blocks.len() || !self.used.get(slot) {
            return Err(Error::PageNotAllocated(id));
        }
        Ok(slot)
    }

    fn check_bounds(id: PageId, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= PAGE_SIZE => Ok(()),
            _ => Err(Error::OutOfRange {
                page: id,
                offset,
                len,
            }),
        }
    }
}
