//! Page allocators.
//!
//! The page store never allocates page buffers itself; it asks a
//! [`PageAllocator`]. Every request carries an [`AllocTag`] naming the device
//! and page it is for, so an allocator under memory pressure knows not to
//! reclaim from that device to satisfy it.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::common::{DeviceId, Error, PageIndex, Result};
use crate::storage::page::PageBuf;

/// Identifies who is asking for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocTag {
    /// Device whose store is allocating. Must not be reclaimed from.
    pub device: DeviceId,
    /// Page the buffer is for.
    pub index: PageIndex,
}

/// Supplies zero-filled page buffers to page stores.
///
/// `allocate` is the only place in the write path allowed to block.
pub trait PageAllocator: Send + Sync {
    /// Allocate a zero-filled page buffer.
    ///
    /// # Errors
    /// - `Error::OutOfSpace` if no buffer can be provided
    fn allocate(&self, tag: AllocTag) -> Result<PageBuf>;

    /// Called when a buffer obtained from `allocate` leaves its store.
    fn release(&self, _tag: AllocTag) {}
}

/// Allocates straight from the heap, failing instead of aborting on OOM.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl PageAllocator for SystemAllocator {
    fn allocate(&self, tag: AllocTag) -> Result<PageBuf> {
        PageBuf::try_zeroed().ok_or(Error::OutOfSpace { index: tag.index })
    }
}

/// Heap allocator capped at a fixed number of live pages.
///
/// The budget is shared by every store using the same allocator, so one
/// `LimitedAllocator` behind a registry caps the memory of all its devices.
///
/// # Example
/// ```
/// use brickdisk::storage::{AllocTag, LimitedAllocator, PageAllocator};
/// use brickdisk::{DeviceId, PageIndex};
///
/// let alloc = LimitedAllocator::new(1);
/// let tag = AllocTag { device: DeviceId::new(0), index: PageIndex::new(0) };
///
/// assert!(alloc.allocate(tag).is_ok());
/// assert!(alloc.allocate(tag).is_err());
/// alloc.release(tag);
/// assert!(alloc.allocate(tag).is_ok());
/// ```
#[derive(Debug)]
pub struct LimitedAllocator {
    limit: usize,
    used: AtomicUsize,
}

impl LimitedAllocator {
    /// Create an allocator that hands out at most `limit` live pages.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    /// Maximum number of live pages.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of pages currently handed out.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }
}

impl PageAllocator for LimitedAllocator {
    fn allocate(&self, tag: AllocTag) -> Result<PageBuf> {
        let reserved = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.limit).then_some(used + 1)
            });
        if reserved.is_err() {
            return Err(Error::OutOfSpace { index: tag.index });
        }

        match PageBuf::try_zeroed() {
            Some(buf) => Ok(buf),
            None => {
                self.used.fetch_sub(1, Ordering::AcqRel);
                Err(Error::OutOfSpace { index: tag.index })
            }
        }
    }

    fn release(&self, _tag: AllocTag) {
        let old = self.used.fetch_sub(1, Ordering::AcqRel);
        assert!(old > 0, "page budget underflow");
    }
}
