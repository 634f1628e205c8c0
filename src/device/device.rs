//! Device - one RAM-backed block device.
//!
//! A [`Device`] owns its [`PageStore`] and knows its capacity. It provides:
//! - Open reference counting through [`OpenHandle`]s
//! - Flush-and-reset ("forget everything") under single-opener exclusivity
//! - Destroy, which releases every page
//! - Direct access to a single backing page

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::common::config::{sector_offset, PAGE_SECTORS, SECTOR_SIZE};
use crate::common::{DeviceId, Error, PageIndex, Result};
use crate::device::OpenHandle;
use crate::storage::page::Page;
use crate::storage::{DeviceStats, PageAllocator, PageStore};

/// A cache layered above a device that must be dropped before the
/// device's contents are.
pub trait UpperCache {
    /// Discard everything cached for `device` without writing it back.
    fn invalidate(&self, device: DeviceId);
}

/// An [`UpperCache`] that caches nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl UpperCache for NoCache {
    fn invalidate(&self, _device: DeviceId) {}
}

/// A RAM block device.
///
/// # Thread Safety
/// - `store`: see [`PageStore`]. Any number of requests may run at once.
/// - `openers`: `AtomicU32`, incremented by [`open`](Self::open) and
///   decremented when an [`OpenHandle`] drops.
/// - `control`: `Mutex` serializing opens against the exclusivity check of
///   destructive operations, so no one can open the device between the
///   check and the release of its pages.
///
/// # Usage
/// ```
/// use std::sync::Arc;
/// use brickdisk::device::{Device, Request, Segment};
/// use brickdisk::storage::SystemAllocator;
/// use brickdisk::DeviceId;
///
/// let device = Device::create(DeviceId::new(0), 2048, Arc::new(SystemAllocator));
///
/// let mut data = vec![0x41u8; 4096];
/// device
///     .process(Request::write(0).with_segment(Segment::whole(&mut data)))
///     .unwrap();
///
/// let mut out = vec![0u8; 4096];
/// device
///     .process(Request::read(0).with_segment(Segment::whole(&mut out)))
///     .unwrap();
/// assert_eq!(out, data);
/// ```
pub struct Device {
    /// Registry identity.
    id: DeviceId,

    /// Size in sectors (immutable after construction).
    capacity: u64,

    /// Device contents.
    store: PageStore,

    /// Number of live open handles.
    openers: AtomicU32,

    /// Held while opening and during destructive operations.
    control: Mutex<()>,
}

impl Device {
    /// Create a device of `capacity` sectors with an empty store.
    pub fn create(id: DeviceId, capacity: u64, allocator: Arc<dyn PageAllocator>) -> Self {
        debug!(device = %id, capacity, "created device");

        Self {
            id,
            capacity,
            store: PageStore::new(id, allocator),
            openers: AtomicU32::new(0),
            control: Mutex::new(()),
        }
    }

    // ========================================================================
    // Identity and info
    // ========================================================================

    /// Get the device id.
    #[inline]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Get the device name (`brick<N>`).
    pub fn name(&self) -> String {
        self.id.to_string()
    }

    /// Capacity in sectors.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Capacity in bytes, saturating at `u64::MAX`.
    #[inline]
    pub fn size_bytes(&self) -> u64 {
        self.capacity.saturating_mul(SECTOR_SIZE as u64)
    }

    /// The backing page store.
    #[inline]
    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// Get device statistics.
    pub fn stats(&self) -> &DeviceStats {
        self.store.stats()
    }

    // ========================================================================
    // Open references
    // ========================================================================

    /// Open the device. It stays open until the handle drops.
    pub fn open(self: &Arc<Self>) -> OpenHandle {
        let _control = self.control.lock();
        self.openers.fetch_add(1, Ordering::AcqRel);
        OpenHandle::new(Arc::clone(self))
    }

    /// Number of open handles.
    #[inline]
    pub fn openers(&self) -> u32 {
        self.openers.load(Ordering::Acquire)
    }

    /// Drop one open reference. Called by `OpenHandle` on drop.
    ///
    /// # Panics
    /// Panics if the device is not open.
    pub(crate) fn close_internal(&self) {
        let old = self.openers.fetch_sub(1, Ordering::AcqRel);
        assert!(old > 0, "opener count underflow");
    }

    // ========================================================================
    // Destructive operations
    // ========================================================================

    /// Invalidate the cache above the device and release every page.
    ///
    /// Only the caller may have the device open (at most one opener).
    ///
    /// # Errors
    /// - `Error::Busy` if more than one handle is open. Nothing changes.
    pub fn flush_and_reset(&self, cache: &dyn UpperCache) -> Result<()> {
        let _control = self.control.lock();

        let openers = self.openers();
        if openers > 1 {
            warn!(device = %self.id, openers, "flush refused: device busy");
            return Err(Error::Busy { openers });
        }

        // Drop the cache first so nothing is written back into the store
        cache.invalidate(self.id);
        let freed = self.store.free_all();

        debug!(device = %self.id, freed, "flushed device");
        Ok(())
    }

    /// Release every page.
    ///
    /// # Precondition
    /// No request may be running against the device.
    pub fn destroy(&self) -> usize {
        let freed = self.store.free_all();
        debug!(device = %self.id, freed, "destroyed device");
        freed
    }

    /// Destroy the device if no handle is open.
    ///
    /// # Errors
    /// - `Error::Busy` if the device is open. Nothing changes.
    pub(crate) fn destroy_if_idle(&self) -> Result<usize> {
        let _control = self.control.lock();

        let openers = self.openers();
        if openers > 0 {
            return Err(Error::Busy { openers });
        }

        Ok(self.destroy())
    }

    // ========================================================================
    // Direct access
    // ========================================================================

    /// Return the page backing `sector`, allocating it if needed, so the
    /// caller can address its memory directly.
    ///
    /// # Errors
    /// - `Error::Misaligned` if `sector` is not the first sector of a page
    /// - `Error::OutOfRange` if the page reaches past the end of the device
    /// - `Error::OutOfSpace` if the page cannot be allocated
    pub fn direct_access(&self, sector: u64) -> Result<Arc<Page>> {
        if sector_offset(sector) != 0 {
            return Err(Error::Misaligned { sector });
        }
        self.check_range(sector.saturating_add(PAGE_SECTORS))?;

        self.store.ensure(PageIndex::of_sector(sector))
    }

    /// Reject anything ending past the last sector.
    pub(crate) fn check_range(&self, end: u64) -> Result<()> {
        if end > self.capacity {
            warn!(device = %self.id, end, capacity = self.capacity, "access beyond end of device");
            return Err(Error::OutOfRange {
                end,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("pages", &self.store.len())
            .field("openers", &self.openers())
            .finish()
    }
}
