//! Page Store - the sparse, lazily populated backing of a device.
//!
//! The [`PageStore`] provides:
//! - Lock-cheap lookup of the page backing a given index
//! - Allocate-if-absent (`ensure`) with allocation kept outside the lock
//! - In-place zeroing and explicit release of single pages
//! - Exhaustive release of every page

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::common::config::FREE_BATCH;
use crate::common::{DeviceId, PageIndex, Result};
use crate::storage::page::Page;
use crate::storage::{AllocTag, DeviceStats, PageAllocator};

/// Sparse mapping from page index to backing page.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                         PageStore                           │
/// │  ┌───────────────────────────┐   ┌──────────────────────┐   │
/// │  │ pages: RwLock<BTreeMap>   │   │ allocator            │   │
/// │  │ PageIndex → Arc<Page>     │   │ Arc<dyn PageAllocator│   │
/// │  │  [0] [1] . . [125] [126]  │   └──────────────────────┘   │
/// │  └───────────────────────────┘   ┌──────────────────────┐   │
/// │                                  │ stats (atomics)      │   │
/// │                                  └──────────────────────┘   │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// An absent index reads as all zeroes. Entries are added only by
/// [`ensure`](Self::ensure) and removed only by [`free`](Self::free) and
/// [`free_all`](Self::free_all). Pages still resident when the store drops
/// are released to the allocator.
///
/// # Thread Safety
/// - `pages`: `RwLock`. Lookups share the read side. Inserts and removals
///   take the write side, and only around the map update itself: page
///   buffers are allocated and released outside it.
/// - A page is inserted fully zeroed and tagged with its index, so a
///   concurrent lookup never sees it half-built.
/// - `free` and `free_all` must not run while anyone may still be copying
///   through a page they looked up. The store trusts its caller here.
pub struct PageStore {
    /// Device this store backs, passed on to the allocator.
    device: DeviceId,

    /// Resident pages.
    pages: RwLock<BTreeMap<PageIndex, Arc<Page>>>,

    /// Source of page buffers.
    allocator: Arc<dyn PageAllocator>,

    /// Allocation and request counters.
    stats: DeviceStats,
}

impl PageStore {
    /// Create an empty store. No pages are allocated up front.
    pub fn new(device: DeviceId, allocator: Arc<dyn PageAllocator>) -> Self {
        Self {
            device,
            pages: RwLock::new(BTreeMap::new()),
            allocator,
            stats: DeviceStats::new(),
        }
    }

    // ========================================================================
    // Lookup and allocation
    // ========================================================================

    /// Return the page at `index`, or `None` if it was never written.
    ///
    /// Never blocks behind an allocation and never allocates.
    ///
    /// # Panics
    /// Panics if the page found does not carry `index`.
    pub fn lookup(&self, index: PageIndex) -> Option<Arc<Page>> {
        let page = self.pages.read().get(&index).cloned();
        if let Some(page) = &page {
            assert_eq!(page.index(), index, "page stored under wrong index");
        }
        page
    }

    /// Return the page at `index`, allocating a zeroed one if absent.
    ///
    /// This is the only store operation that may block or allocate.
    /// When two callers race on the same index, both may allocate but only
    /// the first insert wins; the loser's buffer is released and the
    /// winner's page is returned to both.
    ///
    /// # Errors
    /// - `Error::OutOfSpace` if the allocator refuses
    pub fn ensure(&self, index: PageIndex) -> Result<Arc<Page>> {
        if let Some(page) = self.lookup(index) {
            return Ok(page);
        }

        let tag = self.tag(index);
        let buf = match self.allocator.allocate(tag) {
            Ok(buf) => buf,
            Err(err) => {
                self.stats.alloc_failures.fetch_add(1, Ordering::Relaxed);
                warn!(device = %self.device, %index, "page allocation failed");
                return Err(err);
            }
        };
        let fresh = Arc::new(Page::new(index, buf));

        let winner = {
            let mut pages = self.pages.write();
            match pages.entry(index) {
                Entry::Occupied(existing) => Some(Arc::clone(existing.get())),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&fresh));
                    None
                }
            }
        };

        match winner {
            Some(existing) => {
                assert_eq!(existing.index(), index, "page stored under wrong index");
                drop(fresh);
                self.allocator.release(tag);
                self.stats.insert_races.fetch_add(1, Ordering::Relaxed);
                Ok(existing)
            }
            None => {
                self.stats.pages_allocated.fetch_add(1, Ordering::Relaxed);
                trace!(device = %self.device, %index, "allocated page");
                Ok(fresh)
            }
        }
    }

    // ========================================================================
    // Zeroing and release
    // ========================================================================

    /// Clear the page at `index` in place. Absent pages are left absent.
    pub fn zero(&self, index: PageIndex) {
        if let Some(page) = self.lookup(index) {
            page.zero();
        }
    }

    /// Clear every resident page whose index lies in `range`.
    ///
    /// Only visits pages that exist, so a huge sparse range costs as much
    /// as the pages actually in it. Pages are collected [`FREE_BATCH`] at a
    /// time and zeroed with the map lock released.
    pub fn zero_pages(&self, range: RangeInclusive<PageIndex>) {
        let (mut start, end) = range.into_inner();

        while start <= end {
            let batch: Vec<Arc<Page>> = self
                .pages
                .read()
                .range(start..=end)
                .take(FREE_BATCH)
                .map(|(_, page)| Arc::clone(page))
                .collect();

            let last = match batch.last() {
                Some(page) => page.index(),
                None => break,
            };
            for page in &batch {
                page.zero();
            }

            if batch.len() < FREE_BATCH || last >= end {
                break;
            }
            start = last.next();
        }
    }

    /// Remove and release the page at `index`, if present.
    pub fn free(&self, index: PageIndex) {
        let removed = self.pages.write().remove(&index);
        if let Some(page) = removed {
            self.release(page);
        }
    }

    /// Remove and release every page, returning how many were released.
    ///
    /// Pages are taken off the map in batches of [`FREE_BATCH`] until the map
    /// is observed empty, so calling this again is a no-op.
    ///
    /// # Precondition
    /// No reader or writer may be using the store.
    pub fn free_all(&self) -> usize {
        let mut freed = 0;

        loop {
            let batch: Vec<Arc<Page>> = {
                let mut pages = self.pages.write();
                std::iter::from_fn(|| pages.pop_first().map(|(_, page)| page))
                    .take(FREE_BATCH)
                    .collect()
            };

            if batch.is_empty() {
                break;
            }

            freed += batch.len();
            for page in batch {
                self.release(page);
            }
        }

        debug!(device = %self.device, freed, "released all pages");
        freed
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Number of resident pages.
    pub fn len(&self) -> usize {
        self.pages.read().len()
    }

    /// Whether no page is resident.
    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }

    /// Whether a page is resident at `index`.
    pub fn contains(&self, index: PageIndex) -> bool {
        self.pages.read().contains_key(&index)
    }

    /// Indices of all resident pages, in order.
    pub fn indices(&self) -> Vec<PageIndex> {
        self.pages.read().keys().copied().collect()
    }

    /// Device this store backs.
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Get store statistics.
    pub fn stats(&self) -> &DeviceStats {
        &self.stats
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn tag(&self, index: PageIndex) -> AllocTag {
        AllocTag {
            device: self.device,
            index,
        }
    }

    fn release(&self, page: Arc<Page>) {
        let tag = self.tag(page.index());
        drop(page);
        self.allocator.release(tag);
        self.stats.pages_freed.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for PageStore {
    fn drop(&mut self) {
        if !self.pages.get_mut().is_empty() {
            self.free_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LimitedAllocator, SystemAllocator};
    use crate::Error;

    fn create_test_store() -> PageStore {
        PageStore::new(DeviceId::new(0), Arc::new(SystemAllocator))
    }

    #[test]
    fn test_lookup_absent() {
        let store = create_test_store();
        assert!(store.lookup(PageIndex::new(5)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_ensure_inserts_zeroed_page() {
        let store = create_test_store();

        let page = store.ensure(PageIndex::new(5)).unwrap();
        assert_eq!(page.index(), PageIndex::new(5));
        assert!(page.is_zeroed());
        assert_eq!(store.len(), 1);
        assert!(store.contains(PageIndex::new(5)));
    }

    #[test]
    fn test_ensure_returns_existing() {
        let store = create_test_store();

        let first = store.ensure(PageIndex::new(1)).unwrap();
        first.write_at(0, &[0xAB]);
        let second = store.ensure(PageIndex::new(1)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().snapshot().pages_allocated, 1);
    }

    #[test]
    fn test_ensure_out_of_space() {
        let store = PageStore::new(DeviceId::new(0), Arc::new(LimitedAllocator::new(1)));

        store.ensure(PageIndex::new(0)).unwrap();
        let err = store.ensure(PageIndex::new(1)).unwrap_err();

        assert_eq!(
            err,
            Error::OutOfSpace {
                index: PageIndex::new(1)
            }
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().snapshot().alloc_failures, 1);
    }

    #[test]
    fn test_zero_keeps_entry() {
        let store = create_test_store();
        let page = store.ensure(PageIndex::new(2)).unwrap();
        page.write_at(0, &[0xFF; 64]);

        store.zero(PageIndex::new(2));

        assert!(page.is_zeroed());
        assert!(store.contains(PageIndex::new(2)));
    }

    #[test]
    fn test_zero_absent_does_not_allocate() {
        let store = create_test_store();
        store.zero(PageIndex::new(9));
        assert!(store.is_empty());
    }

    #[test]
    fn test_zero_pages_range() {
        let store = create_test_store();
        for i in 0..4 {
            store.ensure(PageIndex::new(i)).unwrap().write_at(0, &[0xEE]);
        }

        store.zero_pages(PageIndex::new(1)..=PageIndex::new(2));

        assert!(!store.lookup(PageIndex::new(0)).unwrap().is_zeroed());
        assert!(store.lookup(PageIndex::new(1)).unwrap().is_zeroed());
        assert!(store.lookup(PageIndex::new(2)).unwrap().is_zeroed());
        assert!(!store.lookup(PageIndex::new(3)).unwrap().is_zeroed());
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_zero_pages_across_batches() {
        let store = create_test_store();
        let count = FREE_BATCH as u64 * 2 + 3;
        for i in 0..count {
            store.ensure(PageIndex::new(i * 2)).unwrap().write_at(0, &[0xEE]);
        }

        // Stops at the last index of the range
        let end = PageIndex::new((count - 2) * 2);
        store.zero_pages(PageIndex::new(0)..=end);

        for i in 0..count - 1 {
            assert!(store.lookup(PageIndex::new(i * 2)).unwrap().is_zeroed());
        }
        assert!(!store.lookup(PageIndex::new((count - 1) * 2)).unwrap().is_zeroed());
    }

    #[test]
    fn test_zero_pages_ends_at_max_index() {
        let store = create_test_store();
        let last = PageIndex::new(u64::MAX);
        store.ensure(last).unwrap().write_at(0, &[0xEE]);

        store.zero_pages(PageIndex::new(0)..=last);

        assert!(store.lookup(last).unwrap().is_zeroed());
    }

    #[test]
    fn test_free() {
        let store = create_test_store();
        store.ensure(PageIndex::new(3)).unwrap();

        store.free(PageIndex::new(3));
        store.free(PageIndex::new(3)); // absent: no-op

        assert!(store.is_empty());
        assert_eq!(store.stats().snapshot().pages_freed, 1);
    }

    #[test]
    fn test_free_all_many_batches() {
        let store = create_test_store();
        let count = FREE_BATCH * 3 + 5;
        for i in 0..count as u64 {
            store.ensure(PageIndex::new(i * 7)).unwrap();
        }

        assert_eq!(store.free_all(), count);
        assert!(store.is_empty());
        assert_eq!(store.free_all(), 0);
    }

    #[test]
    fn test_free_all_returns_budget() {
        let alloc = Arc::new(LimitedAllocator::new(4));
        let store = PageStore::new(DeviceId::new(0), alloc.clone());
        for i in 0..4 {
            store.ensure(PageIndex::new(i)).unwrap();
        }
        assert_eq!(alloc.used(), 4);

        store.free_all();

        assert_eq!(alloc.used(), 0);
        assert!(store.ensure(PageIndex::new(10)).is_ok());
    }

    #[test]
    fn test_drop_returns_budget() {
        let alloc = Arc::new(LimitedAllocator::new(2));
        let store = PageStore::new(DeviceId::new(0), alloc.clone());
        store.ensure(PageIndex::new(0)).unwrap();
        store.ensure(PageIndex::new(9)).unwrap();
        assert_eq!(alloc.used(), 2);

        drop(store);

        assert_eq!(alloc.used(), 0);
        let other = PageStore::new(DeviceId::new(1), alloc.clone());
        assert!(other.ensure(PageIndex::new(0)).is_ok());
    }

    #[test]
    fn test_concurrent_ensure_single_winner() {
        use std::thread;

        let alloc = Arc::new(LimitedAllocator::new(64));
        let store = Arc::new(PageStore::new(DeviceId::new(0), alloc.clone()));
        let mut handles = vec![];

        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || store.ensure(PageIndex::new(42)).unwrap()));
        }

        let pages: Vec<Arc<Page>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for page in &pages {
            assert!(Arc::ptr_eq(page, &pages[0]));
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().snapshot().pages_allocated, 1);
        // Losers gave their buffers back
        assert_eq!(alloc.used(), 1);
    }
}
