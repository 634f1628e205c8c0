//! Page - one lazily allocated unit of device contents.
//!
//! A [`Page`] pairs a [`PageBuf`] with the [`PageIndex`] it is stored under.
//! Pages live in the [`PageStore`](crate::storage::PageStore) and are shared
//! out as `Arc<Page>` for the duration of a single copy.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::config::PAGE_SIZE;
use crate::common::PageIndex;

use super::PageBuf;

/// A backing page of a device.
///
/// # Thread Safety
/// The index is immutable after construction. The bytes sit behind a
/// `RwLock` that is held only for the length of a `memcpy`/`memset`;
/// it never wraps an allocation.
///
/// # Example
/// ```
/// use brickdisk::storage::page::{Page, PageBuf};
/// use brickdisk::PageIndex;
///
/// let page = Page::new(PageIndex::new(3), PageBuf::try_zeroed().unwrap());
/// page.write_at(10, b"abc");
///
/// let mut out = [0u8; 3];
/// page.read_at(10, &mut out);
/// assert_eq!(&out, b"abc");
/// ```
pub struct Page {
    /// Offset of this page within the device, in pages.
    index: PageIndex,

    /// The page bytes.
    data: RwLock<PageBuf>,
}

impl Page {
    /// Wrap a zeroed buffer as the page at `index`.
    pub fn new(index: PageIndex, buf: PageBuf) -> Self {
        Self {
            index,
            data: RwLock::new(buf),
        }
    }

    /// The index this page was created for.
    #[inline]
    pub fn index(&self) -> PageIndex {
        self.index
    }

    /// Acquire read lock on the page bytes.
    #[inline]
    pub fn data(&self) -> RwLockReadGuard<'_, PageBuf> {
        self.data.read()
    }

    /// Acquire write lock on the page bytes.
    #[inline]
    pub fn data_mut(&self) -> RwLockWriteGuard<'_, PageBuf> {
        self.data.write()
    }

    /// Copy `dst.len()` bytes starting at `offset` out of the page.
    ///
    /// # Panics
    /// Panics if the range runs past the end of the page.
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) {
        assert!(offset + dst.len() <= PAGE_SIZE, "read past end of page");
        let data = self.data.read();
        dst.copy_from_slice(&data.as_slice()[offset..offset + dst.len()]);
    }

    /// Copy `src` into the page starting at `offset`.
    ///
    /// # Panics
    /// Panics if the range runs past the end of the page.
    pub fn write_at(&self, offset: usize, src: &[u8]) {
        assert!(offset + src.len() <= PAGE_SIZE, "write past end of page");
        let mut data = self.data.write();
        data.as_mut_slice()[offset..offset + src.len()].copy_from_slice(src);
    }

    /// Clear `len` bytes starting at `offset`.
    pub fn zero_range(&self, offset: usize, len: usize) {
        assert!(offset + len <= PAGE_SIZE, "zero past end of page");
        let mut data = self.data.write();
        data.as_mut_slice()[offset..offset + len].fill(0);
    }

    /// Clear the whole page.
    pub fn zero(&self) {
        self.data.write().reset();
    }

    /// Check whether the page holds only zero bytes.
    pub fn is_zeroed(&self) -> bool {
        self.data.read().is_zeroed()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page").field("index", &self.index).finish()
    }
}
