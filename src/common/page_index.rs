//! Page index type.

use std::fmt;

use super::config::PAGE_SECTORS_SHIFT;

/// Identifies a backing page by its offset within the device, in units of
/// the page size.
///
/// A page's index is derived from any sector it backs by dropping the low
/// [`PAGE_SECTORS_SHIFT`] bits.
///
/// # Example
/// ```
/// use brickdisk::PageIndex;
///
/// let index = PageIndex::of_sector(1000);
/// assert_eq!(index, PageIndex::new(125));
/// assert_eq!(index.first_sector(), 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageIndex(pub u64);

impl PageIndex {
    /// Create a new PageIndex.
    #[inline]
    pub fn new(index: u64) -> Self {
        PageIndex(index)
    }

    /// The page that backs `sector`.
    #[inline]
    pub fn of_sector(sector: u64) -> Self {
        PageIndex(sector >> PAGE_SECTORS_SHIFT)
    }

    /// First sector backed by this page.
    #[inline]
    pub fn first_sector(&self) -> u64 {
        self.0 << PAGE_SECTORS_SHIFT
    }

    /// The following page.
    #[inline]
    pub fn next(&self) -> Self {
        PageIndex(self.0 + 1)
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({})", self.0)
    }
}
