//! PageBuf - the zero-filled byte buffer behind every page.

use crate::common::config::PAGE_SIZE;

/// A heap buffer of exactly [`PAGE_SIZE`] bytes.
///
/// Buffers are only ever created zero-filled, and creation is fallible:
/// an allocation failure is reported instead of aborting the process, so
/// the page store can surface it as "out of space".
///
/// # Clone Implementation
/// `PageBuf` does NOT implement `Clone` in production code; copying a page
/// should be an explicit decision. A `#[cfg(test)]` Clone is provided.
///
/// # Example
/// ```
/// use brickdisk::storage::page::PageBuf;
///
/// let mut buf = PageBuf::try_zeroed().unwrap();
/// buf.as_mut_slice()[0] = 0xFF;
/// assert_eq!(buf.as_slice()[0], 0xFF);
/// ```
pub struct PageBuf {
    data: Box<[u8]>,
}

impl PageBuf {
    /// Allocate a zeroed buffer, or `None` if the heap cannot satisfy it.
    pub fn try_zeroed() -> Option<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(PAGE_SIZE).ok()?;
        data.resize(PAGE_SIZE, 0);

        Some(Self {
            data: data.into_boxed_slice(),
        })
    }

    /// Get immutable slice of the buffer.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of the buffer.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire buffer.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Check whether every byte is zero.
    pub fn is_zeroed(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Get the size of a buffer.
    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }
}

impl std::fmt::Debug for PageBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBuf")
            .field("size", &self.data.len())
            .field("zeroed", &self.is_zeroed())
            .finish()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for PageBuf {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}
