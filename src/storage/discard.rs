//! Discard as in-place zeroing.
//!
//! Discarded pages are cleared, not freed. Reads cannot tell an absent page
//! from a zeroed one.
//!
//! # Sub-page edges
//! A range need not be page aligned. Whole pages in the range are zeroed;
//! the partial head and tail are cleared byte-exactly on pages that exist.
//! Bytes outside the range are never touched, and nothing is allocated.

use crate::common::config::{sector_offset, PAGE_SIZE};
use crate::common::{PageIndex, Result};
use crate::storage::PageStore;

/// Make `len` bytes starting at `sector` read as zeroes.
///
/// Never allocates or frees, so it cannot fail for lack of space.
pub fn discard(store: &PageStore, sector: u64, len: u64) -> Result<()> {
    if len == 0 {
        return Ok(());
    }

    let page_size = PAGE_SIZE as u64;
    let mut index = PageIndex::of_sector(sector);
    let mut remaining = len;

    let offset = sector_offset(sector);
    if offset != 0 {
        let head = remaining.min((PAGE_SIZE - offset) as u64);
        zero_partial(store, index, offset, head as usize);
        remaining -= head;
        index = index.next();
    }

    let full = remaining / page_size;
    if full > 0 {
        let last = PageIndex::new(index.0 + full - 1);
        store.zero_pages(index..=last);
        index = last.next();
    }

    let tail = remaining % page_size;
    if tail > 0 {
        zero_partial(store, index, 0, tail as usize);
    }

    Ok(())
}

fn zero_partial(store: &PageStore, index: PageIndex, offset: usize, len: usize) {
    if let Some(page) = store.lookup(index) {
        page.zero_range(offset, len);
    }
}
