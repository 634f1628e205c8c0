//! Byte copies between caller buffers and a [`PageStore`].
//!
//! Writes are two-phase:
//! 1. [`prepare_write`] makes sure every page the range touches exists.
//!    It may block and allocate.
//! 2. [`write`] copies the bytes in. It only looks pages up, so it never
//!    blocks behind an allocation and never allocates.
//!
//! [`read`] is single-phase and never allocates either: absent pages read
//! as zeroes without being created.
//!
//! ```text
//!              sector 1007 (offset 3584)
//!                      │◄──── 600 bytes ────►│
//! ┌────────────────────┬──────────┬──────────┬──────────────────┐
//! │           page 125            │           page 126          │
//! └────────────────────┴──────────┴──────────┴──────────────────┘
//!                      │ 512 bytes│ 88 bytes │
//!                                 ▲ page boundary
//! ```

use crate::common::config::{sector_offset, PAGE_SIZE};
use crate::common::{PageIndex, Result};
use crate::storage::PageStore;

/// One page-sized-or-smaller piece of a byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Page the piece falls in.
    pub index: PageIndex,
    /// Byte offset of the piece within that page.
    pub offset: usize,
    /// Length of the piece in bytes.
    pub len: usize,
    /// Byte offset of the piece from the start of the range.
    pub pos: u64,
}

impl Span {
    /// Whether the piece covers its whole page.
    #[inline]
    pub fn is_full_page(&self) -> bool {
        self.offset == 0 && self.len == PAGE_SIZE
    }
}

/// Splits `[sector, sector + len bytes)` at page boundaries.
///
/// Iterating never allocates.
#[derive(Debug, Clone)]
pub struct Spans {
    index: PageIndex,
    offset: usize,
    pos: u64,
    len: u64,
}

impl Spans {
    /// Spans covering `len` bytes starting at `sector`.
    pub fn new(sector: u64, len: u64) -> Self {
        Self {
            index: PageIndex::of_sector(sector),
            offset: sector_offset(sector),
            pos: 0,
            len,
        }
    }
}

impl Iterator for Spans {
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        if self.pos >= self.len {
            return None;
        }

        let remaining = self.len - self.pos;
        let len = remaining.min((PAGE_SIZE - self.offset) as u64) as usize;
        let span = Span {
            index: self.index,
            offset: self.offset,
            len,
            pos: self.pos,
        };

        self.pos += len as u64;
        self.index = self.index.next();
        self.offset = 0;

        Some(span)
    }
}

/// Make sure every page that `len` bytes at `sector` touch is resident.
///
/// Must precede [`write`] for the same range. May block and allocate.
///
/// # Errors
/// - `Error::OutOfSpace` if a page cannot be allocated. Pages ensured
///   before the failure stay resident; they read as zeroes until written.
pub fn prepare_write(store: &PageStore, sector: u64, len: usize) -> Result<()> {
    for span in Spans::new(sector, len as u64) {
        store.ensure(span.index)?;
    }
    Ok(())
}

/// Copy `src` into the store at `sector`. Does not block or allocate.
///
/// # Panics
/// Panics if a page in range is missing, i.e. [`prepare_write`] was not
/// called (or failed) for this range.
pub fn write(store: &PageStore, src: &[u8], sector: u64) {
    for span in Spans::new(sector, src.len() as u64) {
        let page = match store.lookup(span.index) {
            Some(page) => page,
            None => panic!("{} missing during write; prepare_write not called", span.index),
        };
        let pos = span.pos as usize;
        page.write_at(span.offset, &src[pos..pos + span.len]);
    }
}

/// Copy `dst.len()` bytes at `sector` out of the store. Does not block or
/// allocate; absent pages produce zeroes.
pub fn read(dst: &mut [u8], store: &PageStore, sector: u64) {
    for span in Spans::new(sector, dst.len() as u64) {
        let pos = span.pos as usize;
        let out = &mut dst[pos..pos + span.len];
        match store.lookup(span.index) {
            Some(page) => page.read_at(span.offset, out),
            None => out.fill(0),
        }
    }
}
