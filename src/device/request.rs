//! Block I/O requests.
//!
//! A [`Request`] is a direction, a starting sector and an ordered list of
//! [`Segment`]s. Segments are processed in order; each one advances the
//! current sector by its length.

use crate::common::config::{SECTOR_SHIFT, SECTOR_SIZE};
use crate::common::{Error, Result};

/// Direction of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Copy device contents into the segments.
    Read,
    /// Copy the segments into the device.
    Write,
    /// Forget the contents of a sector range. Carries no segments.
    Discard,
}

/// One `(buffer, offset, len)` piece of a request.
///
/// For reads the bytes are filled in; for writes they are only read.
#[derive(Debug)]
pub struct Segment<'a> {
    buffer: &'a mut [u8],
    offset: usize,
    len: usize,
}

impl<'a> Segment<'a> {
    /// `len` bytes of `buffer` starting at `offset`.
    ///
    /// The range is validated when the segment is processed.
    pub fn new(buffer: &'a mut [u8], offset: usize, len: usize) -> Self {
        Self {
            buffer,
            offset,
            len,
        }
    }

    /// The whole of `buffer`.
    pub fn whole(buffer: &'a mut [u8]) -> Self {
        let len = buffer.len();
        Self::new(buffer, 0, len)
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the segment is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The addressed bytes.
    ///
    /// # Errors
    /// - `Error::InvalidSegment` if the range leaves the buffer or is not a
    ///   whole number of sectors
    pub(crate) fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        let buffer_len = self.buffer.len();
        let end = self.offset.checked_add(self.len);

        match end {
            Some(end) if end <= buffer_len && self.len % SECTOR_SIZE == 0 => {
                Ok(&mut self.buffer[self.offset..end])
            }
            _ => Err(Error::InvalidSegment {
                offset: self.offset,
                len: self.len,
                buffer_len,
            }),
        }
    }
}

/// A block I/O request.
///
/// # Example
/// ```
/// use brickdisk::device::{Op, Request, Segment};
///
/// let mut a = [0u8; 512];
/// let mut b = [0u8; 1024];
/// let request = Request::read(8)
///     .with_segment(Segment::whole(&mut a))
///     .with_segment(Segment::whole(&mut b));
///
/// assert_eq!(request.op(), Op::Read);
/// assert_eq!(request.size(), 1536);
/// assert_eq!(request.end_sector(), 11);
/// ```
#[derive(Debug)]
pub struct Request<'a> {
    op: Op,
    sector: u64,
    /// Byte length of a discard. Reads and writes are sized by segments.
    discard_len: u64,
    segments: Vec<Segment<'a>>,
}

impl<'a> Request<'a> {
    fn new(op: Op, sector: u64) -> Self {
        Self {
            op,
            sector,
            discard_len: 0,
            segments: Vec::new(),
        }
    }

    /// An empty read starting at `sector`.
    pub fn read(sector: u64) -> Self {
        Self::new(Op::Read, sector)
    }

    /// An empty write starting at `sector`.
    pub fn write(sector: u64) -> Self {
        Self::new(Op::Write, sector)
    }

    /// A discard of `len` bytes starting at `sector`.
    ///
    /// `len` must be a whole number of sectors and the request must carry no
    /// segments; otherwise processing fails with `Error::InvalidRequest`.
    pub fn discard(sector: u64, len: u64) -> Self {
        Self {
            discard_len: len,
            ..Self::new(Op::Discard, sector)
        }
    }

    /// Build a single-segment read or write.
    pub fn single(op: Op, sector: u64, segment: Segment<'a>) -> Self {
        Self::new(op, sector).with_segment(segment)
    }

    /// Append a segment. Only reads and writes may carry segments.
    pub fn push(&mut self, segment: Segment<'a>) {
        self.segments.push(segment);
    }

    /// Append a segment, builder style.
    pub fn with_segment(mut self, segment: Segment<'a>) -> Self {
        self.push(segment);
        self
    }

    /// Direction of the request.
    #[inline]
    pub fn op(&self) -> Op {
        self.op
    }

    /// First sector addressed.
    #[inline]
    pub fn sector(&self) -> u64 {
        self.sector
    }

    /// Total bytes addressed.
    pub fn size(&self) -> u64 {
        match self.op {
            Op::Discard => self.discard_len,
            Op::Read | Op::Write => self.segments.iter().map(|s| s.len() as u64).sum(),
        }
    }

    /// One past the last sector addressed.
    pub fn end_sector(&self) -> u64 {
        self.sector.saturating_add(self.size() >> SECTOR_SHIFT)
    }

    /// Check the request's shape before any segment is looked at.
    ///
    /// # Errors
    /// - `Error::InvalidRequest` for a discard with a partial sector or
    ///   with segments attached
    pub(crate) fn validate(&self) -> Result<()> {
        if self.op != Op::Discard {
            return Ok(());
        }
        if self.discard_len % SECTOR_SIZE as u64 != 0 {
            return Err(Error::InvalidRequest {
                reason: "discard length is not a whole number of sectors",
            });
        }
        if !self.segments.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "discard carries segments",
            });
        }
        Ok(())
    }

    /// The segments, in order.
    pub(crate) fn segments_mut(&mut self) -> &mut [Segment<'a>] {
        &mut self.segments
    }
}
