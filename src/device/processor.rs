//! Request processing.
//!
//! Every request goes through the same state machine:
//!
//! ```text
//!   Start ──range check──▶ IterateSegments ──all done──▶ Success
//!     │                        │
//!     └──── end > capacity ────┴──── first failure ────▶ Fail
//! ```
//!
//! A failed segment stops the request; segments already processed are not
//! rolled back and later ones are not attempted.

use std::sync::atomic::Ordering;

use crate::common::config::{PAGE_SIZE, SECTOR_SHIFT};
use crate::common::{Error, Result};
use crate::device::{Device, Op, Request, Segment};
use crate::storage::{copy, discard};

impl Device {
    /// Run a request to completion and return its single outcome.
    ///
    /// # Errors
    /// - `Error::OutOfRange` if the request ends past the device. No
    ///   segment is processed.
    /// - `Error::OutOfSpace` if a write cannot allocate a page
    /// - `Error::InvalidSegment` for a malformed segment
    /// - `Error::InvalidRequest` for a malformed discard. Nothing is touched.
    pub fn process(&self, request: Request<'_>) -> Result<()> {
        let op = request.op();
        let result = self.run(request);

        let counter = match (&result, op) {
            (Err(_), _) => &self.stats().failed_requests,
            (Ok(()), Op::Read) => &self.stats().reads,
            (Ok(()), Op::Write) => &self.stats().writes,
            (Ok(()), Op::Discard) => &self.stats().discards,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        result
    }

    /// Run a request and deliver its outcome to `done`.
    pub fn submit<F>(&self, request: Request<'_>, done: F)
    where
        F: FnOnce(Result<()>),
    {
        done(self.process(request));
    }

    /// Read or write exactly one page at `sector`.
    ///
    /// # Errors
    /// - `Error::InvalidSegment` if `page` is not page sized
    /// - Anything [`process`](Self::process) returns
    pub fn rw_page(&self, sector: u64, page: &mut [u8], op: Op) -> Result<()> {
        if page.len() != PAGE_SIZE {
            return Err(Error::InvalidSegment {
                offset: 0,
                len: PAGE_SIZE,
                buffer_len: page.len(),
            });
        }

        let request = match op {
            Op::Discard => Request::discard(sector, PAGE_SIZE as u64),
            Op::Read | Op::Write => Request::single(op, sector, Segment::whole(page)),
        };
        self.process(request)
    }

    fn run(&self, mut request: Request<'_>) -> Result<()> {
        request.validate()?;
        self.check_range(request.end_sector())?;

        let op = request.op();
        let mut sector = request.sector();

        if op == Op::Discard {
            return discard::discard(self.store(), sector, request.size());
        }

        for segment in request.segments_mut() {
            let bytes = segment.bytes_mut()?;
            let sectors = (bytes.len() >> SECTOR_SHIFT) as u64;
            self.do_segment(op, bytes, sector)?;
            sector += sectors;
        }

        Ok(())
    }

    /// Move one segment's bytes. Writes allocate first, then copy.
    fn do_segment(&self, op: Op, bytes: &mut [u8], sector: u64) -> Result<()> {
        match op {
            Op::Write => {
                copy::prepare_write(self.store(), sector, bytes.len())?;
                copy::write(self.store(), bytes, sector);
            }
            Op::Read => copy::read(bytes, self.store(), sector),
            Op::Discard => unreachable!("discard has no segments"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{DeviceId, PageIndex};
    use crate::storage::{LimitedAllocator, SystemAllocator};
    use std::sync::Arc;

    fn create_test_device() -> Device {
        Device::create(DeviceId::new(0), 2048, Arc::new(SystemAllocator))
    }

    #[test]
    fn test_multi_segment_write_advances_sector() {
        let device = create_test_device();
        let mut a = vec![0x11u8; 512];
        let mut b = vec![0x22u8; 1024];

        device
            .process(
                Request::write(6)
                    .with_segment(Segment::whole(&mut a))
                    .with_segment(Segment::whole(&mut b)),
            )
            .unwrap();

        let mut out = vec![0u8; 1536];
        device
            .process(Request::read(6).with_segment(Segment::whole(&mut out)))
            .unwrap();
        assert!(out[..512].iter().all(|&x| x == 0x11));
        assert!(out[512..].iter().all(|&x| x == 0x22));
    }

    #[test]
    fn test_segment_offset_into_buffer() {
        let device = create_test_device();
        let mut src = vec![0u8; 2048];
        src[512..1024].fill(0x33);

        device
            .process(Request::write(0).with_segment(Segment::new(&mut src, 512, 512)))
            .unwrap();

        let mut out = vec![0xFFu8; 1024];
        device
            .process(Request::read(0).with_segment(Segment::new(&mut out, 512, 512)))
            .unwrap();
        assert!(out[..512].iter().all(|&x| x == 0xFF));
        assert!(out[512..].iter().all(|&x| x == 0x33));
    }

    #[test]
    fn test_out_of_range_touches_nothing() {
        let device = create_test_device();
        let mut data = vec![0xAAu8; 20 * 512];

        let err = device
            .process(Request::write(2040).with_segment(Segment::whole(&mut data)))
            .unwrap_err();

        assert_eq!(
            err,
            Error::OutOfRange {
                end: 2060,
                capacity: 2048
            }
        );
        assert!(device.store().is_empty());
        assert_eq!(device.stats().snapshot().failed_requests, 1);
    }

    #[test]
    fn test_first_failure_stops_request() {
        let device = Device::create(DeviceId::new(0), 2048, Arc::new(LimitedAllocator::new(1)));
        let mut a = vec![0x01u8; PAGE_SIZE];
        let mut b = vec![0x02u8; PAGE_SIZE];
        let mut c = vec![0x03u8; PAGE_SIZE];

        let err = device
            .process(
                Request::write(0)
                    .with_segment(Segment::whole(&mut a))
                    .with_segment(Segment::whole(&mut b))
                    .with_segment(Segment::whole(&mut c)),
            )
            .unwrap_err();

        assert_eq!(
            err,
            Error::OutOfSpace {
                index: PageIndex::new(1)
            }
        );
        // First segment landed and stays
        assert_eq!(device.store().indices(), vec![PageIndex::new(0)]);
        let mut out = vec![0u8; PAGE_SIZE];
        device.rw_page(0, &mut out, Op::Read).unwrap();
        assert!(out.iter().all(|&x| x == 0x01));
    }

    #[test]
    fn test_invalid_segment_fails_request() {
        let device = create_test_device();
        let mut buf = vec![0u8; 100];

        let err = device
            .process(Request::write(0).with_segment(Segment::whole(&mut buf)))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidSegment { len: 100, .. }));
        assert!(device.store().is_empty());
    }

    #[test]
    fn test_discard_request() {
        let device = create_test_device();
        let mut page = vec![0x41u8; PAGE_SIZE];
        device.rw_page(0, &mut page, Op::Write).unwrap();

        device.process(Request::discard(0, 2 * PAGE_SIZE as u64)).unwrap();

        device.rw_page(0, &mut page, Op::Read).unwrap();
        assert!(page.iter().all(|&x| x == 0));
        assert_eq!(device.stats().snapshot().discards, 1);
    }

    #[test]
    fn test_discard_partial_sector_rejected() {
        let device = create_test_device();
        let mut page = vec![0x41u8; PAGE_SIZE];
        device.rw_page(2040, &mut page, Op::Write).unwrap();

        // Would reach 100 bytes past the last whole sector it claims
        let err = device
            .process(Request::discard(2040, PAGE_SIZE as u64 - 412))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidRequest { .. }));
        device.rw_page(2040, &mut page, Op::Read).unwrap();
        assert!(page.iter().all(|&x| x == 0x41));
        assert_eq!(device.stats().snapshot().failed_requests, 1);
    }

    #[test]
    fn test_discard_with_segments_rejected() {
        let device = create_test_device();
        let mut page = vec![0x41u8; PAGE_SIZE];
        device.rw_page(0, &mut page, Op::Write).unwrap();

        let mut extra = vec![0u8; 512];
        let err = device
            .process(Request::discard(0, PAGE_SIZE as u64).with_segment(Segment::whole(&mut extra)))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidRequest { .. }));
        device.rw_page(0, &mut page, Op::Read).unwrap();
        assert!(page.iter().all(|&x| x == 0x41));
    }

    #[test]
    fn test_rw_page_requires_page_sized_buffer() {
        let device = create_test_device();
        let mut small = vec![0u8; 512];

        assert!(device.rw_page(0, &mut small, Op::Read).is_err());
    }

    #[test]
    fn test_rw_page_discard() {
        let device = create_test_device();
        let mut page = vec![0x7Eu8; PAGE_SIZE];
        device.rw_page(8, &mut page, Op::Write).unwrap();

        device.rw_page(8, &mut page, Op::Discard).unwrap();

        assert!(device.store().lookup(PageIndex::new(1)).unwrap().is_zeroed());
    }

    #[test]
    fn test_submit_delivers_outcome() {
        let device = create_test_device();
        let mut buf = vec![0u8; 512];
        let mut outcome = None;

        device.submit(
            Request::read(4096).with_segment(Segment::whole(&mut buf)),
            |result| outcome = Some(result),
        );

        assert!(matches!(outcome, Some(Err(Error::OutOfRange { .. }))));
    }

    #[test]
    fn test_stats_per_request() {
        let device = create_test_device();
        let mut page = vec![0u8; PAGE_SIZE];

        device.rw_page(0, &mut page, Op::Write).unwrap();
        device.rw_page(0, &mut page, Op::Read).unwrap();
        device.rw_page(8, &mut page, Op::Read).unwrap();

        let snapshot = device.stats().snapshot();
        assert_eq!(snapshot.writes, 1);
        assert_eq!(snapshot.reads, 2);
        assert_eq!(snapshot.pages_allocated, 1);
    }
}
