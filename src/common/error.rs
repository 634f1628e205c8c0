//! Error types for brickdisk.

use thiserror::Error;

use super::{DeviceId, PageIndex};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All recoverable errors in brickdisk.
///
/// Broken internal invariants (a page missing during the copy phase, a page
/// reachable under the wrong index) are not represented here: they panic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A backing page could not be allocated.
    #[error("no space to allocate {index}")]
    OutOfSpace { index: PageIndex },

    /// The request reaches past the end of the device.
    #[error("sector range ends at {end}, capacity is {capacity}")]
    OutOfRange { end: u64, capacity: u64 },

    /// A destructive operation was attempted while the device is in use.
    #[error("device busy: {openers} openers attached")]
    Busy { openers: u32 },

    /// Direct access requires a page-aligned sector.
    #[error("sector {sector} is not page aligned")]
    Misaligned { sector: u64 },

    /// A segment does not fit its buffer or is not a whole number of sectors.
    #[error("invalid segment: offset {offset} len {len} in buffer of {buffer_len}")]
    InvalidSegment {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },

    /// The request itself is malformed: a discard that is not a whole
    /// number of sectors, or a discard carrying segments.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: &'static str },

    /// Registry configuration was rejected.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// No device is registered under this id.
    #[error("no such device: {0}")]
    NoSuchDevice(DeviceId),

    /// On-demand creation would exceed the configured device count.
    #[error("{id} exceeds device limit {limit}")]
    DeviceLimit { id: DeviceId, limit: u32 },
}

impl Error {
    /// The negative errno a block layer would complete the request with.
    pub fn errno(&self) -> i32 {
        match self {
            Error::OutOfSpace { .. } => -28,      // ENOSPC
            Error::OutOfRange { .. } => -5,       // EIO
            Error::Busy { .. } => -16,            // EBUSY
            Error::Misaligned { .. } => -22,      // EINVAL
            Error::InvalidSegment { .. } => -22,  // EINVAL
            Error::InvalidRequest { .. } => -22,  // EINVAL
            Error::InvalidConfig(_) => -22,       // EINVAL
            Error::NoSuchDevice(_) => -19,        // ENODEV
            Error::DeviceLimit { .. } => -6,      // ENXIO
        }
    }
}
