//! Storage layer - the sparse page store and the byte paths into it.
//!
//! This module holds the contents of a device:
//! - [`PageStore`] - Sparse map from page index to page
//! - [`page`] - Page and page buffer types
//! - [`PageAllocator`] - Where page buffers come from
//! - [`copy`] - Two-phase writes and zero-filling reads
//! - [`discard`] - Range discard as in-place zeroing
//! - [`DeviceStats`] - Counters

mod allocator;
pub mod copy;
pub mod discard;
pub mod page;
mod page_store;
mod stats;

pub use allocator::{AllocTag, LimitedAllocator, PageAllocator, SystemAllocator};
pub use page_store::PageStore;
pub use stats::{DeviceStats, StatsSnapshot};
