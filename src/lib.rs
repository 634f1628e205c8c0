//! brickdisk - a RAM-backed block device with lazily allocated pages.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           brickdisk                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Registry (device/)                        │   │
//! │  │     create up front / on demand → remove → shutdown      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Device (device/)                         │   │
//! │  │   Request → range check → per-segment processing         │   │
//! │  │   OpenHandle counting · flush_and_reset · direct_access  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Copy paths (storage/)                       │   │
//! │  │   prepare_write (may allocate) → write (never allocates) │   │
//! │  │   read (absent = zero) · discard (zero, never free)      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              PageStore (storage/)                        │   │
//! │  │     PageIndex → Arc<Page>  +  PageAllocator              │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageIndex, DeviceId, Error, config)
//! - [`storage`] - Page store, allocators, copy and discard paths
//! - [`device`] - Devices, requests, open handles and the registry
//!
//! # Quick Start
//! ```
//! use brickdisk::device::{Op, Registry, RegistryConfig};
//! use brickdisk::{DeviceId, PAGE_SIZE};
//!
//! let registry = Registry::new(RegistryConfig::default()).unwrap();
//! let device = registry.get(DeviceId::new(0)).unwrap();
//! let handle = device.open();
//!
//! let mut page = vec![0xABu8; PAGE_SIZE];
//! handle.rw_page(0, &mut page, Op::Write).unwrap();
//!
//! let mut out = vec![0u8; PAGE_SIZE];
//! handle.rw_page(0, &mut out, Op::Read).unwrap();
//! assert_eq!(out, page);
//! ```

pub mod common;
pub mod device;
pub mod storage;

// Re-export commonly used items at crate root
pub use common::config::{PAGE_SECTORS, PAGE_SIZE, SECTOR_SIZE};
pub use common::{DeviceId, Error, PageIndex, Result};

pub use device::{Device, Op, OpenHandle, Registry, RegistryConfig, Request, Segment};
pub use storage::{DeviceStats, PageStore, StatsSnapshot};
