//! Common types and utilities shared across brickdisk.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Geometry constants
//! - Error types
//! - Identifiers (PageIndex, DeviceId)

pub mod config;
pub mod error;
mod device_id;
mod page_index;

pub use config::sector_offset;
pub use device_id::DeviceId;
pub use error::{Error, Result};
pub use page_index::PageIndex;
