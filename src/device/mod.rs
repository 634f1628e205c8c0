//! Device layer - block devices, their requests, and the registry.
//!
//! # Components
//! - [`Device`] - One RAM disk: capacity, page store, open count
//! - [`OpenHandle`] - RAII open reference
//! - [`Request`] / [`Segment`] - Block I/O requests
//! - [`Registry`] - Creates, finds and destroys devices

#[allow(clippy::module_inception)]
mod device;
mod handle;
mod processor;
mod registry;
mod request;

pub use device::{Device, NoCache, UpperCache};
pub use handle::OpenHandle;
pub use registry::{Registry, RegistryConfig};
pub use request::{Op, Request, Segment};
