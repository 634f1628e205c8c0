//! Page types.
//!
//! This module contains:
//! - [`Page`] - A backing page tagged with its index
//! - [`PageBuf`] - The raw 4KB zero-initialized buffer inside a page

#[allow(clippy::module_inception)]
mod page;
mod page_buf;

pub use page::Page;
pub use page_buf::PageBuf;
