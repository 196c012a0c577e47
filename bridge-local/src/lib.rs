//! Local implementations of the Aria bridge traits.
//!
//! These back the core during development and testing without any external
//! infrastructure:
//!
//! - [`FsBlobStore`] - blobs on the local filesystem, served as `file://` URLs
//! - [`MemoryBlobStore`] - blobs in process memory, for tests
//! - [`MemoryBillingProvider`] - an in-process billing provider that accepts
//!   every request and remembers what it was asked to do

pub mod billing;
pub mod blob;

pub use billing::MemoryBillingProvider;
pub use blob::{FsBlobStore, MemoryBlobStore};
