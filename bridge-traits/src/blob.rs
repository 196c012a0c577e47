//! Blob storage abstraction.
//!
//! Audio files and cover images are stored outside the catalog database; the
//! catalog only keeps the URL returned by the store. The core validates file
//! constraints (extension, size, emptiness) *before* calling [`BlobStore::put`],
//! so implementations may assume the payload is acceptable and only have to
//! report transport/storage failures.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Durable byte storage returning a public URL per stored object.
///
/// Implementations decide the key layout; `suggested_name` is the client's
/// original file name and should be incorporated into the final key so that
/// the resulting URL stays recognizable.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` and return the URL under which it is reachable.
    ///
    /// A failed upload must not leave a partially stored object that the
    /// returned URL would point at.
    async fn put(&self, data: Bytes, suggested_name: &str) -> Result<String>;

    /// Delete a previously stored object by its URL.
    ///
    /// Deleting an unknown URL is a no-op, not an error.
    async fn delete(&self, url: &str) -> Result<()>;
}
