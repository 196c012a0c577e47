//! Blob store implementations backed by the local filesystem and memory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use bridge_traits::{BlobStore, BridgeError, Result};
use bytes::Bytes;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Filesystem-backed blob store.
///
/// Objects are written under a root directory with a random prefix so that
/// distinct uploads of the same file name never collide. The returned URL is
/// a `file://` URL pointing at the written object.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix("file://")
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, data: Bytes, suggested_name: &str) -> Result<String> {
        let key = format!("{}-{}", Uuid::new_v4(), sanitize(suggested_name));
        let path = self.root.join(&key);

        fs::create_dir_all(&self.root).await?;
        fs::write(&path, &data).await?;

        debug!(key = %key, bytes = data.len(), "stored blob");
        Ok(format!("file://{}", path.display()))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let Some(path) = self.path_for_url(url) else {
            return Ok(());
        };
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }
}

/// Strip path separators from a client-supplied file name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// In-memory blob store for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch a stored object back by its URL.
    pub fn get(&self, url: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(url).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: Bytes, suggested_name: &str) -> Result<String> {
        let url = format!("mem://{}/{}", Uuid::new_v4(), sanitize(suggested_name));
        self.objects.lock().unwrap().insert(url.clone(), data);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(url);
        Ok(())
    }
}
