//! Core configuration.
//!
//! A builder collects everything the service layer needs to start: where the
//! database lives, pool sizing, and the two external bridges. Validation is
//! fail-fast with actionable messages, so a missing bridge is caught at
//! startup rather than on first use.

use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::{BillingProvider, BlobStore};

use crate::error::{Error, Result};

/// Validated configuration for the Aria backend core.
#[derive(Clone)]
pub struct CoreConfig {
    /// Database file path; `None` selects an in-memory database.
    pub database_path: Option<PathBuf>,

    /// Maximum connections in the pool.
    pub max_connections: u32,

    /// Whether the default subscription plans are seeded at startup.
    pub seed_plans: bool,

    /// Blob store for audio files and cover images (required).
    pub blob_store: Arc<dyn BlobStore>,

    /// Payment provider for subscriptions (required).
    pub billing_provider: Arc<dyn BillingProvider>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("max_connections", &self.max_connections)
            .field("seed_plans", &self.seed_plans)
            .field("blob_store", &"<dyn BlobStore>")
            .field("billing_provider", &"<dyn BillingProvider>")
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    max_connections: Option<u32>,
    seed_plans: bool,
    blob_store: Option<Arc<dyn BlobStore>>,
    billing_provider: Option<Arc<dyn BillingProvider>>,
}

impl CoreConfigBuilder {
    /// Set the database file path. Without this, the database is in-memory.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Seed the default subscription plans at startup.
    pub fn seed_plans(mut self, seed: bool) -> Self {
        self.seed_plans = seed;
        self
    }

    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn billing_provider(mut self, provider: Arc<dyn BillingProvider>) -> Self {
        self.billing_provider = Some(provider);
        self
    }

    pub fn build(self) -> Result<CoreConfig> {
        let blob_store = self.blob_store.ok_or_else(|| {
            Error::Config(
                "no blob store configured; pass one with CoreConfigBuilder::blob_store \
                 (bridge-local provides FsBlobStore for development)"
                    .to_string(),
            )
        })?;
        let billing_provider = self.billing_provider.ok_or_else(|| {
            Error::Config(
                "no billing provider configured; pass one with \
                 CoreConfigBuilder::billing_provider (bridge-local provides \
                 MemoryBillingProvider for development)"
                    .to_string(),
            )
        })?;

        let max_connections = self.max_connections.unwrap_or(5);
        if max_connections == 0 {
            return Err(Error::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }

        Ok(CoreConfig {
            database_path: self.database_path,
            max_connections,
            seed_plans: self.seed_plans,
            blob_store,
            billing_provider,
        })
    }
}
