//! Service façade and bootstrap for the Aria backend core.
//!
//! [`AriaService::init`] turns a validated [`CoreConfig`] into a running
//! core: it opens the pool, applies migrations, optionally seeds the plan
//! catalog, and wires the repositories and services over the shared pool.
//! Hosts (an HTTP layer, a worker, tests) hold one `AriaService` and reach
//! everything through it.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use core_billing::{PlanRepository, SqlitePlanRepository, SubscriptionService};
use core_catalog::db::{self, DatabaseConfig};
use core_catalog::ingest::UploadService;
use core_catalog::ledger::InteractionLedger;
use core_catalog::query::CatalogQueryService;
use core_catalog::repositories::{
    SqliteAlbumRepository, SqliteGenreRepository, SqliteUserRepository,
};
use core_runtime::CoreConfig;

/// The assembled backend core.
#[derive(Clone)]
pub struct AriaService {
    pool: SqlitePool,
    users: Arc<SqliteUserRepository>,
    genres: Arc<SqliteGenreRepository>,
    albums: Arc<SqliteAlbumRepository>,
    ledger: InteractionLedger,
    query: CatalogQueryService,
    uploads: Arc<UploadService>,
    subscriptions: Arc<SubscriptionService>,
}

impl AriaService {
    /// Build the core from a validated configuration.
    pub async fn init(config: CoreConfig) -> Result<Self> {
        let database = match &config.database_path {
            Some(path) => {
                DatabaseConfig::new(path).max_connections(config.max_connections)
            }
            None => DatabaseConfig::in_memory(),
        };
        let pool = db::create_pool(database).await?;

        if config.seed_plans {
            SqlitePlanRepository::new(pool.clone())
                .seed_defaults()
                .await?;
        }

        let uploads = Arc::new(UploadService::new(pool.clone(), config.blob_store.clone()));
        let subscriptions = Arc::new(SubscriptionService::new(
            pool.clone(),
            config.billing_provider.clone(),
        ));

        info!("aria core initialized");
        Ok(Self {
            users: Arc::new(SqliteUserRepository::new(pool.clone())),
            genres: Arc::new(SqliteGenreRepository::new(pool.clone())),
            albums: Arc::new(SqliteAlbumRepository::new(pool.clone())),
            ledger: InteractionLedger::new(pool.clone()),
            query: CatalogQueryService::new(pool.clone()),
            uploads,
            subscriptions,
            pool,
        })
    }

    /// The underlying pool, for hosts that need raw access (e.g. health
    /// endpoints).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn users(&self) -> &SqliteUserRepository {
        &self.users
    }

    pub fn genres(&self) -> &SqliteGenreRepository {
        &self.genres
    }

    pub fn albums(&self) -> &SqliteAlbumRepository {
        &self.albums
    }

    pub fn ledger(&self) -> &InteractionLedger {
        &self.ledger
    }

    pub fn query(&self) -> &CatalogQueryService {
        &self.query
    }

    pub fn uploads(&self) -> &UploadService {
        &self.uploads
    }

    pub fn subscriptions(&self) -> &SubscriptionService {
        &self.subscriptions
    }
}
