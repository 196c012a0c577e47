use bridge_traits::BridgeError;
use core_catalog::CatalogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("billing provider failure: {0}")]
    Provider(#[from] BridgeError),

    #[error("unknown or inactive plan: {0}")]
    UnknownPlan(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("no active subscription")]
    NoActiveSubscription,

    #[error("stored plan data is corrupt: {0}")]
    CorruptPlan(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BillingError>;
