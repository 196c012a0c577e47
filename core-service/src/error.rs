use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Catalog(#[from] core_catalog::CatalogError),

    #[error(transparent)]
    Billing(#[from] core_billing::BillingError),

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
