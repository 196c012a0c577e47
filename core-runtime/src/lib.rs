//! # Runtime Configuration & Logging
//!
//! Bootstrap concerns for the Aria backend: the [`config::CoreConfig`]
//! builder that collects the injected bridge implementations and storage
//! settings with fail-fast validation, and [`logging::init_logging`] for the
//! tracing subscriber.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LoggingConfig};
