use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("billing provider error: {0}")]
    Billing(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
