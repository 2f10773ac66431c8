//! Error types for the tracker core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiferError {
    #[error("No identity set. Create an identity statement first.")]
    NoIdentity,

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LiferError>;
