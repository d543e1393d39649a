//! Error types raised at the host boundary (config, frames, logging).
//!
//! The selection and interaction core itself never fails; it reports outcomes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PickupError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, PickupError>;
