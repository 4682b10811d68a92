use std::io;
use thiserror::Error;

/// Errors raised around the classifier. Classification itself never fails:
/// a broken handshake is reported as an `invalid` flow, not as an error.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error), // Wrapper around std::io::Error

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error), // Wrapper around serde_json::Error

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
