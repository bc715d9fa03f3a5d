// Error types for the remote SVG cache.
// Covers retrieval, persistence, and configuration failures.

use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteSvgError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} while fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Store error: {0}")]
    Store(String),

    /// A failure shared between every waiter of one deduplicated retrieval.
    #[error("Retrieval failed: {0}")]
    Retrieval(Arc<RemoteSvgError>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RemoteSvgError>;
