//! Server error types

use thiserror::Error;

/// Errors from the HTTP surface
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the configured address
    #[error("failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Runtime server error
    #[error("server error: {0}")]
    ServerError(String),
}
