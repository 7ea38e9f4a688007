//! Error types for authorization, refresh, and token storage

use std::time::Duration;

use transport::StatusCode;

/// Errors from OAuth operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind callback listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out waiting for OAuth authorization after {}s", .0.as_secs())]
    AuthorizationTimeout(Duration),

    #[error("token request failed: {status}, body {body}")]
    TokenExchange { status: StatusCode, body: String },

    #[error("token refresh failed: {status}, body {body}")]
    Refresh { status: StatusCode, body: String },

    /// Network-level failure, passed through from the transport unchanged.
    #[error(transparent)]
    Transport(#[from] transport::Error),

    #[error("failed to parse token response: {0}")]
    Decode(String),

    #[error("no authorization code to exchange")]
    MissingCode,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("token file parse error: {0}")]
    TokenParse(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
