//! Error types for API calls

use transport::StatusCode;

/// Errors from API calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Token refresh failed; the call was not attempted
    #[error(transparent)]
    Auth(#[from] ccb_auth::Error),

    /// The API answered with something other than 200
    #[error("status: {status}, body {body}")]
    Api { status: StatusCode, body: String },

    #[error(transparent)]
    Transport(#[from] transport::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for API calls.
pub type Result<T> = std::result::Result<T, Error>;
