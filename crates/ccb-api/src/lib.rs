//! Authenticated calls against the CCB REST API
//!
//! `ApiClient::call()` makes sure the token is fresh (refreshing through the
//! token guardian when needed), sends the request with the Bearer token and the
//! versioned `Accept` header, and returns the raw body of a 200 response.
//! Decoding the JSON is left to the caller.

pub mod client;
pub mod error;
mod metrics;

pub use client::ApiClient;
pub use error::{Error, Result};
pub use transport::Method;
