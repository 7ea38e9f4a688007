//! HTTP transport abstraction for the CCB client
//!
//! Defines the `Transport` trait the token and API layers send requests through.
//! `ReqwestTransport` is the production implementation; `mock::MockTransport`
//! (feature `test-util`) lets tests script responses without a network.
//!
//! Response bodies are exposed as a stream so that a failure while reading the
//! body is distinguishable from a failure to get a response at all.

pub mod reqwest_transport;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use reqwest::header;
pub use reqwest::{Method, StatusCode};
pub use reqwest_transport::ReqwestTransport;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default per-request timeout applied by `ReqwestTransport`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No response was obtained (connection refused, DNS, TLS, ...)
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The response started but its body stream failed
    #[error("reading response body: {0}")]
    BodyRead(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Streamed response body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// An outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A response whose body has not been read yet.
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl HttpResponse {
    /// Read the whole body. The first stream error is returned as-is.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Sends HTTP requests on behalf of the token and API layers.
///
/// Uses a `Pin<Box<dyn Future>>` return type so implementations can be shared
/// as `Arc<dyn Transport>`. Implementations must not retry: one call to
/// `execute` is one request on the wire.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + '_>>;
}
