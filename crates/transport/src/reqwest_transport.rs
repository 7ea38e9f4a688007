//! Production transport backed by a shared `reqwest::Client`.
//!
//! Every request carries an explicit timeout; nothing falls back to the
//! client's defaults.

use crate::{Error, HttpRequest, HttpResponse, Result, Transport};
use futures_util::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// `Transport` over `reqwest`, one attempt per request.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), crate::DEFAULT_TIMEOUT)
    }
}

impl Transport for ReqwestTransport {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + '_>> {
        Box::pin(async move {
            debug!(method = %request.method, url = %request.url, "sending request");

            let mut builder = self
                .client
                .request(request.method, &request.url)
                .headers(request.headers)
                .timeout(self.timeout);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.timeout)
                } else {
                    Error::Request(e.to_string())
                }
            })?;

            let status = response.status();
            let headers = response.headers().clone();
            let timeout = self.timeout;
            let body = response.bytes_stream().map(move |chunk| {
                chunk.map_err(|e| {
                    if e.is_timeout() {
                        Error::Timeout(timeout)
                    } else {
                        Error::BodyRead(e.to_string())
                    }
                })
            });

            debug!(status = status.as_u16(), "received response");
            Ok(HttpResponse {
                status,
                headers,
                body: Box::pin(body),
            })
        })
    }
}
