//! Scriptable transport for tests.
//!
//! `MockTransport` answers each request with a caller-supplied closure and
//! records every request it sees, so tests can assert on the exact wire
//! request and on how many times the transport was invoked.

use crate::{Error, HttpRequest, HttpResponse, Result, StatusCode, Transport};
use bytes::Bytes;
use futures_util::stream;
use reqwest::header::HeaderMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

pub struct MockTransport {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of times `execute` was called.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of requests whose URL ends with `suffix`.
    pub fn calls_to(&self, suffix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .count()
    }
}

impl Transport for MockTransport {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + '_>> {
        let result = (self.handler)(&request);
        self.requests.lock().unwrap().push(request);
        Box::pin(async move { result })
    }
}

/// A complete response with the given status and body.
pub fn response(status: u16, body: impl Into<Bytes>) -> HttpResponse {
    let body: Bytes = body.into();
    HttpResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: HeaderMap::new(),
        body: Box::pin(stream::iter(vec![Ok(body)])),
    }
}

/// A response whose body stream fails with `BodyRead(message)`.
pub fn failing_body(status: u16, message: &str) -> HttpResponse {
    HttpResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: HeaderMap::new(),
        body: Box::pin(stream::iter(vec![Err(Error::BodyRead(message.to_string()))])),
    }
}
