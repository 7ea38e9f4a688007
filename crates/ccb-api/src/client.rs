//! The authenticated call path
//!
//! validate/refresh token -> build request -> one transport call -> read body
//! -> 200 or `Api` error. No retries, no partial success: a 201 or 204 is as
//! much a failure as a 500.

use std::sync::Arc;

use bytes::Bytes;
use ccb_auth::{ACCEPT_MEDIA_TYPE, Credentials, Endpoints, SharedToken, Token, TokenGuardian};
use tracing::{debug, warn};
use transport::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use transport::{HttpRequest, Method, StatusCode, Transport};

use crate::error::{Error, Result};
use crate::metrics;

/// Client for the CCB REST API.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    guardian: TokenGuardian,
    endpoints: Endpoints,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            guardian: TokenGuardian::new(transport.clone(), endpoints.clone()),
            transport,
            endpoints,
        }
    }

    pub fn guardian(&self) -> &TokenGuardian {
        &self.guardian
    }

    /// Call `method path` with `token`, refreshing it first if needed.
    ///
    /// A refresh updates `token` in place even if the call itself then fails,
    /// so callers should persist the token regardless of the outcome.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        token: &mut Token,
        credentials: &Credentials,
    ) -> Result<Bytes> {
        self.guardian.ensure_valid(token, credentials).await?;
        self.send(method, path, &token.access_token).await
    }

    /// `call` for a token shared between tasks.
    ///
    /// The token lock is held only while validating/refreshing, not for the
    /// API request itself.
    pub async fn call_shared(
        &self,
        method: Method,
        path: &str,
        token: &SharedToken,
        credentials: &Credentials,
    ) -> Result<Bytes> {
        let access_token = self.guardian.ensure_valid_shared(token, credentials).await?;
        self.send(method, path, &access_token).await
    }

    async fn send(&self, method: Method, path: &str, access_token: &str) -> Result<Bytes> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {access_token}"))
                .map_err(|e| Error::InvalidRequest(format!("invalid access token: {e}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MEDIA_TYPE));

        let request = HttpRequest {
            method: method.clone(),
            url: self.endpoints.resource_url(path),
            headers,
            body: None,
        };
        debug!(%method, path, "calling API");

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_transport_error(method.as_str());
                warn!(%method, path, error = %e, "API request failed");
                return Err(e.into());
            }
        };

        let status = response.status;
        let body = response.bytes().await?;
        metrics::record_request(method.as_str(), status.as_u16());

        if status != StatusCode::OK {
            warn!(%method, path, status = status.as_u16(), "API returned non-200 status");
            return Err(Error::Api {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body)
    }
}
