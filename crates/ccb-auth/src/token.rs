//! Tokens and the token endpoint
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (end of the interactive flow)
//! 2. Token refresh (driven by the guardian)
//!
//! Both POST a form body to the token endpoint with HTTP Basic auth and decode
//! the same JSON response. The endpoint reports expiry as a relative
//! `expires_in`; it is converted to an absolute `expires_at` exactly once, in
//! `Token::from_response`.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;
use transport::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use transport::{HttpRequest, Method, StatusCode, Transport};

use crate::credentials::Credentials;
use crate::endpoints::{ACCEPT_MEDIA_TYPE, Endpoints};
use crate::error::{Error, Result};

/// Safety margin before `expires_at` after which a token counts as expired.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// An access/refresh token pair with an absolute expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    /// Advisory only (e.g. "Bearer")
    #[serde(default)]
    pub token_type: String,
    /// Unix timestamp in seconds
    pub expires_at: i64,
}

/// Token endpoint response body.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// May be omitted on refresh, in which case the old one stays in use
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: i64,
}

impl Token {
    /// Build a token from an endpoint response received at `now` (unix seconds).
    pub fn from_response(response: TokenResponse, now: i64) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response.token_type,
            expires_at: now.saturating_add(response.expires_in),
        }
    }

    /// Whether the token is usable at `now`: strictly before
    /// `expires_at - EXPIRY_MARGIN`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        now < self.expires_at.saturating_sub(EXPIRY_MARGIN.as_secs() as i64)
    }

    /// Overwrite the credentials and expiry from a refresh response.
    /// `token_type` is left as it was, and so is `refresh_token` when the
    /// response does not carry a new one.
    pub(crate) fn apply_refresh(&mut self, response: TokenResponse, now: i64) {
        self.access_token = response.access_token;
        if !response.refresh_token.is_empty() {
            self.refresh_token = response.refresh_token;
        }
        self.expires_at = now.saturating_add(response.expires_in);
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Current time as unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Exchange the authorization code held in `credentials` for a token.
///
/// The code is taken out of `credentials`, so a second exchange with the same
/// credentials fails with `MissingCode` instead of replaying the code.
pub async fn exchange_code(
    transport: &dyn Transport,
    endpoints: &Endpoints,
    credentials: &mut Credentials,
) -> Result<Token> {
    let code = credentials.code.take().ok_or(Error::MissingCode)?;
    let request = token_request(
        endpoints,
        credentials,
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", credentials.redirect_uri.as_str()),
            ("subdomain", credentials.subdomain.as_str()),
        ],
    )?;

    let (status, body) = post(transport, request).await?;
    if status != StatusCode::OK {
        return Err(Error::TokenExchange {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    let response = decode(&body)?;
    debug!(expires_in = response.expires_in, "authorization code exchanged");
    Ok(Token::from_response(response, unix_now()))
}

/// Ask the token endpoint for a new token using `refresh`.
///
/// Non-200 responses become `Refresh { status, body }`.
pub async fn request_refresh(
    transport: &dyn Transport,
    endpoints: &Endpoints,
    credentials: &Credentials,
    refresh: &str,
) -> Result<TokenResponse> {
    let request = token_request(
        endpoints,
        credentials,
        &[("grant_type", "refresh_token"), ("refresh_token", refresh)],
    )?;

    let (status, body) = post(transport, request).await?;
    if status != StatusCode::OK {
        return Err(Error::Refresh {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    decode(&body)
}

/// Form-encoded POST to the token endpoint with Basic auth.
fn token_request(
    endpoints: &Endpoints,
    credentials: &Credentials,
    form: &[(&str, &str)],
) -> Result<HttpRequest> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form)
        .finish();

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MEDIA_TYPE));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&credentials.basic_auth())
            .map_err(|e| Error::InvalidRequest(format!("invalid client credentials: {e}")))?,
    );

    Ok(HttpRequest {
        method: Method::POST,
        url: endpoints.token_url.clone(),
        headers,
        body: Some(Bytes::from(body)),
    })
}

/// Send and read the full body; transport errors pass through unchanged.
async fn post(transport: &dyn Transport, request: HttpRequest) -> Result<(StatusCode, Bytes)> {
    let response = transport.execute(request).await?;
    let status = response.status;
    let body = response.bytes().await?;
    Ok((status, body))
}

fn decode(body: &[u8]) -> Result<TokenResponse> {
    serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))
}
