//! OAuth application credentials
//!
//! `Credentials` carries the static app registration (client id/secret,
//! tenant subdomain) plus the two values the authorization flow fills in:
//! the loopback `redirect_uri` and the single-use authorization `code`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;

/// Client registration and per-flow authorization state.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Tenant identifier of the target organization
    pub subdomain: String,
    /// Set by the authorizer to the local callback URL
    pub redirect_uri: String,
    /// Authorization code; taken (not copied) by the code exchange
    pub code: Option<String>,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<Secret<String>>,
        subdomain: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            subdomain: subdomain.into(),
            redirect_uri: String::new(),
            code: None,
        }
    }

    /// `Authorization` header value for HTTP Basic auth with id/secret.
    pub(crate) fn basic_auth(&self) -> String {
        let pair = format!("{}:{}", self.client_id, self.client_secret.expose());
        format!("Basic {}", STANDARD.encode(pair))
    }
}
