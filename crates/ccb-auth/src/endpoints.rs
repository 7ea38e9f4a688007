//! CCB OAuth and API endpoints
//!
//! The defaults point at the production CCB service. Every URL can be
//! overridden (config file, tests) through `Endpoints`.

use serde::Deserialize;

/// Base URL for resource calls; request paths are appended to it.
pub const API_BASE: &str = "https://api.ccbchurch.com/";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://api.ccbchurch.com/oauth/token";

/// Browser consent page
pub const AUTHORIZE_ENDPOINT: &str = "https://oauth.ccbchurch.com/oauth/authorize";

/// Versioned media type the API requires in the `Accept` header.
pub const ACCEPT_MEDIA_TYPE: &str = "application/vnd.ccbchurch.v2+json";

/// Default loopback address for the OAuth callback listener.
pub const CALLBACK_ADDR: &str = "localhost:8080";

/// Path the OAuth provider redirects to after consent.
pub const CALLBACK_PATH: &str = "/callback";

/// Remote endpoints used by the authorizer, guardian, and API client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub api_base: String,
    pub token_url: String,
    pub authorize_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: API_BASE.to_string(),
            token_url: TOKEN_ENDPOINT.to_string(),
            authorize_url: AUTHORIZE_ENDPOINT.to_string(),
        }
    }
}

impl Endpoints {
    /// All endpoints rooted at one base URL (`{base}/`, `{base}/oauth/token`,
    /// `{base}/oauth/authorize`). Handy for mock servers.
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            api_base: format!("{base}/"),
            token_url: format!("{base}/oauth/token"),
            authorize_url: format!("{base}/oauth/authorize"),
        }
    }

    /// Join a caller-supplied path onto the API base with exactly one slash.
    pub fn resource_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
