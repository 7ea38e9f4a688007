//! Token validity and refresh
//!
//! The guardian decides whether a token is still usable and, if not, trades
//! its refresh token for a new one. A refresh is a single attempt; failures go
//! straight back to the caller.
//!
//! Tokens shared between tasks live in a `SharedToken`. The whole
//! check-refresh-mutate sequence runs under the token's lock, so concurrent
//! callers holding an expired token produce one refresh, not one each.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use transport::Transport;

use crate::credentials::Credentials;
use crate::endpoints::Endpoints;
use crate::error::Result;
use crate::token::{self, Token, unix_now};

/// A token shared across tasks.
pub type SharedToken = Arc<Mutex<Token>>;

/// Whether `token` can be sent right now (see `Token::is_valid_at`).
pub fn is_valid(token: &Token) -> bool {
    token.is_valid_at(unix_now())
}

/// Keeps tokens fresh against the token endpoint.
#[derive(Clone)]
pub struct TokenGuardian {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
}

impl TokenGuardian {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// Exchange the refresh token for a new token, updating `token` in place.
    ///
    /// On failure `token` is left untouched.
    pub async fn refresh(&self, token: &mut Token, credentials: &Credentials) -> Result<()> {
        debug!("refreshing access token");
        match token::request_refresh(
            self.transport.as_ref(),
            &self.endpoints,
            credentials,
            &token.refresh_token,
        )
        .await
        {
            Ok(response) => {
                token.apply_refresh(response, unix_now());
                metrics::counter!("ccb_token_refresh_total", "outcome" => "success").increment(1);
                info!(expires_at = token.expires_at, "access token refreshed");
                Ok(())
            }
            Err(e) => {
                metrics::counter!("ccb_token_refresh_total", "outcome" => "failure").increment(1);
                warn!(error = %e, "access token refresh failed");
                Err(e)
            }
        }
    }

    /// Refresh `token` if it is no longer valid.
    pub async fn ensure_valid(&self, token: &mut Token, credentials: &Credentials) -> Result<()> {
        if is_valid(token) {
            return Ok(());
        }
        self.refresh(token, credentials).await
    }

    /// `ensure_valid` for a shared token. Returns the access token to use.
    ///
    /// The lock is held across the refresh: a task that waited on it re-checks
    /// validity and finds the token another task just refreshed.
    pub async fn ensure_valid_shared(
        &self,
        token: &SharedToken,
        credentials: &Credentials,
    ) -> Result<String> {
        let mut guard = token.lock().await;
        self.ensure_valid(&mut guard, credentials).await?;
        Ok(guard.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::mock::{self, MockTransport};
    use transport::{Method, StatusCode};

    use crate::error::Error;

    const REFRESHED: &str = r#"{"access_token":"A2","refresh_token":"R2","expires_in":3600}"#;

    fn expired_token() -> Token {
        Token {
            access_token: "A1".into(),
            refresh_token: "R1".into(),
            token_type: "Bearer".into(),
            expires_at: unix_now() - 10,
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("client", "secret", "grace")
    }

    fn guardian(transport: Arc<MockTransport>) -> TokenGuardian {
        TokenGuardian::new(transport, Endpoints::default())
    }

    #[test]
    fn is_valid_uses_wall_clock() {
        let mut token = expired_token();
        assert!(!is_valid(&token));
        token.expires_at = unix_now() + 3600;
        assert!(is_valid(&token));
        token.expires_at = unix_now() + 5;
        assert!(!is_valid(&token), "inside the 30s margin");
    }

    #[tokio::test]
    async fn refresh_overwrites_token() {
        let transport = Arc::new(MockTransport::new(|_| Ok(mock::response(200, REFRESHED))));
        let mut token = expired_token();

        guardian(transport.clone())
            .refresh(&mut token, &credentials())
            .await
            .unwrap();

        assert_eq!(token.access_token, "A2");
        assert_eq!(token.refresh_token, "R2");
        assert_eq!(token.token_type, "Bearer");
        assert!(
            (token.expires_at - (unix_now() + 3600)).abs() <= 5,
            "expires_at = {}",
            token.expires_at
        );

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::POST);
        assert!(request.url.ends_with("/oauth/token"));
    }

    #[tokio::test]
    async fn refresh_with_huge_expires_in_stays_valid() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(mock::response(
                200,
                r#"{"access_token":"A2","refresh_token":"R2","expires_in":9223372036854775807}"#,
            ))
        }));
        let mut token = expired_token();

        guardian(transport.clone())
            .refresh(&mut token, &credentials())
            .await
            .unwrap();

        assert_eq!(token.expires_at, i64::MAX);
        assert!(is_valid(&token), "refreshed token must not look expired");
    }

    #[tokio::test]
    async fn refresh_rejection_surfaces_status_and_body() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(mock::response(401, r#"{"error":"invalid_grant"}"#))
        }));
        let mut token = expired_token();
        let before = token.clone();

        let err = guardian(transport.clone())
            .refresh(&mut token, &credentials())
            .await
            .unwrap_err();
        match err {
            Error::Refresh { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, r#"{"error":"invalid_grant"}"#);
            }
            other => panic!("expected Refresh, got {other:?}"),
        }
        assert_eq!(token, before, "failed refresh must not touch the token");
        assert_eq!(transport.calls(), 1, "no retry");
    }

    #[tokio::test]
    async fn refresh_transport_error_passes_through() {
        let transport = Arc::new(MockTransport::new(|_| {
            Err(transport::Error::Request("connection refused".into()))
        }));
        let mut token = expired_token();

        let err = guardian(transport.clone())
            .refresh(&mut token, &credentials())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, Error::Transport(transport::Error::Request(msg)) if msg == "connection refused"),
            "got: {err:?}"
        );
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn ensure_valid_skips_fresh_token() {
        let transport = Arc::new(MockTransport::new(|_| Ok(mock::response(200, REFRESHED))));
        let mut token = expired_token();
        token.expires_at = unix_now() + 3600;

        guardian(transport.clone())
            .ensure_valid(&mut token, &credentials())
            .await
            .unwrap();
        assert_eq!(token.access_token, "A1");
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn ensure_valid_refreshes_expired_token() {
        let transport = Arc::new(MockTransport::new(|_| Ok(mock::response(200, REFRESHED))));
        let mut token = expired_token();

        guardian(transport.clone())
            .ensure_valid(&mut token, &credentials())
            .await
            .unwrap();
        assert_eq!(token.access_token, "A2");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_shared_refreshes_collapse() {
        let transport = Arc::new(MockTransport::new(|_| Ok(mock::response(200, REFRESHED))));
        let guardian = guardian(transport.clone());
        let token: SharedToken = Arc::new(Mutex::new(expired_token()));
        let credentials = credentials();

        let mut handles = vec![];
        for _ in 0..8 {
            let guardian = guardian.clone();
            let token = token.clone();
            let credentials = credentials.clone();
            handles.push(tokio::spawn(async move {
                guardian
                    .ensure_valid_shared(&token, &credentials)
                    .await
                    .unwrap()
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap(), "A2");
        }
        assert_eq!(transport.calls(), 1, "exactly one refresh for all callers");
    }
}
