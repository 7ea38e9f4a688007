//! Interactive OAuth authorization-code flow
//!
//! Binds a loopback callback listener, sends the user's browser to the CCB
//! consent page, waits (bounded) for the provider to redirect back with a
//! code, shuts the listener down, and exchanges the code for a token.
//!
//! The steps are sequenced by the pure state machine in `crate::flow`; this
//! module only performs the I/O each action calls for.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use transport::Transport;
use url::Url;

use crate::browser;
use crate::credentials::Credentials;
use crate::endpoints::{CALLBACK_ADDR, CALLBACK_PATH, Endpoints};
use crate::error::{Error, Result};
use crate::flow::{FlowAction, FlowEvent, FlowState, handle_event};
use crate::token::{self, Token};

/// How long to wait for the provider to redirect back with a code.
pub const AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(120);

/// How long the callback listener gets to finish in-flight responses.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const CONFIRMATION: &str = "Authorization code received. You may now return to your terminal.";

/// Callback listener and timing settings.
#[derive(Debug, Clone)]
pub struct AuthorizerConfig {
    /// `host:port` to bind; the host is also used in the redirect URI
    pub listen_addr: String,
    pub callback_path: String,
    pub timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            listen_addr: CALLBACK_ADDR.to_string(),
            callback_path: CALLBACK_PATH.to_string(),
            timeout: AUTHORIZATION_TIMEOUT,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }
}

type Launcher = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Runs the one-time interactive authorization that produces the first token.
pub struct Authorizer {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    config: AuthorizerConfig,
    launcher: Launcher,
}

impl Authorizer {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        config: AuthorizerConfig,
    ) -> Self {
        Self {
            transport,
            endpoints,
            config,
            launcher: Arc::new(browser::open),
        }
    }

    /// Replace the browser launcher (the default runs the platform opener).
    pub fn with_launcher<F>(mut self, launcher: F) -> Self
    where
        F: Fn(&str) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.launcher = Arc::new(launcher);
        self
    }

    /// Run the flow to completion.
    ///
    /// Sets `credentials.redirect_uri` to the loopback callback URL. The
    /// authorization code passes through `credentials.code` and is consumed by
    /// the exchange. Each call is one attempt; nothing is retried.
    pub async fn authorize(&self, credentials: &mut Credentials) -> Result<Token> {
        let mut flow = Tracker::default();

        let listener = match TcpListener::bind(&self.config.listen_addr).await {
            Ok(listener) => listener,
            Err(source) => {
                flow.advance(FlowEvent::BindFailed);
                return Err(Error::Bind {
                    addr: self.config.listen_addr.clone(),
                    source,
                });
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Io(format!("reading callback listener address: {e}")))?;

        credentials.redirect_uri = self.redirect_uri(local_addr);
        let consent_url = authorization_url(&self.endpoints, credentials)?;

        let (code_tx, mut code_rx) = mpsc::channel::<String>(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = callback_router(&self.config.callback_path, code_tx);
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        info!(addr = %local_addr, redirect_uri = %credentials.redirect_uri, "callback listener started");

        if flow.advance(FlowEvent::ListenerBound) == FlowAction::OpenBrowser {
            self.open_browser(&consent_url);
        }
        flow.advance(FlowEvent::BrowserDispatched);

        let code = match tokio::time::timeout(self.config.timeout, code_rx.recv()).await {
            Ok(Some(code)) => {
                flow.advance(FlowEvent::CodeArrived);
                Some(code)
            }
            _ => {
                flow.advance(FlowEvent::WaitTimedOut);
                None
            }
        };

        stop_listener(shutdown_tx, server, self.config.shutdown_grace).await;

        if flow.advance(FlowEvent::ListenerStopped) != FlowAction::ExchangeCode {
            warn!(
                timeout_secs = self.config.timeout.as_secs(),
                "no authorization code received"
            );
            return Err(Error::AuthorizationTimeout(self.config.timeout));
        }

        credentials.code = code;
        match token::exchange_code(self.transport.as_ref(), &self.endpoints, credentials).await {
            Ok(token) => {
                flow.advance(FlowEvent::TokenIssued);
                info!(expires_at = token.expires_at, "authorization complete");
                Ok(token)
            }
            Err(e) => {
                flow.advance(FlowEvent::ExchangeFailed);
                warn!(error = %e, "authorization code exchange failed");
                Err(e)
            }
        }
    }

    fn redirect_uri(&self, local_addr: SocketAddr) -> String {
        let host = self
            .config
            .listen_addr
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("localhost");
        format!(
            "http://{host}:{}{}",
            local_addr.port(),
            self.config.callback_path
        )
    }

    /// Never fails the flow: without a browser the user gets the URL instead.
    fn open_browser(&self, url: &str) {
        match (self.launcher)(url) {
            Ok(()) => {
                info!("opened browser for authorization");
                println!("Your browser has been opened to authorize the app.");
            }
            Err(e) => {
                warn!(error = %e, "could not open browser");
                println!("Please open this URL manually: {url}");
            }
        }
    }
}

/// Consent page URL for `credentials`.
pub fn authorization_url(endpoints: &Endpoints, credentials: &Credentials) -> Result<String> {
    let url = Url::parse_with_params(
        &endpoints.authorize_url,
        &[
            ("response_type", "code"),
            ("client_id", credentials.client_id.as_str()),
            ("redirect_uri", credentials.redirect_uri.as_str()),
        ],
    )
    .map_err(|e| Error::InvalidRequest(format!("invalid authorize URL: {e}")))?;
    Ok(url.into())
}

/// Current flow state plus transition logging.
#[derive(Default)]
struct Tracker {
    state: FlowState,
}

impl Tracker {
    fn advance(&mut self, event: FlowEvent) -> FlowAction {
        let (next, action) = handle_event(self.state, event);
        debug!(from = ?self.state, to = ?next, ?event, ?action, "authorization flow transition");
        self.state = next;
        action
    }
}

fn callback_router(path: &str, codes: mpsc::Sender<String>) -> Router {
    Router::new()
        .route(path, get(callback_handler))
        .with_state(codes)
}

/// GET /callback?code=...: hand the code to the waiting flow.
///
/// Only the first code is kept; later callbacks get the same confirmation.
async fn callback_handler(
    State(codes): State<mpsc::Sender<String>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(code) = params.get("code").filter(|code| !code.is_empty()) else {
        warn!("callback request without authorization code");
        return (StatusCode::BAD_REQUEST, "No code found").into_response();
    };

    if codes.try_send(code.clone()).is_err() {
        debug!("authorization code already delivered, ignoring duplicate callback");
    }
    (StatusCode::OK, CONFIRMATION).into_response()
}

/// Signal graceful shutdown and wait at most `grace` for the server task.
async fn stop_listener(
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<std::io::Result<()>>,
    grace: Duration,
) {
    let _ = shutdown_tx.send(());
    let abort = server.abort_handle();

    match tokio::time::timeout(grace, server).await {
        Ok(Ok(Ok(()))) => debug!("callback listener stopped"),
        Ok(Ok(Err(e))) => warn!(error = %e, "callback listener error during shutdown"),
        Ok(Err(e)) => warn!(error = %e, "callback listener task failed"),
        Err(_) => {
            warn!(
                grace_secs = grace.as_secs(),
                "callback listener shutdown exceeded grace period, aborting"
            );
            abort.abort();
        }
    }
}
