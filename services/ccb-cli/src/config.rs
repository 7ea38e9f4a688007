//! Configuration types and loading
//!
//! Config path precedence: `--config` arg > CONFIG_PATH env var > `ccb.toml`.
//! The client secret is loaded from the CCB_CLIENT_SECRET env var or
//! `client_secret_file`, never stored in the TOML directly.

use ccb_auth::{AuthorizerConfig, CALLBACK_ADDR, CALLBACK_PATH, Credentials, Endpoints};
use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Env var holding the OAuth client secret
const CLIENT_SECRET_ENV: &str = "CCB_CLIENT_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub authorizer: AuthorizerSection,
    #[serde(default)]
    pub endpoints: Endpoints,
}

/// OAuth application registration
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub subdomain: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to CCB_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

/// Token storage and HTTP settings
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Local callback listener for `ccb authorize`
#[derive(Debug, Deserialize)]
pub struct AuthorizerSection {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_authorize_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_token_path() -> PathBuf {
    PathBuf::from("ccb-token.json")
}

fn default_timeout() -> u64 {
    30
}

fn default_listen_addr() -> String {
    CALLBACK_ADDR.to_string()
}

fn default_authorize_timeout() -> u64 {
    120
}

fn default_shutdown_grace() -> u64 {
    5
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for AuthorizerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_authorize_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then resolve the client secret.
    ///
    /// Client secret resolution order:
    /// 1. CCB_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
            config.oauth.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.oauth.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.oauth.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        if self.oauth.subdomain.trim().is_empty() {
            return Err(common::Error::Config("subdomain must not be empty".into()));
        }
        if self.client.timeout_secs == 0 {
            return Err(common::Error::Config(
                "client.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.authorizer.timeout_secs == 0 {
            return Err(common::Error::Config(
                "authorizer.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.authorizer.shutdown_grace_secs == 0 {
            return Err(common::Error::Config(
                "authorizer.shutdown_grace_secs must be greater than 0".into(),
            ));
        }
        for (name, url) in [
            ("api_base", &self.endpoints.api_base),
            ("token_url", &self.endpoints.token_url),
            ("authorize_url", &self.endpoints.authorize_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }
        Ok(())
    }

    /// OAuth credentials for the authorizer and API client.
    pub fn credentials(&self) -> common::Result<Credentials> {
        let secret = self.oauth.client_secret.clone().ok_or_else(|| {
            common::Error::Config(format!(
                "client secret not configured; set {CLIENT_SECRET_ENV} or client_secret_file"
            ))
        })?;
        Ok(Credentials::new(
            self.oauth.client_id.clone(),
            secret,
            self.oauth.subdomain.clone(),
        ))
    }

    pub fn authorizer_config(&self) -> AuthorizerConfig {
        AuthorizerConfig {
            listen_addr: self.authorizer.listen_addr.clone(),
            callback_path: CALLBACK_PATH.to_string(),
            timeout: Duration::from_secs(self.authorizer.timeout_secs),
            shutdown_grace: Duration::from_secs(self.authorizer.shutdown_grace_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.client.timeout_secs)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("ccb.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn minimal_toml() -> &'static str {
        r#"
[oauth]
client_id = "ccb-client"
subdomain = "gracechurch"
"#
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("ccb.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, minimal_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.oauth.client_id, "ccb-client");
        assert_eq!(config.oauth.subdomain, "gracechurch");
        assert_eq!(config.client.token_path, PathBuf::from("ccb-token.json"));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.authorizer.listen_addr, "localhost:8080");
        assert_eq!(config.endpoints, Endpoints::default());
        assert!(config.oauth.client_secret.is_none());

        let authorizer = config.authorizer_config();
        assert_eq!(authorizer.timeout, Duration::from_secs(120));
        assert_eq!(authorizer.shutdown_grace, Duration::from_secs(5));
        assert_eq!(authorizer.callback_path, "/callback");
    }

    #[test]
    fn test_load_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[oauth]
client_id = "ccb-client"
subdomain = "gracechurch"

[client]
token_path = "/var/lib/ccb/token.json"
timeout_secs = 10

[authorizer]
listen_addr = "127.0.0.1:9090"
timeout_secs = 60

[endpoints]
api_base = "https://staging.example.test/"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.client.token_path, PathBuf::from("/var/lib/ccb/token.json"));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.authorizer_config().listen_addr, "127.0.0.1:9090");
        assert_eq!(config.authorizer_config().timeout, Duration::from_secs(60));
        assert_eq!(config.endpoints.api_base, "https://staging.example.test/");
        // Unspecified endpoints keep their production defaults
        assert_eq!(config.endpoints.token_url, ccb_auth::TOKEN_ENDPOINT);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/ccb.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_rejects_empty_client_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[oauth]\nclient_id = \"\"\nsubdomain = \"gracechurch\"\n",
        );
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("client_id"), "got: {err}");
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &format!("{}\n[client]\ntimeout_secs = 0\n", minimal_toml()),
        );
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"), "got: {err}");
    }

    #[test]
    fn test_rejects_zero_shutdown_grace() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &format!(
                "{}\n[authorizer]\nshutdown_grace_secs = 0\n",
                minimal_toml()
            ),
        );
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("shutdown_grace_secs"), "got: {err}");
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &format!(
                "{}\n[endpoints]\ntoken_url = \"ftp://example.test/token\"\n",
                minimal_toml()
            ),
        );
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("token_url"), "got: {err}");
    }

    #[test]
    fn test_client_secret_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, minimal_toml());

        unsafe { set_env(CLIENT_SECRET_ENV, "env-secret") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };

        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.client_secret.expose(), "env-secret");
        assert_eq!(credentials.client_id, "ccb-client");
        assert_eq!(credentials.subdomain, "gracechurch");
    }

    #[test]
    fn test_client_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "file-secret\n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "[oauth]\nclient_id = \"ccb-client\"\nsubdomain = \"gracechurch\"\nclient_secret_file = \"{}\"\n",
                secret_path.display()
            ),
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.oauth.client_secret.as_ref().unwrap().expose(),
            "file-secret"
        );
    }

    #[test]
    fn test_client_secret_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "file-secret").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "[oauth]\nclient_id = \"ccb-client\"\nsubdomain = \"gracechurch\"\nclient_secret_file = \"{}\"\n",
                secret_path.display()
            ),
        );

        unsafe { set_env(CLIENT_SECRET_ENV, "env-secret") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };

        assert_eq!(
            config.oauth.client_secret.as_ref().unwrap().expose(),
            "env-secret"
        );
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, minimal_toml());

        let err = Config::load(&path).unwrap().credentials().unwrap_err();
        assert!(err.to_string().contains(CLIENT_SECRET_ENV), "got: {err}");
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/ccb.toml"));
        assert_eq!(path, PathBuf::from("/custom/ccb.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/ccb.toml") };
        let path = Config::resolve_path(None);
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(path, PathBuf::from("/env/ccb.toml"));
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(Config::resolve_path(None), PathBuf::from("ccb.toml"));
    }
}
