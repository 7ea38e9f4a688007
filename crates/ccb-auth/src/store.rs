//! Token file persistence
//!
//! Keeps one token as JSON on disk between runs. Writes go to a temp file in
//! the same directory and are renamed over the target, so a crash never leaves
//! a half-written token behind. A tokio Mutex serializes writers within the
//! process.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::Token;

/// JSON token file with atomic writes and 0600 permissions.
pub struct TokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored token. A missing file is `Ok(None)`, not an error.
    pub async fn load(&self) -> Result<Option<Token>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no token file found");
                return Ok(None);
            }
            Err(e) => return Err(Error::Io(format!("reading token file: {e}"))),
        };

        let token: Token = serde_json::from_str(&contents)
            .map_err(|e| Error::TokenParse(format!("parsing token file: {e}")))?;
        debug!(path = %self.path.display(), expires_at = token.expires_at, "loaded token");
        Ok(Some(token))
    }

    /// Persist `token`, replacing any previous one.
    pub async fn save(&self, token: &Token) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.path, token).await
    }
}

/// Write the token to a temp file next to `path`, restrict it to the owner,
/// then rename it into place.
async fn write_atomic(path: &Path, token: &Token) -> Result<()> {
    let json = serde_json::to_string_pretty(token)
        .map_err(|e| Error::TokenParse(format!("serializing token: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".ccb-token.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token");
    Ok(())
}
