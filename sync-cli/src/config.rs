//! Configuration and session storage for the tether CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tether_sync_client::ClientConfig;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "tether.toml";

const SESSION_FILE: &str = "session.json";

/// Load client configuration.
///
/// An explicit path must exist. Without one, `tether.toml` in the working
/// directory is used if present, otherwise built-in defaults.
pub fn load_client_config(path: Option<&Path>) -> Result<ClientConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(ClientConfig::default());
            }
            default
        }
    };
    ClientConfig::from_file(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Session stored after a successful login.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// Session token.
    pub token: String,
    /// Username the token was issued to.
    pub username: String,
    /// When the login happened (Unix seconds).
    pub saved_at: u64,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("token", &"[REDACTED]")
            .field("username", &self.username)
            .field("saved_at", &self.saved_at)
            .finish()
    }
}

impl StoredSession {
    /// Create a session record stamped with the current time.
    pub fn new(token: &str, username: &str) -> Self {
        Self {
            token: token.to_string(),
            username: username.to_string(),
            saved_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Load the stored session, if any.
    pub async fn load(data_dir: &Path) -> Result<Option<Self>> {
        let path = data_dir.join(SESSION_FILE);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read session file"),
        };
        let session = serde_json::from_str(&contents).context("Invalid session file")?;
        Ok(Some(session))
    }

    /// Load the stored session or explain how to create one.
    pub async fn require(data_dir: &Path) -> Result<Self> {
        Self::load(data_dir)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Not logged in. Run 'tether login' first."))
    }

    /// Save the session (owner-only permissions on Unix).
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(SESSION_FILE);
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save session")?;
        set_file_permissions_0600(&path).await?;
        Ok(())
    }

    /// Delete the stored session. Returns whether one existed.
    pub async fn remove(data_dir: &Path) -> Result<bool> {
        match tokio::fs::remove_file(data_dir.join(SESSION_FILE)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context("Failed to delete session file"),
        }
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[tokio::test]
    async fn session_roundtrip() {
        let dir = tempdir().unwrap();
        StoredSession::new("tok-1", "alice")
            .save(dir.path())
            .await
            .unwrap();

        let loaded = StoredSession::load(dir.path()).await.unwrap().unwrap();
        assert_eq!(loaded.token, "tok-1");
        assert_eq!(loaded.username, "alice");
        assert!(loaded.saved_at > 0);
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let dir = tempdir().unwrap();
        assert!(StoredSession::load(dir.path()).await.unwrap().is_none());
        assert!(StoredSession::require(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_session_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();
        assert!(StoredSession::load(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn remove_reports_whether_session_existed() {
        let dir = tempdir().unwrap();
        assert!(!StoredSession::remove(dir.path()).await.unwrap());

        StoredSession::new("t", "u").save(dir.path()).await.unwrap();
        assert!(StoredSession::remove(dir.path()).await.unwrap());
        assert!(StoredSession::load(dir.path()).await.unwrap().is_none());
    }

    #[test]
    fn debug_redacts_token() {
        let session = StoredSession::new("eyJsecret", "alice");
        assert!(!format!("{:?}", session).contains("eyJsecret"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn session_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        StoredSession::new("t", "u").save(dir.path()).await.unwrap();

        let path = dir.path().join(SESSION_FILE);
        let perms = tokio::fs::metadata(&path).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600, "file should be 0600");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn data_dir_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("test-data");
        tokio::fs::create_dir_all(&data_dir).await.unwrap();
        set_dir_permissions_0700(&data_dir).await.unwrap();

        let perms = tokio::fs::metadata(&data_dir).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o700, "dir should be 0700");
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\napi_base = \"https://example.com/api\"").unwrap();

        let config = load_client_config(Some(file.path())).unwrap();
        assert_eq!(config.server.api_base, "https://example.com/api");
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(load_client_config(Some(Path::new("/nonexistent/tether.toml"))).is_err());
    }
}
