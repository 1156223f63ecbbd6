//! OAuth token persistence.
//!
//! A single token lives in a JSON file. The file is replaced wholesale on every
//! successful authorization and never deleted by the notifier itself.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// An OAuth 2.0 access token as persisted on disk.
///
/// Field names follow the common OAuth2 token JSON layout so that token files
/// written by other OAuth2 tooling load as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The access token for API requests.
    pub access_token: String,

    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: String,

    /// The refresh token, if one was granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// When the access token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl Token {
    /// Creates a token from token-endpoint response data.
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            refresh_token,
            expiry: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
            scopes,
        }
    }

    /// Returns true if the token carries a usable access token.
    ///
    /// No expiry check is made: cached tokens are used as-is.
    pub fn looks_valid(&self) -> bool {
        !self.access_token.trim().is_empty()
    }
}

/// File-backed storage for a single [`Token`].
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a token store at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the token file.
    ///
    /// Returns `Ok(None)` when the file does not exist. Any other read or
    /// parse failure is an error.
    pub fn load(&self) -> ProviderResult<Option<Token>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no token file");
                return Ok(None);
            }
            Err(e) => {
                return Err(ProviderError::storage(format!(
                    "failed to read token file {}: {}",
                    self.path.display(),
                    e
                ))
                .with_source(e));
            }
        };

        let token: Token = serde_json::from_str(&content).map_err(|e| {
            ProviderError::storage(format!(
                "failed to parse token file {}: {}",
                self.path.display(),
                e
            ))
            .with_source(e)
        })?;

        info!(path = %self.path.display(), "loaded token");
        Ok(Some(token))
    }

    /// Writes the token, replacing any previous one.
    ///
    /// The JSON goes to a sibling temp file first and is renamed into place,
    /// so a crash mid-write leaves either the old token or the new one.
    pub fn save(&self, token: &Token) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::storage(format!("failed to create token directory: {}", e))
                    .with_source(e)
            })?;
        }

        let content = serde_json::to_string_pretty(token)
            .map_err(|e| ProviderError::internal(format!("failed to serialize token: {}", e)))?;

        let temp_path = temp_path_for(&self.path);
        fs::write(&temp_path, &content).map_err(|e| {
            ProviderError::storage(format!("failed to write token file: {}", e)).with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::storage(format!("failed to replace token file: {}", e)).with_source(e)
        })?;

        debug!(path = %self.path.display(), "saved token");
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use tempfile::tempdir;

    fn sample_token() -> Token {
        Token::new(
            "access-token",
            "Bearer",
            Some("refresh-token".to_string()),
            Some(3600),
            vec!["playlist-read-collaborative".to_string()],
        )
    }

    #[test]
    fn token_creation() {
        let token = sample_token();
        assert_eq!(token.access_token, "access-token");
        assert!(token.expiry.is_some_and(|e| e > Utc::now()));
        assert!(token.looks_valid());
        assert!(!Token::new("  ", "Bearer", None, None, vec![]).looks_valid());
    }

    #[test]
    fn load_missing_file_is_absent() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let store = TokenStore::new(&path);

        let token = sample_token();
        store.save(&token).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("nested").join("token.json.tmp").exists());

        let loaded = TokenStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded, token);
    }

    #[test]
    fn save_overwrites_previous_token() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save(&sample_token()).unwrap();
        let replacement = Token::new("second", "Bearer", None, None, vec![]);
        store.save(&replacement).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "second");
        assert!(loaded.refresh_token.is_none());
    }

    #[test]
    fn load_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{not json").unwrap();

        let err = TokenStore::new(&path).load().unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Storage);
    }

    #[test]
    fn load_accepts_oauth2_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(
            &path,
            r#"{"access_token":"abc","token_type":"Bearer","refresh_token":"def","expiry":"2023-05-01T10:00:00Z"}"#,
        )
        .unwrap();

        let token = TokenStore::new(&path).load().unwrap().unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.refresh_token.as_deref(), Some("def"));
        assert!(token.expiry.is_some());
        assert!(token.scopes.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        TokenStore::new(&path).save(&sample_token()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
