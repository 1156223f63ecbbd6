//! Notifier configuration.
//!
//! Settings come from a `config.toml` file (at `$SICKBEETZ_CONFIG`, or
//! `~/.config/sickbeetz/config.toml` by default) overlaid with the
//! environment variables the notifier has always honored:
//!
//! | Variable         | Setting                 |
//! |------------------|-------------------------|
//! | `SPOTIFY_ID`     | `spotify.client_id`     |
//! | `SPOTIFY_SECRET` | `spotify.client_secret` |
//! | `SPOTIFY_USER`   | `spotify.user`          |
//! | `PLAYLIST_OWNER` | `playlist.owner`        |
//! | `PLAYLIST_URI`   | `playlist.url`          |
//! | `SLACK_TOKEN`    | `slack.token`           |
//!
//! Credential values support secret references (`env::VAR`, `file::/path`).
//!
//! ```toml
//! [spotify]
//! client_id = "env::SPOTIFY_ID"
//! client_secret = "file::/run/secrets/spotify"
//! user = "alice"
//!
//! [playlist]
//! name = "SickBeetz"
//!
//! [slack]
//! token = "env::SLACK_TOKEN"
//! channel = "music"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sickbeetz_providers::AuthorizationConfig;
use sickbeetz_providers::spotify::{OAuthCredentials, SpotifyConfig};
use tracing::debug;

use crate::checkpoint::DEFAULT_CHECKPOINT_FILE;
use crate::error::{ServerError, ServerResult};
use crate::poller::PollerConfig;
use crate::secret;

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "SICKBEETZ_CONFIG";

/// Default token file name inside the data directory.
pub const DEFAULT_TOKEN_FILE: &str = "spotify-token.json";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Spotify account and OAuth settings.
    pub spotify: SpotifySettings,

    /// Which playlist to watch.
    pub playlist: PlaylistSettings,

    /// Where announcements go.
    pub slack: SlackSettings,

    /// Poll loop settings.
    pub poller: PollerSettings,

    /// Directory for the token and checkpoint files.
    ///
    /// Defaults to `~/.local/share/sickbeetz`.
    pub data_dir: Option<PathBuf>,

    /// Token file path; overrides `data_dir`.
    pub token_path: Option<PathBuf>,

    /// Checkpoint file path; overrides `data_dir`.
    pub checkpoint_path: Option<PathBuf>,
}

/// Spotify settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifySettings {
    /// OAuth client ID (supports secret references).
    pub client_id: Option<String>,
    /// OAuth client secret (supports secret references).
    pub client_secret: Option<String>,
    /// User whose playlists are searched.
    pub user: Option<String>,
    /// Port of the local authorization callback listener.
    pub callback_port: u16,
    /// Host name in the registered redirect URI.
    pub redirect_host: String,
    /// Whether to open the authorization URL in a browser.
    pub open_browser: bool,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        let auth = AuthorizationConfig::default();
        Self {
            client_id: None,
            client_secret: None,
            user: None,
            callback_port: auth.port,
            redirect_host: auth.redirect_host,
            open_browser: auth.open_browser,
        }
    }
}

/// Playlist settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistSettings {
    /// Exact playlist name.
    pub name: String,
    /// Playlist owner; defaults to the Spotify user.
    pub owner: Option<String>,
    /// Link appended to announcements.
    pub url: Option<String>,
}

impl Default for PlaylistSettings {
    fn default() -> Self {
        Self {
            name: "SickBeetz".to_string(),
            owner: None,
            url: None,
        }
    }
}

/// Slack settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackSettings {
    /// Bot token (supports secret references).
    pub token: Option<String>,
    /// Channel to post to.
    pub channel: String,
    /// Display name of the posts.
    pub bot_name: String,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            token: None,
            channel: "tests".to_string(),
            bot_name: "New Sick Beats!".to_string(),
        }
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    /// Seconds between tick starts.
    pub interval_secs: u64,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl NotifierConfig {
    /// Loads the config file, if any, and overlays the process environment.
    pub fn load() -> ServerResult<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);

        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads configuration from a specific path, without the environment overlay.
    pub fn load_from(path: &Path) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServerError::config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            ServerError::config(format!("failed to parse config {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Overlays values from `lookup` (normally the process environment).
    ///
    /// Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SPOTIFY_ID") {
            self.spotify.client_id = Some(v);
        }
        if let Some(v) = get("SPOTIFY_SECRET") {
            self.spotify.client_secret = Some(v);
        }
        if let Some(v) = get("SPOTIFY_USER") {
            self.spotify.user = Some(v);
        }
        if let Some(v) = get("PLAYLIST_OWNER") {
            self.playlist.owner = Some(v);
        }
        if let Some(v) = get("PLAYLIST_URI") {
            self.playlist.url = Some(v);
        }
        if let Some(v) = get("SLACK_TOKEN") {
            self.slack.token = Some(v);
        }
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sickbeetz")
            .join("config.toml")
    }

    /// Returns the data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sickbeetz")
        })
    }

    /// Returns the token file path.
    pub fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(DEFAULT_TOKEN_FILE))
    }

    /// Returns the checkpoint file path.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(DEFAULT_CHECKPOINT_FILE))
    }

    /// Checks that every required setting is present.
    ///
    /// All missing settings are reported at once.
    pub fn validate(&self) -> ServerResult<()> {
        let mut missing = Vec::new();
        if is_blank(&self.spotify.client_id) {
            missing.push("spotify.client_id (SPOTIFY_ID)");
        }
        if is_blank(&self.spotify.client_secret) {
            missing.push("spotify.client_secret (SPOTIFY_SECRET)");
        }
        if is_blank(&self.spotify.user) {
            missing.push("spotify.user (SPOTIFY_USER)");
        }
        if is_blank(&self.slack.token) {
            missing.push("slack.token (SLACK_TOKEN)");
        }
        if !missing.is_empty() {
            return Err(ServerError::config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if self.playlist.name.is_empty() {
            return Err(ServerError::config("playlist.name must not be empty"));
        }
        if self.slack.channel.trim().is_empty() {
            return Err(ServerError::config("slack.channel must not be empty"));
        }
        if self.poller.interval_secs == 0 {
            return Err(ServerError::config("poller.interval_secs must be positive"));
        }
        Ok(())
    }

    /// Resolves the Spotify client configuration, including secret references.
    pub fn spotify_config(&self) -> ServerResult<SpotifyConfig> {
        let client_id = resolve_setting("spotify.client_id", &self.spotify.client_id)?;
        let client_secret = resolve_setting("spotify.client_secret", &self.spotify.client_secret)?;
        Ok(SpotifyConfig::new(OAuthCredentials::new(
            client_id,
            client_secret,
        )))
    }

    /// Resolves the Slack bot token.
    pub fn slack_token(&self) -> ServerResult<String> {
        resolve_setting("slack.token", &self.slack.token)
    }

    /// Returns the authorization listener settings.
    pub fn authorization_config(&self) -> AuthorizationConfig {
        AuthorizationConfig::default()
            .with_port(self.spotify.callback_port)
            .with_redirect_host(self.spotify.redirect_host.clone())
            .with_open_browser(self.spotify.open_browser)
    }

    /// Returns the poll loop settings.
    pub fn poller_config(&self) -> PollerConfig {
        let user = self.spotify.user.clone().unwrap_or_default();
        let mut config = PollerConfig::new(user)
            .with_interval(Duration::from_secs(self.poller.interval_secs))
            .with_playlist_name(self.playlist.name.clone())
            .with_channel(self.slack.channel.clone(), self.slack.bot_name.clone());
        if let Some(owner) = self.playlist.owner.clone() {
            config = config.with_playlist_owner(owner);
        }
        if let Some(url) = self.playlist.url.clone() {
            config = config.with_playlist_url(url);
        }
        config
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

fn resolve_setting(name: &str, value: &Option<String>) -> ServerResult<String> {
    let raw = value
        .as_deref()
        .ok_or_else(|| ServerError::config(format!("{} is not set", name)))?;
    secret::resolve(raw).map_err(|e| ServerError::config(format!("{}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn complete() -> NotifierConfig {
        let mut config = NotifierConfig::default();
        config.apply_env(env(&[
            ("SPOTIFY_ID", "id"),
            ("SPOTIFY_SECRET", "secret"),
            ("SPOTIFY_USER", "alice"),
            ("SLACK_TOKEN", "xoxb-1"),
        ]));
        config
    }

    #[test]
    fn defaults() {
        let config = NotifierConfig::default();
        assert_eq!(config.playlist.name, "SickBeetz");
        assert_eq!(config.slack.channel, "tests");
        assert_eq!(config.slack.bot_name, "New Sick Beats!");
        assert_eq!(config.poller.interval_secs, 60);
        assert_eq!(config.spotify.callback_port, 8080);
        assert_eq!(config.spotify.redirect_host, "localhost");
    }

    #[test]
    fn parse_toml() {
        let toml = r#"
            data_dir = "/var/lib/sickbeetz"

            [spotify]
            client_id = "env::MY_SPOTIFY_ID"
            user = "alice"
            callback_port = 9090
            open_browser = false

            [playlist]
            name = "Office Jams"
            url = "https://open.spotify.com/playlist/abc"

            [slack]
            channel = "music"

            [poller]
            interval_secs = 20
        "#;

        let config: NotifierConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.spotify.client_id.as_deref(), Some("env::MY_SPOTIFY_ID"));
        assert_eq!(config.spotify.callback_port, 9090);
        assert!(!config.spotify.open_browser);
        assert_eq!(config.spotify.redirect_host, "localhost");
        assert_eq!(config.playlist.name, "Office Jams");
        assert_eq!(config.slack.channel, "music");
        assert_eq!(config.slack.bot_name, "New Sick Beats!");
        assert_eq!(config.poller.interval_secs, 20);
        assert_eq!(
            config.checkpoint_path(),
            PathBuf::from("/var/lib/sickbeetz/lastcheck")
        );
        assert_eq!(
            config.token_path(),
            PathBuf::from("/var/lib/sickbeetz/spotify-token.json")
        );
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[slack]\nchannel = \"general\"\n").unwrap();

        let config = NotifierConfig::load_from(&path).unwrap();
        assert_eq!(config.slack.channel, "general");
    }

    #[test]
    fn load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[slack\nchannel = ").unwrap();

        let err = NotifierConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: NotifierConfig =
            toml::from_str("[spotify]\nuser = \"from-file\"\n[slack]\ntoken = \"file-token\"\n")
                .unwrap();
        config.apply_env(env(&[
            ("SPOTIFY_USER", "from-env"),
            ("SLACK_TOKEN", ""),
            ("PLAYLIST_OWNER", "bob"),
            ("PLAYLIST_URI", "https://example.com/p"),
        ]));

        assert_eq!(config.spotify.user.as_deref(), Some("from-env"));
        assert_eq!(config.slack.token.as_deref(), Some("file-token"));
        assert_eq!(config.playlist.owner.as_deref(), Some("bob"));
        assert_eq!(config.playlist.url.as_deref(), Some("https://example.com/p"));
    }

    #[test]
    fn validate_reports_all_missing_settings() {
        let err = NotifierConfig::default().validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("SPOTIFY_ID"));
        assert!(message.contains("SPOTIFY_SECRET"));
        assert!(message.contains("SPOTIFY_USER"));
        assert!(message.contains("SLACK_TOKEN"));

        assert!(complete().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = complete();
        config.poller.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn poller_config_defaults_owner_to_user() {
        let config = complete().poller_config();
        assert_eq!(config.user, "alice");
        assert_eq!(config.playlist_owner, "alice");
        assert_eq!(config.interval, Duration::from_secs(60));
        assert!(config.playlist_url.is_none());

        let mut with_owner = complete();
        with_owner.playlist.owner = Some("bob".to_string());
        assert_eq!(with_owner.poller_config().playlist_owner, "bob");
    }

    #[test]
    fn secret_references_are_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("spotify-secret");
        std::fs::write(&secret_path, "s3cret\n").unwrap();

        let mut config = complete();
        config.spotify.client_secret = Some(format!("file::{}", secret_path.display()));

        let spotify = config.spotify_config().unwrap();
        assert_eq!(spotify.credentials.client_id, "id");
        assert_eq!(spotify.credentials.client_secret, "s3cret");
        assert_eq!(config.slack_token().unwrap(), "xoxb-1");
    }

    #[test]
    fn unresolvable_secret_is_config_error() {
        let mut config = complete();
        config.slack.token = Some("env::_SICKBEETZ_UNSET_TOKEN_98765".to_string());
        let err = config.slack_token().unwrap_err();
        assert!(matches!(err, ServerError::Config { .. }));
        assert!(err.to_string().contains("slack.token"));
    }

    #[test]
    fn authorization_config_from_settings() {
        let mut config = complete();
        config.spotify.callback_port = 9999;
        config.spotify.open_browser = false;

        let auth = config.authorization_config();
        assert_eq!(auth.port, 9999);
        assert_eq!(auth.redirect_host, "localhost");
        assert!(!auth.open_browser);
    }
}
