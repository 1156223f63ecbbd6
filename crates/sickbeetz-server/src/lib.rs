//! Daemon: playlist poller, checkpoint, Slack notifications.
//!
//! This crate provides the sickbeetz notifier that:
//! - Polls a collaborative playlist on a fixed interval
//! - Announces tracks added since the last successful check in Slack
//! - Persists the last successful check in a checkpoint file
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use sickbeetz_providers::spotify::{SpotifyClient, SpotifyConfig, OAuthCredentials};
//! use sickbeetz_providers::Token;
//! use sickbeetz_server::{Checkpoint, Poller, PollerConfig, SignalHandler, SlackMessenger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spotify = SpotifyConfig::new(OAuthCredentials::new("id", "secret"));
//!     let token = Token::new("access", "Bearer", None, Some(3600), vec![]);
//!     let music = SpotifyClient::new(&token, &spotify)?;
//!     let slack = SlackMessenger::new("xoxb-token", Duration::from_secs(30))?;
//!
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!
//!     let poller = Poller::new(music, slack, Checkpoint::new("lastcheck"), PollerConfig::new("alice"));
//!     poller.run(signals.shutdown()).await?;
//!     Ok(())
//! }
//! ```

mod announcement;
mod checkpoint;
mod config;
mod error;
mod notify;
mod poller;
mod secret;
mod signals;

pub use announcement::announcement;
pub use checkpoint::{Checkpoint, DEFAULT_CHECKPOINT_FILE};
pub use config::{
    CONFIG_PATH_ENV, DEFAULT_TOKEN_FILE, NotifierConfig, PlaylistSettings, PollerSettings,
    SlackSettings, SpotifySettings,
};
pub use error::{ServerError, ServerResult};
pub use notify::{Messenger, NotifyError, NotifyResult, SLACK_API_BASE, SlackMessenger};
pub use poller::{Poller, PollerConfig, TickReport, added_after};
pub use secret::resolve as resolve_secret;
pub use signals::{ShutdownSignal, SignalHandler};
