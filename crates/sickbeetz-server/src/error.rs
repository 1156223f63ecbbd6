//! Server error types.

use std::io;

use sickbeetz_providers::{ProviderError, ProviderErrorCode};
use thiserror::Error;

use crate::notify::NotifyError;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
///
/// [`is_fatal`](ServerError::is_fatal) splits them into errors that stop the
/// process and errors that only abort the current tick.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Obtaining the music-service token failed.
    #[error("Authorization failed: {0}")]
    Authorization(#[source] ProviderError),

    /// No playlist with the configured name exists for the user.
    #[error("Playlist {name:?} not found for user {user:?}")]
    PlaylistNotFound { name: String, user: String },

    /// The checkpoint file could not be read, parsed or written.
    #[error("Checkpoint error ({path}): {message}")]
    Checkpoint { path: String, message: String },

    /// A music-service request failed.
    #[error("Music service error: {0}")]
    Remote(#[source] ProviderError),

    /// Posting a notification failed.
    #[error("Notification error: {0}")]
    Delivery(#[from] NotifyError),
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a playlist not found error.
    pub fn playlist_not_found(name: impl Into<String>, user: impl Into<String>) -> Self {
        Self::PlaylistNotFound {
            name: name.into(),
            user: user.into(),
        }
    }

    /// Creates a checkpoint error.
    pub fn checkpoint(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Checkpoint {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if the process cannot continue.
    ///
    /// Remote and delivery failures are transient: the tick is abandoned
    /// without advancing the checkpoint and the next tick retries.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Remote(_) | Self::Delivery(_))
    }

    /// Returns true if the music service refused the access token.
    ///
    /// Access tokens are never refreshed, so this keeps happening until the
    /// token file is removed and the process re-authorizes.
    pub fn is_token_rejected(&self) -> bool {
        matches!(self, Self::Remote(e) if e.code() == ProviderErrorCode::AuthenticationFailed)
    }
}
