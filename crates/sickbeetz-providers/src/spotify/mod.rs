//! Spotify implementation.
//!
//! [`SpotifyOAuth`] plugs the Spotify accounts service into the generic
//! [`AuthorizationFlow`](crate::AuthorizationFlow); [`SpotifyClient`] reads
//! playlists through the Web API with the resulting token.
//!
//! # Example
//!
//! ```ignore
//! use sickbeetz_providers::spotify::{OAuthCredentials, SpotifyClient, SpotifyConfig, SpotifyOAuth};
//! use sickbeetz_providers::{AuthorizationConfig, AuthorizationFlow, TokenStore};
//!
//! let config = SpotifyConfig::new(OAuthCredentials::new("id", "secret"));
//! let flow = AuthorizationFlow::new(
//!     SpotifyOAuth::new(&config)?,
//!     TokenStore::new("/var/lib/sickbeetz/token.json"),
//!     AuthorizationConfig::default(),
//! );
//! let token = flow.authorize().await?;
//! let client = SpotifyClient::new(&token, &config)?;
//! ```

mod auth;
mod client;
mod config;

#[cfg(test)]
pub(crate) mod test_server;

pub use auth::SpotifyOAuth;
pub use client::SpotifyClient;
pub use config::{OAuthCredentials, SpotifyConfig};

use crate::error::{ProviderError, ProviderResult};

/// Name reported by [`SpotifyClient`] and attached to its errors.
pub const PROVIDER_NAME: &str = "spotify";

fn http_client(config: &SpotifyConfig) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| {
            ProviderError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
        })
}

fn request_error(e: reqwest::Error) -> ProviderError {
    let message = if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        format!("request failed: {}", e)
    };
    ProviderError::network(message).with_source(e)
}
