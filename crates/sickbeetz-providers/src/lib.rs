//! MusicService trait, authorization flow and the Spotify implementation.
//!
//! This crate provides everything the notifier needs from the music service:
//!
//! - [`MusicService`] - Playlist and track listing, implemented by [`spotify::SpotifyClient`]
//! - [`AuthorizationFlow`] - Cached-or-interactive OAuth 2.0 authorization code flow
//! - [`TokenStore`] - File-backed persistence for the single OAuth token
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐  load/save  ┌──────────────────────┐
//!  │  TokenStore  │◄────────────│  AuthorizationFlow   │
//!  └──────────────┘             │  (loopback callback) │
//!                               └──────────┬───────────┘
//!                                          │ Token
//!                                          ▼
//!                               ┌──────────────────────┐
//!                               │    SpotifyClient     │
//!                               └──────────┬───────────┘
//!                                          │ MusicService
//!                                          ▼
//!                                    PlaylistEntry
//! ```

pub mod error;
pub mod oauth;
pub mod provider;
pub mod spotify;
pub mod tokens;

// Re-export main types at crate root
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use oauth::{AuthorizationConfig, AuthorizationFlow, CodeExchange, PendingAuthorization, PkceFlow};
pub use provider::{BoxFuture, MusicService, PlaylistEntry, PlaylistSummary, TrackRef, UserRef};
pub use tokens::{Token, TokenStore};
