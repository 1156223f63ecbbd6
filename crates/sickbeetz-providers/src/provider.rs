//! MusicService trait definition.
//!
//! The notifier only ever reads from the music service: it lists a user's
//! playlists to resolve the configured one by name, then lists that
//! playlist's entries on every tick.

use std::future::Future;
use std::pin::Pin;

use crate::error::ProviderResult;

/// A playlist as returned by the user's playlist listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSummary {
    /// Service identifier of the playlist.
    pub id: String,
    /// Display name, matched exactly against the configured name.
    pub name: String,
    /// Identifier of the playlist owner, if reported.
    pub owner_id: Option<String>,
    /// Public web link to the playlist, if reported.
    pub url: Option<String>,
}

impl PlaylistSummary {
    /// Creates a summary with the given ID and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner_id: None,
            url: None,
        }
    }

    /// Builder method to set the web link.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// The track part of a playlist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    /// Service identifier (absent for local files).
    pub id: Option<String>,
    /// Track title.
    pub name: String,
    /// Artist names in credit order.
    pub artists: Vec<String>,
}

/// The user who added a playlist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    /// Service identifier of the user.
    pub id: String,
}

/// One entry of a playlist: a track plus who added it and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// The track.
    pub track: TrackRef,
    /// When the entry was added, in the service's `YYYY-MM-DDTHH:MM:SSZ` encoding.
    ///
    /// Some very old playlists report no value.
    pub added_at: Option<String>,
    /// Who added the entry, if reported.
    pub added_by: Option<UserRef>,
}

impl PlaylistEntry {
    /// Creates an entry for a track with the given name and added-at value.
    pub fn new(name: impl Into<String>, added_at: impl Into<String>) -> Self {
        Self {
            track: TrackRef {
                id: None,
                name: name.into(),
                artists: Vec::new(),
            },
            added_at: Some(added_at.into()),
            added_by: None,
        }
    }

    /// Builder method to set the artists.
    pub fn with_artists(mut self, artists: Vec<String>) -> Self {
        self.track.artists = artists;
        self
    }
}

/// A boxed future for async trait methods.
///
/// Keeps the traits object-safe so the poller can hold `Box<dyn MusicService>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read access to a music service.
///
/// # Example Implementation
///
/// ```ignore
/// impl MusicService for SpotifyClient {
///     fn name(&self) -> &str { "spotify" }
///
///     fn list_playlists<'a>(&'a self, user: &'a str)
///         -> BoxFuture<'a, ProviderResult<Vec<PlaylistSummary>>>
///     {
///         Box::pin(async move { /* GET /users/{user}/playlists */ })
///     }
///     // ...
/// }
/// ```
pub trait MusicService: Send + Sync {
    /// Returns the name of this service (e.g., "spotify").
    fn name(&self) -> &str;

    /// Lists the playlists visible for `user`, in service order.
    fn list_playlists<'a>(
        &'a self,
        user: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<PlaylistSummary>>>;

    /// Lists the entries of a playlist, in playlist order.
    fn list_tracks<'a>(
        &'a self,
        owner: &'a str,
        playlist_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<PlaylistEntry>>>;
}

impl<T: MusicService + ?Sized> MusicService for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn list_playlists<'a>(
        &'a self,
        user: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<PlaylistSummary>>> {
        (**self).list_playlists(user)
    }

    fn list_tracks<'a>(
        &'a self,
        owner: &'a str,
        playlist_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<PlaylistEntry>>> {
        (**self).list_tracks(owner, playlist_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_entry_builder() {
        let entry = PlaylistEntry::new("Song", "2023-01-01T00:00:00Z")
            .with_artists(vec!["Band".to_string()]);

        assert_eq!(entry.track.name, "Song");
        assert!(entry.track.id.is_none());
        assert_eq!(entry.track.artists, vec!["Band".to_string()]);
        assert_eq!(entry.added_at.as_deref(), Some("2023-01-01T00:00:00Z"));
        assert!(entry.added_by.is_none());
    }

    #[test]
    fn playlist_summary_builder() {
        let summary = PlaylistSummary::new("p1", "SickBeetz")
            .with_url("https://open.spotify.com/playlist/p1");
        assert_eq!(summary.name, "SickBeetz");
        assert!(summary.owner_id.is_none());
        assert_eq!(summary.url.as_deref(), Some("https://open.spotify.com/playlist/p1"));
    }
}
