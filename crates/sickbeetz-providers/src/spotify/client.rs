//! Spotify Web API client.
//!
//! Both listings are paginated; the client follows `next` links until the
//! service stops returning one.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, MusicService, PlaylistEntry, PlaylistSummary, TrackRef, UserRef};
use crate::tokens::Token;

use super::config::SpotifyConfig;
use super::{PROVIDER_NAME, http_client, request_error};

/// Page size for the playlist listing (service maximum).
const PLAYLISTS_PAGE_LIMIT: u32 = 50;

/// Page size for the playlist items listing (service maximum).
const TRACKS_PAGE_LIMIT: u32 = 100;

/// Read-only Spotify Web API client.
#[derive(Debug)]
pub struct SpotifyClient {
    http_client: reqwest::Client,
    access_token: String,
    api_base: String,
}

impl SpotifyClient {
    /// Creates a client that authenticates with `token`.
    pub fn new(token: &Token, config: &SpotifyConfig) -> ProviderResult<Self> {
        Ok(Self {
            http_client: http_client(config)?,
            access_token: token.access_token.clone(),
            api_base: config.api_base.clone(),
        })
    }

    /// Lists every playlist of `user`, in service order.
    pub async fn playlists(&self, user: &str) -> ProviderResult<Vec<PlaylistSummary>> {
        let first = format!(
            "{}/users/{}/playlists?limit={}",
            self.api_base,
            urlencoding::encode(user),
            PLAYLISTS_PAGE_LIMIT
        );
        let items: Vec<ApiPlaylist> = self.collect_pages(first).await?;

        let playlists: Vec<PlaylistSummary> =
            items.into_iter().map(ApiPlaylist::into_summary).collect();
        debug!(user, count = playlists.len(), "fetched playlists");
        Ok(playlists)
    }

    /// Lists every entry of a playlist, in playlist order.
    ///
    /// Entries whose track is no longer available come back with a null
    /// track and are skipped.
    pub async fn playlist_tracks(&self, playlist_id: &str) -> ProviderResult<Vec<PlaylistEntry>> {
        let first = format!(
            "{}/playlists/{}/tracks?limit={}",
            self.api_base,
            urlencoding::encode(playlist_id),
            TRACKS_PAGE_LIMIT
        );
        let items: Vec<ApiPlaylistItem> = self.collect_pages(first).await?;

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match item.into_entry() {
                Some(entry) => entries.push(entry),
                None => warn!(playlist_id, "skipping playlist entry without a track"),
            }
        }
        debug!(playlist_id, count = entries.len(), "fetched playlist entries");
        Ok(entries)
    }

    async fn collect_pages<T: DeserializeOwned>(&self, first: String) -> ProviderResult<Vec<T>> {
        let mut all = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let page: Paging<T> = self.get_json(&url).await?;
            all.extend(page.items.into_iter().flatten());
            next = page.next.filter(|n| *n != url);
        }

        Ok(all)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ProviderResult<T> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(ProviderError::rate_limited(format!(
                "rate limit exceeded{}",
                retry_after
                    .map(|s| format!(", retry after {} seconds", s))
                    .unwrap_or_default()
            )));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::authentication(
                "access token expired or invalid",
            ));
        }

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::authorization("access denied to resource"));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found(format!("{} not found", url)));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::server(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
        })
    }
}

impl MusicService for SpotifyClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn list_playlists<'a>(
        &'a self,
        user: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<PlaylistSummary>>> {
        Box::pin(async move {
            self.playlists(user)
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))
        })
    }

    fn list_tracks<'a>(
        &'a self,
        owner: &'a str,
        playlist_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<PlaylistEntry>>> {
        Box::pin(async move {
            debug!(owner, playlist_id, "listing playlist entries");
            self.playlist_tracks(playlist_id)
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))
        })
    }
}

/// A page of a paginated listing.
#[derive(Debug, Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<Option<T>>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylist {
    id: String,
    name: String,
    owner: Option<ApiUser>,
    external_urls: Option<ApiExternalUrls>,
}

impl ApiPlaylist {
    fn into_summary(self) -> PlaylistSummary {
        PlaylistSummary {
            id: self.id,
            name: self.name,
            owner_id: self.owner.map(|o| o.id),
            url: self.external_urls.and_then(|u| u.spotify),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylistItem {
    added_at: Option<String>,
    added_by: Option<ApiUser>,
    track: Option<ApiTrack>,
}

impl ApiPlaylistItem {
    fn into_entry(self) -> Option<PlaylistEntry> {
        let track = self.track?;
        Some(PlaylistEntry {
            track: TrackRef {
                id: track.id,
                name: track.name,
                artists: track.artists.into_iter().map(|a| a.name).collect(),
            },
            added_at: self.added_at,
            added_by: self.added_by.map(|u| UserRef { id: u.id }),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}
