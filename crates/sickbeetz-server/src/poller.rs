//! Periodic playlist poller.
//!
//! Every tick resolves the playlist by name, lists its entries, announces the
//! ones added after the checkpoint and then moves the checkpoint to the tick's
//! start instant. Any failure leaves the checkpoint untouched, so the next
//! tick re-examines the same window.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sickbeetz_core::{encode_timestamp, is_after};
use sickbeetz_providers::{MusicService, PlaylistEntry, PlaylistSummary};
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::announcement::announcement;
use crate::checkpoint::Checkpoint;
use crate::error::{ServerError, ServerResult};
use crate::notify::Messenger;
use crate::signals::ShutdownSignal;

/// Consecutive token rejections after which the poller logs at error level.
const TOKEN_REJECTION_ESCALATION: u32 = 3;

/// Poller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between tick starts.
    pub interval: Duration,
    /// User whose playlists are listed.
    pub user: String,
    /// Owner passed along when listing the playlist's entries.
    pub playlist_owner: String,
    /// Exact, case-sensitive playlist name.
    pub playlist_name: String,
    /// Channel the announcements go to.
    pub channel: String,
    /// Display name of the announcements.
    pub bot_name: String,
    /// Link appended to announcements; falls back to the playlist's own URL.
    pub playlist_url: Option<String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            user: String::new(),
            playlist_owner: String::new(),
            playlist_name: "SickBeetz".to_string(),
            channel: "tests".to_string(),
            bot_name: "New Sick Beats!".to_string(),
            playlist_url: None,
        }
    }
}

impl PollerConfig {
    /// Creates a config polling `user`'s playlists; the owner defaults to the user.
    pub fn new(user: impl Into<String>) -> Self {
        let user = user.into();
        Self {
            playlist_owner: user.clone(),
            user,
            ..Default::default()
        }
    }

    /// Builder: set the tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Builder: set the playlist owner.
    pub fn with_playlist_owner(mut self, owner: impl Into<String>) -> Self {
        self.playlist_owner = owner.into();
        self
    }

    /// Builder: set the playlist name.
    pub fn with_playlist_name(mut self, name: impl Into<String>) -> Self {
        self.playlist_name = name.into();
        self
    }

    /// Builder: set the channel and display name.
    pub fn with_channel(mut self, channel: impl Into<String>, bot_name: impl Into<String>) -> Self {
        self.channel = channel.into();
        self.bot_name = bot_name.into();
        self
    }

    /// Builder: set the link appended to announcements.
    pub fn with_playlist_url(mut self, url: impl Into<String>) -> Self {
        self.playlist_url = Some(url.into());
        self
    }
}

/// Outcome of a successful tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// ID of the resolved playlist.
    pub playlist_id: String,
    /// Number of entries listed.
    pub examined: usize,
    /// Number of announcements posted.
    pub announced: usize,
    /// The new checkpoint.
    pub checkpoint: DateTime<Utc>,
}

/// Drives ticks against a music service and a messenger.
pub struct Poller<M, N> {
    music: M,
    messenger: N,
    checkpoint: Checkpoint,
    config: PollerConfig,
}

impl<M: MusicService, N: Messenger> Poller<M, N> {
    /// Creates a new poller.
    pub fn new(music: M, messenger: N, checkpoint: Checkpoint, config: PollerConfig) -> Self {
        Self {
            music,
            messenger,
            checkpoint,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Runs ticks until `shutdown` fires or a fatal error occurs.
    ///
    /// The first tick starts immediately. Ticks never overlap: a slow tick
    /// pushes the following ones back.
    pub async fn run(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = shutdown.wait();
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.config.interval.as_secs(),
            playlist = %self.config.playlist_name,
            user = %self.config.user,
            service = self.music.name(),
            "Poller started"
        );

        let mut rejections = RejectionStreak::default();

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Poller stopping");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            let now = Utc::now();
            let span = info_span!("tick", now = %encode_timestamp(&now));
            match self.tick_at(now).instrument(span).await {
                Ok(report) => {
                    rejections.reset();
                    debug!(
                        examined = report.examined,
                        announced = report.announced,
                        "Tick completed"
                    );
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Tick failed, stopping");
                    return Err(e);
                }
                Err(e) => {
                    if rejections.record(&e) {
                        error!(
                            error = %e,
                            failures = rejections.count(),
                            "Access token keeps being rejected; remove the token file and restart to authorize again"
                        );
                    } else {
                        warn!(error = %e, "Tick failed, retrying next tick");
                    }
                }
            }
        }
    }

    /// Runs a single tick with `now` as the instant the checkpoint moves to.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> ServerResult<TickReport> {
        let playlist = self.resolve_playlist().await?;

        let entries = self
            .music
            .list_tracks(&self.config.playlist_owner, &playlist.id)
            .await
            .map_err(ServerError::Remote)?;

        let since = self.checkpoint.read()?;
        let fresh = added_after(&entries, &since);
        debug!(
            examined = entries.len(),
            fresh = fresh.len(),
            since = %encode_timestamp(&since),
            "Selected new entries"
        );

        let link = self
            .config
            .playlist_url
            .as_deref()
            .or(playlist.url.as_deref());

        for entry in &fresh {
            let text = announcement(&entry.track, link);
            self.messenger
                .post_message(&self.config.channel, &text, &self.config.bot_name)
                .await?;
            info!(
                track = %entry.track.name,
                added_at = entry.added_at.as_deref().unwrap_or_default(),
                "Announced track"
            );
        }

        self.checkpoint.write(now)?;

        Ok(TickReport {
            playlist_id: playlist.id,
            examined: entries.len(),
            announced: fresh.len(),
            checkpoint: now,
        })
    }

    async fn resolve_playlist(&self) -> ServerResult<PlaylistSummary> {
        let playlists = self
            .music
            .list_playlists(&self.config.user)
            .await
            .map_err(ServerError::Remote)?;

        playlists
            .into_iter()
            .find(|p| p.name == self.config.playlist_name)
            .ok_or_else(|| {
                ServerError::playlist_not_found(&self.config.playlist_name, &self.config.user)
            })
    }
}

/// Counts consecutive ticks that failed because the access token was refused.
#[derive(Debug, Default)]
struct RejectionStreak {
    count: u32,
}

impl RejectionStreak {
    /// Records a failed tick. Returns true once the streak warrants an error.
    fn record(&mut self, err: &ServerError) -> bool {
        if err.is_token_rejected() {
            self.count += 1;
        } else {
            self.count = 0;
        }
        self.count >= TOKEN_REJECTION_ESCALATION
    }

    fn reset(&mut self) {
        self.count = 0;
    }

    fn count(&self) -> u32 {
        self.count
    }
}

/// Entries added strictly after `since`, in playlist order.
///
/// Entries without an `added_at` value are never selected.
pub fn added_after<'a>(entries: &'a [PlaylistEntry], since: &DateTime<Utc>) -> Vec<&'a PlaylistEntry> {
    entries
        .iter()
        .filter(|entry| {
            entry
                .added_at
                .as_deref()
                .is_some_and(|added_at| is_after(added_at, since))
        })
        .collect()
}
