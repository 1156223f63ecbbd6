//! Text of the message posted for a newly added track.

use sickbeetz_providers::TrackRef;

/// Builds the announcement for `track`.
///
/// The artist suffix is left out when the service reports no artists, and
/// the link line when no playlist URL is known.
pub fn announcement(track: &TrackRef, playlist_url: Option<&str>) -> String {
    let mut text = String::from("Someone just shared a new track!\n");
    text.push_str(&track.name);
    if !track.artists.is_empty() {
        text.push_str(" by ");
        text.push_str(&track.artists.join(", "));
    }
    if let Some(url) = playlist_url.filter(|u| !u.is_empty()) {
        text.push_str("\nCheck it out! ");
        text.push_str(url);
    }
    text
}
