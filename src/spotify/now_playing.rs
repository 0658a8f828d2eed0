//! Usage: View models sent to the WebView (now playing, queue entries, playlist entries).

use crate::spotify::models::{PlaybackState, Queue, SimplifiedPlaylist, Track};
use serde::Serialize;

pub(crate) const IDLE_TITLE: &str = "No Active Playback";
pub(crate) const IDLE_ARTISTS: &str = "Play something in Spotify";
const MAX_DISPLAY_CHARS: usize = 30;
const TRUNCATED_KEEP_CHARS: usize = 28;

/// Keeps at most 30 chars; longer text becomes 28 chars + `...`.
pub(crate) fn truncate_display(text: &str) -> String {
    if text.chars().count() <= MAX_DISPLAY_CHARS {
        return text.to_string();
    }
    let kept: String = text.chars().take(TRUNCATED_KEEP_CHARS).collect();
    format!("{kept}...")
}

fn joined_artists(track: &Track) -> String {
    track.artist_names().join(", ")
}

#[derive(Debug, Clone, PartialEq, Serialize, specta::Type)]
pub struct NowPlayingView {
    pub active: bool,
    pub title: String,
    pub artists: String,
    pub is_playing: bool,
    pub track_id: Option<String>,
    pub album_art_url: Option<String>,
    pub volume_percent: Option<u32>,
    pub device_name: Option<String>,
}

impl NowPlayingView {
    pub fn idle() -> Self {
        Self {
            active: false,
            title: IDLE_TITLE.to_string(),
            artists: IDLE_ARTISTS.to_string(),
            is_playing: false,
            track_id: None,
            album_art_url: None,
            volume_percent: None,
            device_name: None,
        }
    }

    pub(crate) fn from_playback(state: Option<&PlaybackState>) -> Self {
        let Some(state) = state else {
            return Self::idle();
        };
        let Some(item) = state.item.as_ref() else {
            return Self::idle();
        };
        Self {
            active: true,
            title: truncate_display(&item.name),
            artists: truncate_display(&joined_artists(item)),
            is_playing: state.is_playing,
            track_id: item.id.clone(),
            album_art_url: item.cover_url().map(str::to_string),
            volume_percent: state.device.as_ref().and_then(|d| d.volume_percent),
            device_name: state.device.as_ref().map(|d| d.name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, specta::Type)]
pub struct QueueEntryView {
    pub name: String,
    pub artists: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, specta::Type)]
pub struct QueueView {
    pub now_playing: Option<QueueEntryView>,
    pub upcoming: Vec<QueueEntryView>,
}

fn queue_entry(track: &Track) -> QueueEntryView {
    QueueEntryView {
        name: track.name.clone(),
        artists: joined_artists(track),
    }
}

impl QueueView {
    pub(crate) fn from_queue(queue: &Queue, limit: usize) -> Self {
        Self {
            now_playing: queue.currently_playing.as_ref().map(queue_entry),
            upcoming: queue.queue.iter().take(limit).map(queue_entry).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, specta::Type)]
pub struct PlaylistEntryView {
    pub id: String,
    pub name: String,
    pub track_count: u32,
    pub owner: Option<String>,
    pub image_url: Option<String>,
}

impl From<&SimplifiedPlaylist> for PlaylistEntryView {
    fn from(playlist: &SimplifiedPlaylist) -> Self {
        Self {
            id: playlist.id.clone(),
            name: playlist.name.clone(),
            track_count: playlist.tracks.total,
            owner: playlist.owner.display_name.clone(),
            image_url: playlist
                .images
                .first()
                .map(|img| img.url.clone())
                .filter(|url| !url.is_empty()),
        }
    }
}
