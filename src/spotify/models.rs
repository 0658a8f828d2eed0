//! Usage: Serde models for the subset of the Spotify Web API used by the overlay.

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Image {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Artist {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Album {
    pub name: String,
    pub images: Vec<Image>,
}

/// A track, or an episode reduced to the same fields (`show` stands in for artists).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Track {
    pub id: Option<String>,
    pub name: String,
    pub artists: Vec<Artist>,
    pub album: Option<Album>,
    pub duration_ms: u64,
    pub uri: String,
    pub show: Option<Show>,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Show {
    pub name: String,
}

impl Track {
    pub(crate) fn artist_names(&self) -> Vec<&str> {
        if self.artists.is_empty() {
            return self.show.iter().map(|s| s.name.as_str()).collect();
        }
        self.artists.iter().map(|a| a.name.as_str()).collect()
    }

    /// Largest cover image; Spotify lists images widest first.
    pub(crate) fn cover_url(&self) -> Option<&str> {
        self.album
            .as_ref()
            .map(|a| a.images.as_slice())
            .filter(|images| !images.is_empty())
            .unwrap_or(self.images.as_slice())
            .first()
            .map(|img| img.url.as_str())
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Device {
    pub id: Option<String>,
    pub name: String,
    pub is_active: bool,
    pub volume_percent: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct PlaybackState {
    pub is_playing: bool,
    pub item: Option<Track>,
    pub device: Option<Device>,
    pub progress_ms: Option<u64>,
    pub shuffle_state: bool,
    pub repeat_state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Queue {
    pub currently_playing: Option<Track>,
    pub queue: Vec<Track>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Paging<T> {
    pub items: Vec<T>,
    pub total: u32,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct PlaylistOwner {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct PlaylistTracksRef {
    pub total: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct SimplifiedPlaylist {
    pub id: String,
    pub name: String,
    pub owner: PlaylistOwner,
    // Spotify sends `null` for playlists without a cover.
    #[serde(deserialize_with = "null_as_default")]
    pub images: Vec<Image>,
    pub tracks: PlaylistTracksRef,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Web API error body: `{"error": {"status": 404, "message": "...", "reason": "NO_ACTIVE_DEVICE"}}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ApiErrorDetail {
    pub status: u16,
    pub message: String,
    pub reason: Option<String>,
}
