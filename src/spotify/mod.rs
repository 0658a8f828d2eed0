//! Usage: Spotify Web API access and the view models derived from it.

pub(crate) mod client;
pub(crate) mod models;
pub(crate) mod now_playing;
