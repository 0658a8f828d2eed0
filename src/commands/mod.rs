pub(crate) mod app;
pub(crate) mod auth;
pub(crate) mod overlay;
pub(crate) mod playback;
pub(crate) mod settings;
pub(crate) mod setup;

pub(crate) use app::*;
pub(crate) use auth::*;
pub(crate) use overlay::*;
pub(crate) use playback::*;
pub(crate) use settings::*;
pub(crate) use setup::*;
