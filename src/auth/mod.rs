//! Usage: Spotify OAuth (authorization code flow, loopback callback, token lifecycle).

pub(crate) mod callback_server;
pub(crate) mod endpoints;
pub(crate) mod login;
pub(crate) mod pkce;
pub(crate) mod session;
pub(crate) mod token_exchange;
