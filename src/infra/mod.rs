pub(crate) mod app_paths;
pub(crate) mod credentials;
pub(crate) mod json_file;
pub(crate) mod settings;
pub(crate) mod token_store;
