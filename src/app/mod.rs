pub(crate) mod app_state;
pub(crate) mod controls;
pub(crate) mod logging;
pub(crate) mod login_task;
pub(crate) mod overlay;
pub(crate) mod poller;
pub(crate) mod shortcuts;
pub(crate) mod tray;
