use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const DOTDIR_NAME: &str = ".spotify-overlay-test";

/// Variables that would leak the developer's Spotify app into a test run.
const CREDENTIAL_VARS: [&str; 3] = [
    "SPOTIFY_CLIENT_ID",
    "SPOTIFY_CLIENT_SECRET",
    "SPOTIFY_REDIRECT_URI",
];

/// Process env snapshot; every touched key is put back on drop, newest first.
#[derive(Default)]
struct ScopedEnv {
    original: Vec<(&'static str, Option<OsString>)>,
}

impl ScopedEnv {
    fn remember(&mut self, key: &'static str) {
        if !self.original.iter().any(|(k, _)| *k == key) {
            self.original.push((key, std::env::var_os(key)));
        }
    }

    fn set(&mut self, key: &'static str, value: impl Into<OsString>) {
        self.remember(key);
        std::env::set_var(key, value.into());
    }

    fn unset(&mut self, key: &'static str) {
        self.remember(key);
        std::env::remove_var(key);
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        while let Some((key, value)) = self.original.pop() {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

/// Mock Tauri app whose data dir lives in a throwaway HOME.
///
/// Holds a process-wide lock: tests touching env vars run one at a time.
pub struct TestApp {
    app: tauri::App<tauri::test::MockRuntime>,
    env: ScopedEnv,
    home: TempDir,
    _serial: MutexGuard<'static, ()>,
}

impl TestApp {
    pub fn new() -> Self {
        let serial = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let home = tempfile::tempdir().expect("tempdir");

        let mut env = ScopedEnv::default();
        env.set("HOME", home.path());
        // Tauri resolves the home dir from USERPROFILE on Windows.
        env.set("USERPROFILE", home.path());
        env.set("SPOTIFY_OVERLAY_DOTDIR_NAME", DOTDIR_NAME);
        for key in CREDENTIAL_VARS {
            env.unset(key);
        }

        Self {
            app: tauri::test::mock_app(),
            env,
            home,
            _serial: serial,
        }
    }

    pub fn handle(&self) -> tauri::AppHandle<tauri::test::MockRuntime> {
        self.app.handle().clone()
    }

    /// Sets an environment variable until this app is dropped.
    #[allow(dead_code)]
    pub fn set_env(&mut self, key: &'static str, value: &str) {
        self.env.set(key, value);
    }

    /// Writes `contents` to `name` inside the app data dir, bypassing the app's own writers.
    #[allow(dead_code)]
    pub fn write_data_file(&self, name: &str, contents: &str) -> PathBuf {
        let dir = self.home.path().join(DOTDIR_NAME);
        std::fs::create_dir_all(&dir).expect("create data dir");
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("write data file");
        path
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

fn field<'a>(value: &'a serde_json::Value, key: &str) -> &'a serde_json::Value {
    value
        .get(key)
        .unwrap_or_else(|| panic!("missing field {key}: {value}"))
}

#[allow(dead_code)]
pub fn json_i64(value: &serde_json::Value, key: &str) -> i64 {
    field(value, key)
        .as_i64()
        .unwrap_or_else(|| panic!("field {key} is not an integer: {value}"))
}

#[allow(dead_code)]
pub fn json_bool(value: &serde_json::Value, key: &str) -> bool {
    field(value, key)
        .as_bool()
        .unwrap_or_else(|| panic!("field {key} is not a bool: {value}"))
}

#[allow(dead_code)]
pub fn json_str<'a>(value: &'a serde_json::Value, key: &str) -> &'a str {
    field(value, key)
        .as_str()
        .unwrap_or_else(|| panic!("field {key} is not a string: {value}"))
}
