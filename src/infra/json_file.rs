//! Usage: Small JSON documents on disk with atomic replace (tmp + backup + rename).

use crate::shared::error::AppResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}{suffix}"))
}

pub(crate) fn read<T: DeserializeOwned>(path: &Path) -> AppResult<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(format!("SYSTEM_ERROR: failed to read {}: {err}", path.display()).into())
        }
    };
    let value = serde_json::from_str(&content)
        .map_err(|e| format!("SYSTEM_ERROR: failed to parse {}: {e}", path.display()))?;
    Ok(Some(value))
}

/// Writes `value` so readers see either the old or the new document, never a partial one.
/// `private` restricts the file to the current user on unix.
pub(crate) fn write_atomic<T: Serialize>(path: &Path, value: &T, private: bool) -> AppResult<()> {
    let tmp_path = sibling(path, ".tmp");
    let backup_path = sibling(path, ".bak");

    let content = serde_json::to_vec_pretty(value)
        .map_err(|e| format!("SYSTEM_ERROR: failed to serialize {}: {e}", path.display()))?;

    std::fs::write(&tmp_path, content)
        .map_err(|e| format!("SYSTEM_ERROR: failed to write {}: {e}", tmp_path.display()))?;
    if private {
        restrict_permissions(&tmp_path)?;
    }

    if backup_path.exists() {
        let _ = std::fs::remove_file(&backup_path);
    }
    if path.exists() {
        std::fs::rename(path, &backup_path)
            .map_err(|e| format!("SYSTEM_ERROR: failed to back up {}: {e}", path.display()))?;
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::rename(&backup_path, path);
        return Err(format!("SYSTEM_ERROR: failed to finalize {}: {e}", path.display()).into());
    }

    if backup_path.exists() {
        let _ = std::fs::remove_file(&backup_path);
    }
    Ok(())
}

pub(crate) fn remove(path: &Path) -> AppResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(format!("SYSTEM_ERROR: failed to remove {}: {err}", path.display()).into()),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| format!("SYSTEM_ERROR: failed to restrict {}: {e}", path.display()).into())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> AppResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Doc {
        n: u32,
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc: Option<Doc> = read(&dir.path().join("nope.json")).expect("read");
        assert!(doc.is_none());
    }

    #[test]
    fn write_then_replace_leaves_no_temp_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.json");
        write_atomic(&path, &Doc { n: 1 }, false).expect("first write");
        write_atomic(&path, &Doc { n: 2 }, true).expect("second write");

        assert_eq!(read::<Doc>(&path).expect("read"), Some(Doc { n: 2 }));
        assert!(!dir.path().join("doc.json.tmp").exists());
        assert!(!dir.path().join("doc.json.bak").exists());
    }

    #[cfg(unix)]
    #[test]
    fn private_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("secret.json");
        write_atomic(&path, &Doc { n: 3 }, true).expect("write");
        let mode = std::fs::metadata(&path).expect("meta").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").expect("write");
        let err = read::<Doc>(&path).expect_err("should fail");
        assert_eq!(err.code(), "SYSTEM_ERROR");
    }

    #[test]
    fn remove_reports_whether_file_existed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.json");
        assert!(!remove(&path).expect("remove missing"));
        write_atomic(&path, &Doc { n: 1 }, false).expect("write");
        assert!(remove(&path).expect("remove existing"));
    }
}
