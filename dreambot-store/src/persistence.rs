//! File persistence helpers.
//!
//! JSON files are written atomically and, on Unix, readable only by the
//! owner since they may carry API tokens in request headers.

use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default configuration directory.
///
/// - Linux: `~/.config/dreambot`
/// - macOS: `~/Library/Application Support/dreambot`
/// - Windows: `%APPDATA%\dreambot`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|c| c.join("dreambot"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

// ============================================================================
// Permissions
// ============================================================================

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(mode);
    tokio::fs::set_permissions(path, perms).await?;

    debug!(path = %path.display(), mode = %format!("{mode:o}"), "Set permissions");
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), StoreError> {
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Creates `path` (0o700) if it does not exist.
pub async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if !path.exists() {
        debug!(path = %path.display(), "Creating directory");
        tokio::fs::create_dir_all(path).await?;
        set_mode(path, 0o700).await?;
    }
    Ok(())
}

/// Saves data as pretty JSON.
///
/// Parent directories are created, the write goes through a temp file and
/// a rename, and the result is made owner-only (0o600).
pub async fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    debug!(path = %path.display(), "Saving JSON file");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent).await?;
    }

    let json = serde_json::to_string_pretty(data)?;

    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &json).await?;
    tokio::fs::rename(&temp_path, path).await?;

    set_mode(path, 0o600).await?;
    Ok(())
}

/// Loads data from a JSON file.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    debug!(path = %path.display(), "Loading JSON file");

    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Loads data from a JSON file, returning the default if it is missing or
/// unreadable.
pub async fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match load_json(path).await {
        Ok(data) => data,
        Err(e) => {
            if !e.is_not_found() {
                warn!(path = %path.display(), error = %e, "Failed to load, using defaults");
            }
            T::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("dreambot/config.json"));
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b").join("data.json");

        save_json(&nested, &serde_json::json!({"key": "value"}))
            .await
            .unwrap();

        assert!(nested.exists());
        assert!(!nested.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_json::<serde_json::Value>(&temp_dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_load_or_default_on_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        tokio::fs::write(&path, "{ nope").await.unwrap();

        let value: Vec<String> = load_json_or_default(&path).await;
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_dir_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("state");

        ensure_dir(&dir).await.unwrap();
        ensure_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secret.json");
        save_json(&path, &serde_json::json!({"token": "x"})).await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
