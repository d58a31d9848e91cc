//! Token persistence using a local JSON file.
//!
//! The file holds a flat object keyed by fixed identifiers, the same shape a
//! browser keeps in local storage:
//!
//! ```json
//! { "accessToken": "...", "refreshToken": "..." }
//! ```

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use directories::ProjectDirs;
use tracing::{debug, error, warn};
use zeroize::Zeroize;

use super::{SecureString, TokenStore};
use crate::error::TokenStoreError;

/// Token file name.
const TOKENS_FILE: &str = "tokens.json";

/// Key under which the access token is stored.
const ACCESS_KEY: &str = "accessToken";

/// Key under which the refresh token is stored.
const REFRESH_KEY: &str = "refreshToken";

/// Get the default path of the token file.
///
/// Returns `~/.local/share/iris/tokens.json` on Linux and
/// `~/Library/Application Support/dev.iris.iris/tokens.json` on macOS.
pub fn default_tokens_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "iris", "iris").map(|dirs| dirs.data_dir().join(TOKENS_FILE))
}

/// File-backed token store.
pub struct FileTokenStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within the process.
    io: Mutex<()>,
}

impl FileTokenStore {
    /// Store tokens at an explicit path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
        }
    }

    /// Store tokens in the per-user data directory.
    pub fn in_data_dir() -> Result<Self, TokenStoreError> {
        let path = default_tokens_path().ok_or_else(|| {
            TokenStoreError::StoreFailed("Could not determine data directory".to_string())
        })?;
        Ok(Self::with_path(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the token map. A missing or corrupted file reads as empty.
    fn load(&self) -> BTreeMap<String, String> {
        if !self.path.exists() {
            return BTreeMap::new();
        }

        match fs::read_to_string(&self.path) {
            Ok(mut content) => {
                let parsed = serde_json::from_str(&content);
                content.zeroize();
                match parsed {
                    Ok(map) => map,
                    Err(e) => {
                        error!("Failed to parse token file: {}, treating as empty", e);
                        BTreeMap::new()
                    }
                }
            }
            Err(e) => {
                error!("Failed to read token file: {}, treating as empty", e);
                BTreeMap::new()
            }
        }
    }

    fn save(&self, map: &BTreeMap<String, String>) -> Result<(), TokenStoreError> {
        // Create parent directories if they don't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| TokenStoreError::StoreFailed(e.to_string()))?;
        }

        let mut content = serde_json::to_string_pretty(map)
            .map_err(|e| TokenStoreError::StoreFailed(e.to_string()))?;
        let result = write_private(&self.path, content.as_bytes())
            .map_err(|e| TokenStoreError::StoreFailed(e.to_string()));
        content.zeroize();
        result?;

        debug!("Saved tokens to {:?}", self.path);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<SecureString> {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load();
        let value = map.remove(key).map(SecureString::new);
        for v in map.values_mut() {
            v.zeroize();
        }
        value
    }

    fn set(&self, key: &str, token: &str) -> Result<(), TokenStoreError> {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load();
        map.insert(key.to_string(), token.to_string());
        let result = self.save(&map);
        for v in map.values_mut() {
            v.zeroize();
        }
        result
    }
}

/// Write `bytes` to `path`, readable and writable by the owner only.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        options.mode(0o600);
        let mut file = options.open(path)?;
        // The mode only applies on creation; tighten files left by older versions
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(bytes)
    }

    #[cfg(not(unix))]
    {
        options.open(path)?.write_all(bytes)
    }
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Option<SecureString> {
        self.get(ACCESS_KEY)
    }

    fn set_access_token(&self, token: &str) -> Result<(), TokenStoreError> {
        self.set(ACCESS_KEY, token)
    }

    fn refresh_token(&self) -> Option<SecureString> {
        self.get(REFRESH_KEY)
    }

    fn set_refresh_token(&self, token: &str) -> Result<(), TokenStoreError> {
        self.set(REFRESH_KEY, token)
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("Failed to delete token file {:?}: {}", self.path, e);
                Err(TokenStoreError::DeleteFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path() {
        if let Some(path) = default_tokens_path() {
            assert!(path.ends_with("tokens.json"));
        }
    }

    #[test]
    fn test_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::with_path(dir.path().join("nested").join("tokens.json"));

        assert!(store.access_token().is_none());

        store.set_access_token("A").unwrap();
        store.set_refresh_token("R").unwrap();

        // A second handle on the same file sees the persisted values
        let reopened = FileTokenStore::with_path(store.path());
        assert_eq!(reopened.access_token().unwrap().as_str(), "A");
        assert_eq!(reopened.refresh_token().unwrap().as_str(), "R");

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw.get("accessToken").map(String::as_str), Some("A"));

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert!(reopened.refresh_token().is_none());

        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = FileTokenStore::with_path(&path);

        store.set_access_token("A").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // A pre-existing world-readable file is tightened on the next write
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        store.set_refresh_token("R").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupted_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "not json").unwrap();

        let store = FileTokenStore::with_path(&path);
        assert!(store.access_token().is_none());

        store.set_access_token("fresh").unwrap();
        assert_eq!(store.access_token().unwrap().as_str(), "fresh");
    }
}
