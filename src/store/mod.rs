//! Pluggable access/refresh token storage.
//!
//! The HTTP client reads the access token before every dispatch and the refresh
//! coordinator writes rotated tokens back. Backends:
//! - [`MemoryTokenStore`] for tests and short-lived processes
//! - [`FileTokenStore`] for a per-user persisted session
//! - `KeychainTokenStore` on macOS

mod file;
#[cfg(target_os = "macos")]
mod keychain;
mod memory;
pub mod secure;

use std::str::FromStr;
use std::sync::Arc;

use crate::error::TokenStoreError;

pub use file::FileTokenStore;
#[cfg(target_os = "macos")]
pub use keychain::KeychainTokenStore;
pub use memory::MemoryTokenStore;
pub use secure::{SecureString, TokenPair};

/// Storage for the session's token pair. Token contents are opaque.
pub trait TokenStore: Send + Sync {
    /// Current access token, `None` when unset or unreadable.
    fn access_token(&self) -> Option<SecureString>;

    fn set_access_token(&self, token: &str) -> Result<(), TokenStoreError>;

    /// Current refresh token, `None` when unset or unreadable.
    fn refresh_token(&self) -> Option<SecureString>;

    fn set_refresh_token(&self, token: &str) -> Result<(), TokenStoreError>;

    /// Remove both tokens.
    fn clear(&self) -> Result<(), TokenStoreError>;

    /// Store a full pair, as returned by login.
    fn store_pair(&self, pair: &TokenPair) -> Result<(), TokenStoreError> {
        self.set_access_token(&pair.access_token)?;
        self.set_refresh_token(&pair.refresh_token)
    }

    /// Check if any token is present.
    fn has_tokens(&self) -> bool {
        self.access_token().is_some() || self.refresh_token().is_some()
    }
}

/// Which backend to open, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStoreKind {
    Memory,
    File,
    Keychain,
}

impl FromStr for TokenStoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "keychain" => Ok(Self::Keychain),
            other => Err(format!(
                "unknown token store '{}' (expected memory, file or keychain)",
                other
            )),
        }
    }
}

/// Open the configured backend.
pub fn open_token_store(kind: TokenStoreKind) -> Result<Arc<dyn TokenStore>, TokenStoreError> {
    match kind {
        TokenStoreKind::Memory => Ok(Arc::new(MemoryTokenStore::new())),
        TokenStoreKind::File => Ok(Arc::new(FileTokenStore::in_data_dir()?)),
        #[cfg(target_os = "macos")]
        TokenStoreKind::Keychain => Ok(Arc::new(KeychainTokenStore::new())),
        #[cfg(not(target_os = "macos"))]
        TokenStoreKind::Keychain => Err(TokenStoreError::RetrieveFailed(
            "keychain storage is only available on macOS".to_string(),
        )),
    }
}
