//! macOS Keychain integration for secure token storage.
//!
//! Stores the access and refresh tokens as generic passwords in the login Keychain.

use security_framework::passwords::{
    delete_generic_password, get_generic_password, set_generic_password,
};
use tracing::debug;

use super::{SecureString, TokenStore};
use crate::error::TokenStoreError;

/// Keychain service identifier.
const SERVICE: &str = "dev.iris.client";

/// Account names for the stored items.
const ACCOUNT_ACCESS_TOKEN: &str = "accessToken";
const ACCOUNT_REFRESH_TOKEN: &str = "refreshToken";

/// Keychain-backed token store.
#[derive(Debug, Default)]
pub struct KeychainTokenStore;

impl KeychainTokenStore {
    pub fn new() -> Self {
        Self
    }
}

fn store(account: &str, token: &str) -> Result<(), TokenStoreError> {
    set_generic_password(SERVICE, account, token.as_bytes())
        .map_err(|e| TokenStoreError::StoreFailed(e.to_string()))
}

fn retrieve(account: &str) -> Option<SecureString> {
    match get_generic_password(SERVICE, account) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(token) => Some(SecureString::new(token)),
            Err(e) => {
                debug!("Keychain item {} is not valid UTF-8: {}", account, e);
                None
            }
        },
        Err(e) => {
            if !is_not_found_error(&e) {
                debug!("Failed to read keychain item {}: {}", account, e);
            }
            None
        }
    }
}

/// Helper to check if a security framework error is "item not found".
fn is_not_found_error(error: &security_framework::base::Error) -> bool {
    // errSecItemNotFound = -25300
    error.code() == -25300
}

impl TokenStore for KeychainTokenStore {
    fn access_token(&self) -> Option<SecureString> {
        retrieve(ACCOUNT_ACCESS_TOKEN)
    }

    fn set_access_token(&self, token: &str) -> Result<(), TokenStoreError> {
        store(ACCOUNT_ACCESS_TOKEN, token)
    }

    fn refresh_token(&self) -> Option<SecureString> {
        retrieve(ACCOUNT_REFRESH_TOKEN)
    }

    fn set_refresh_token(&self, token: &str) -> Result<(), TokenStoreError> {
        store(ACCOUNT_REFRESH_TOKEN, token)
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        // Delete each item, ignoring "not found" errors
        let results = [
            delete_generic_password(SERVICE, ACCOUNT_ACCESS_TOKEN),
            delete_generic_password(SERVICE, ACCOUNT_REFRESH_TOKEN),
        ];

        for result in results {
            if let Err(e) = result {
                if !is_not_found_error(&e) {
                    return Err(TokenStoreError::DeleteFailed(e.to_string()));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require Keychain access and may prompt for permission

    #[test]
    #[ignore = "requires keychain access"]
    fn test_store_and_retrieve_token() {
        let store = KeychainTokenStore::new();
        store.set_access_token("test_access_token_12345").expect("Failed to store token");

        let retrieved = store.access_token().expect("Failed to retrieve token");
        assert_eq!(retrieved.as_str(), "test_access_token_12345");

        store.clear().expect("Failed to delete tokens");
    }

    #[test]
    #[ignore = "requires keychain access"]
    fn test_clear() {
        let store = KeychainTokenStore::new();
        store.set_access_token("test_access").expect("Failed to store access token");
        store.set_refresh_token("test_refresh").expect("Failed to store refresh token");

        store.clear().expect("Failed to delete all");

        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }
}
