//! Process-local token storage.

use std::sync::{Mutex, PoisonError};

use super::{SecureString, TokenStore};
use crate::error::TokenStoreError;

#[derive(Default)]
struct Slots {
    access: Option<SecureString>,
    refresh: Option<SecureString>,
}

/// In-memory token store. Tokens vanish with the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    slots: Mutex<Slots>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slots<R>(&self, f: impl FnOnce(&mut Slots) -> R) -> R {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut slots)
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<SecureString> {
        self.with_slots(|s| s.access.clone())
    }

    fn set_access_token(&self, token: &str) -> Result<(), TokenStoreError> {
        self.with_slots(|s| s.access = Some(SecureString::from(token)));
        Ok(())
    }

    fn refresh_token(&self) -> Option<SecureString> {
        self.with_slots(|s| s.refresh.clone())
    }

    fn set_refresh_token(&self, token: &str) -> Result<(), TokenStoreError> {
        self.with_slots(|s| s.refresh = Some(SecureString::from(token)));
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.with_slots(|s| {
            s.access = None;
            s.refresh = None;
        });
        Ok(())
    }
}
