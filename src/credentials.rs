//! Session-scoped credential storage.
//!
//! SYSTEM CONTEXT
//! ==============
//! The dashboard keeps its access token, refresh token and role list in a
//! per-tab key/value store. The client reads the token on every request and
//! writes it back after a refresh; nothing here defines persistence beyond
//! the lifetime of the store value itself.
//!
//! The role list may also live in a second, longer-lived store under
//! `roles_backup`. [`stored_roles`] falls back to it and copies it back into
//! the session store.

#[cfg(test)]
#[path = "credentials_test.rs"]
mod credentials_test;

use std::collections::HashMap;
use std::sync::RwLock;

pub const TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const ROLES_KEY: &str = "roles";
pub const ROLES_BACKUP_KEY: &str = "roles_backup";

/// Key/value store holding auth credentials.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);

    /// Current access token, ignoring empty values.
    fn token(&self) -> Option<String> {
        self.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Drop every auth key.
    fn clear_auth(&self) {
        for key in [TOKEN_KEY, REFRESH_TOKEN_KEY, ROLES_KEY] {
            self.remove(key);
        }
    }
}

/// In-memory store scoped to the owning process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with an access token and optional refresh token.
    #[must_use]
    pub fn with_tokens(token: &str, refresh_token: Option<&str>) -> Self {
        let store = Self::new();
        store.set(TOKEN_KEY, token);
        if let Some(refresh) = refresh_token {
            store.set(REFRESH_TOKEN_KEY, refresh);
        }
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(key);
    }
}

/// Role list saved at sign-in, as stored (comma separated).
///
/// Reads `roles` from `session`; when that is missing or empty, restores it
/// from `roles_backup` in `backup`.
#[must_use]
pub fn stored_roles(session: &dyn CredentialStore, backup: Option<&dyn CredentialStore>) -> Option<String> {
    if let Some(roles) = session.get(ROLES_KEY).filter(|r| !r.is_empty()) {
        return Some(roles);
    }
    let roles = backup?.get(ROLES_BACKUP_KEY).filter(|r| !r.is_empty())?;
    tracing::debug!("role list restored from backup store");
    session.set(ROLES_KEY, &roles);
    Some(roles)
}
