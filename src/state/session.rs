//! Session state for the signed-in dashboard user.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `SessionStore` is created at startup, populated from the current-user
//! probe, and handed to route guards and anything else that renders
//! differently per role. Observers hold a `watch::Receiver` and react to
//! changes; the store is the only writer.
//!
//! Role checks are exact membership against [`Role`]: a role named
//! `SubAdmin` is not `Admin`.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::fmt;
use std::str::FromStr;

use tokio::sync::watch;

use crate::credentials::{CredentialStore, stored_roles};
use crate::error::ApiError;
use crate::net::api::UserProbe;
use crate::net::types::RoleList;

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Manages users and API keys.
    Admin,
    /// Maintains products, areas and features.
    Maintainer,
    /// Views coverage and reports exploratory tests.
    Tester,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Maintainer => "Maintainer",
            Self::Tester => "Tester",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Self::Admin),
            "Maintainer" => Ok(Self::Maintainer),
            "Tester" => Ok(Self::Tester),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Snapshot of who is signed in. `roles` is empty iff nobody is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl Session {
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        !self.roles.is_empty()
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    #[must_use]
    pub fn is_maintainer(&self) -> bool {
        self.has_role(Role::Maintainer)
    }

    #[must_use]
    pub fn is_tester(&self) -> bool {
        self.has_role(Role::Tester)
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<Session>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Empty, unauthenticated store.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::default());
        Self { tx }
    }

    /// Clone of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Populate the session from the current-user probe.
    ///
    /// Any failure leaves the store empty; nothing is returned to the caller.
    pub async fn fetch_current_user(&self, probe: &dyn UserProbe) {
        match probe.current_user().await {
            Ok(user) => self.set_user(user.user_id, &user.email, user.roles),
            Err(err) => {
                tracing::debug!(error = %err, code = err.error_code(), "current user unavailable");
                self.clear_user();
            }
        }
    }

    /// Like [`SessionStore::fetch_current_user`], but when the API cannot be
    /// reached at all the role list saved at sign-in is used instead.
    ///
    /// Any answer from the server (401, 5xx, bad payload) still clears.
    pub async fn fetch_or_restore(
        &self,
        probe: &dyn UserProbe,
        credentials: &dyn CredentialStore,
        backup: Option<&dyn CredentialStore>,
    ) {
        match probe.current_user().await {
            Ok(user) => self.set_user(user.user_id, &user.email, user.roles),
            Err(ApiError::Network(reason)) => {
                tracing::debug!(%reason, "current user unreachable; using stored roles");
                if !self.restore_roles(credentials, backup) {
                    self.clear_user();
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, code = err.error_code(), "current user unavailable");
                self.clear_user();
            }
        }
    }

    /// Seed the session from the stored role list, without user id or email.
    ///
    /// Returns whether a non-empty role list was found.
    pub fn restore_roles(&self, credentials: &dyn CredentialStore, backup: Option<&dyn CredentialStore>) -> bool {
        let roles = stored_roles(credentials, backup).map(|r| RoleList::from(r).normalize()).unwrap_or_default();
        if roles.is_empty() {
            return false;
        }
        tracing::info!(roles = %roles.join(","), "session restored from stored roles");
        self.tx.send_replace(Session { user_id: None, email: None, roles });
        true
    }

    /// Replace the session. An empty role list clears it instead.
    pub fn set_user(&self, user_id: i64, email: &str, roles: impl Into<RoleList>) {
        let roles = roles.into().normalize();
        if roles.is_empty() {
            self.clear_user();
            return;
        }
        tracing::info!(%user_id, %email, roles = %roles.join(","), "session established");
        self.tx.send_replace(Session { user_id: Some(user_id), email: Some(email.to_owned()), roles });
    }

    pub fn clear_user(&self) {
        self.tx.send_if_modified(|session| {
            if *session == Session::default() {
                return false;
            }
            *session = Session::default();
            true
        });
    }

    /// Clear the session and drop stored credentials.
    pub fn logout(&self, credentials: &dyn CredentialStore) {
        credentials.clear_auth();
        self.clear_user();
        tracing::info!("signed out");
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.tx.borrow().is_logged_in()
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.tx.borrow().has_role(role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    #[must_use]
    pub fn is_maintainer(&self) -> bool {
        self.has_role(Role::Maintainer)
    }

    #[must_use]
    pub fn is_tester(&self) -> bool {
        self.has_role(Role::Tester)
    }
}
