use super::*;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::credentials::{MemoryCredentialStore, ROLES_BACKUP_KEY, ROLES_KEY};
use crate::error::ApiError;
use crate::navigation::RecordingNavigator;
use crate::net::client::HttpClient;
use crate::net::mock_server::{self, Mock};
use crate::net::types::CurrentUser;

// =========================================================================
// MockProbe
// =========================================================================

struct MockProbe {
    result: Result<CurrentUser, ApiError>,
}

impl MockProbe {
    fn user(user_id: i64, email: &str, roles: &str) -> Self {
        Self { result: Ok(CurrentUser { user_id, email: email.into(), roles: roles.into() }) }
    }

    fn failing(err: ApiError) -> Self {
        Self { result: Err(err) }
    }
}

#[async_trait::async_trait]
impl UserProbe for MockProbe {
    async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        self.result.clone()
    }
}

fn assert_logged_out(store: &SessionStore) {
    assert!(!store.is_logged_in());
    assert!(!store.is_admin());
    assert!(!store.is_maintainer());
    assert!(!store.is_tester());
    assert_eq!(store.snapshot(), Session::default());
}

// =========================================================================
// Role
// =========================================================================

#[test]
fn role_round_trips_through_str() {
    for role in [Role::Admin, Role::Maintainer, Role::Tester] {
        assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        assert_eq!(role.to_string(), role.as_str());
    }
}

#[test]
fn role_parse_is_case_sensitive() {
    assert!("admin".parse::<Role>().is_err());
    assert!("SubAdmin".parse::<Role>().is_err());
}

// =========================================================================
// Defaults and setters
// =========================================================================

#[test]
fn new_store_is_logged_out() {
    assert_logged_out(&SessionStore::new());
}

#[test]
fn set_user_from_delimited_roles() {
    let store = SessionStore::new();
    store.set_user(7, "a@b.com", "Admin,Tester");
    let session = store.snapshot();
    assert_eq!(session.user_id, Some(7));
    assert_eq!(session.email.as_deref(), Some("a@b.com"));
    assert_eq!(session.roles, vec!["Admin", "Tester"]);
    assert!(store.is_logged_in());
}

#[test]
fn set_user_from_role_sequence() {
    let store = SessionStore::new();
    store.set_user(3, "m@b.com", vec!["Maintainer".to_owned()]);
    assert!(store.is_maintainer());
    assert!(!store.is_admin());
}

#[test]
fn set_user_with_no_roles_clears() {
    let store = SessionStore::new();
    store.set_user(7, "a@b.com", "Admin");
    store.set_user(8, "b@b.com", "");
    assert_logged_out(&store);
}

#[test]
fn clear_user_always_logs_out() {
    let store = SessionStore::new();
    store.clear_user();
    assert_logged_out(&store);

    store.set_user(7, "a@b.com", "Admin,Maintainer,Tester");
    store.clear_user();
    assert_logged_out(&store);
}

#[test]
fn role_checks_are_exact_membership() {
    let store = SessionStore::new();
    store.set_user(1, "x@b.com", vec!["SubAdmin".to_owned()]);
    assert!(store.is_logged_in());
    assert!(!store.is_admin());

    store.set_user(1, "x@b.com", "admin,Testers,Maintainer2");
    assert!(!store.is_admin());
    assert!(!store.is_tester());
    assert!(!store.is_maintainer());
}

#[test]
fn logout_clears_session_and_credentials() {
    let store = SessionStore::new();
    let creds = MemoryCredentialStore::with_tokens("t", Some("r"));
    creds.set(ROLES_KEY, "Admin");
    store.set_user(7, "a@b.com", "Admin");

    store.logout(&creds);
    assert_logged_out(&store);
    assert!(creds.token().is_none());
    assert!(creds.refresh_token().is_none());
    assert!(creds.get(ROLES_KEY).is_none());
}

// =========================================================================
// Observers
// =========================================================================

#[tokio::test]
async fn subscribers_see_changes() {
    let store = SessionStore::new();
    let mut rx = store.subscribe();
    assert!(!rx.borrow().is_logged_in());

    store.set_user(7, "a@b.com", "Tester");
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_tester());

    store.clear_user();
    rx.changed().await.unwrap();
    assert!(!rx.borrow_and_update().is_logged_in());
}

#[tokio::test]
async fn clearing_empty_store_does_not_notify() {
    let store = SessionStore::new();
    let rx = store.subscribe();
    store.clear_user();
    assert!(!rx.has_changed().unwrap());
}

// =========================================================================
// fetch_current_user
// =========================================================================

#[tokio::test]
async fn fetch_success_populates_roles() {
    let store = SessionStore::new();
    store.fetch_current_user(&MockProbe::user(7, "a@b.com", "Admin,Tester")).await;
    assert!(store.is_logged_in());
    assert!(store.is_admin());
    assert!(store.is_tester());
    assert!(!store.is_maintainer());
}

#[tokio::test]
async fn fetch_network_failure_clears() {
    let store = SessionStore::new();
    store.set_user(7, "a@b.com", "Admin");
    store
        .fetch_current_user(&MockProbe::failing(ApiError::Network("connection refused".into())))
        .await;
    assert_logged_out(&store);
}

#[tokio::test]
async fn fetch_http_and_malformed_failures_clear() {
    let store = SessionStore::new();
    for err in [ApiError::from_status(500, ""), ApiError::MalformedResponse("no data".into())] {
        store.set_user(7, "a@b.com", "Tester");
        store.fetch_current_user(&MockProbe::failing(err)).await;
        assert_logged_out(&store);
    }
}

#[tokio::test]
async fn fetch_through_http_client() {
    let mock = Arc::new(Mock::default());
    let base = mock_server::spawn(mock.clone()).await;
    let creds = Arc::new(MemoryCredentialStore::with_tokens("fresh", None));
    let client = HttpClient::new(ClientConfig::new(&base), creds, Arc::new(RecordingNavigator::new())).unwrap();

    let store = SessionStore::new();
    store.fetch_current_user(&client).await;
    assert_eq!(mock.me_hits(), 1);
    assert_eq!(store.snapshot().user_id, Some(7));
    assert!(store.is_admin());
    assert!(store.is_tester());
    assert!(!store.is_maintainer());
}

#[tokio::test]
async fn fetch_through_unreachable_client_logs_out() {
    let base = mock_server::dead_url().await;
    let nav = Arc::new(RecordingNavigator::new());
    let client = HttpClient::new(ClientConfig::new(&base), Arc::new(MemoryCredentialStore::new()), nav.clone()).unwrap();

    let store = SessionStore::new();
    store.fetch_current_user(&client).await;
    assert_logged_out(&store);
    assert_eq!(nav.count(), 0);
}

#[tokio::test]
async fn fetch_unauthorized_probe_never_redirects() {
    let mock = Arc::new(Mock::default());
    let base = mock_server::spawn(mock.clone()).await;
    let nav = Arc::new(RecordingNavigator::new());
    let creds = Arc::new(MemoryCredentialStore::with_tokens("stale", None));
    let client = HttpClient::new(ClientConfig::new(&base), creds, nav.clone()).unwrap();

    let store = SessionStore::new();
    store.fetch_current_user(&client).await;
    assert_logged_out(&store);
    assert_eq!(nav.count(), 0);
}

// =========================================================================
// Stored roles fallback
// =========================================================================

#[test]
fn restore_roles_from_session_store() {
    let store = SessionStore::new();
    let creds = MemoryCredentialStore::new();
    creds.set(ROLES_KEY, "Maintainer,Tester");

    assert!(store.restore_roles(&creds, None));
    let session = store.snapshot();
    assert_eq!(session.user_id, None);
    assert_eq!(session.roles, vec!["Maintainer", "Tester"]);
    assert!(store.is_maintainer());
    assert!(!store.is_admin());
}

#[test]
fn restore_roles_falls_back_to_backup() {
    let store = SessionStore::new();
    let creds = MemoryCredentialStore::new();
    let backup = MemoryCredentialStore::new();
    backup.set(ROLES_BACKUP_KEY, "SubAdmin,Tester");

    assert!(store.restore_roles(&creds, Some(&backup)));
    assert!(store.is_tester());
    assert!(!store.is_admin());
    assert_eq!(creds.get(ROLES_KEY).as_deref(), Some("SubAdmin,Tester"));
}

#[test]
fn restore_roles_without_stored_roles_leaves_store() {
    let store = SessionStore::new();
    assert!(!store.restore_roles(&MemoryCredentialStore::new(), Some(&MemoryCredentialStore::new())));
    assert_logged_out(&store);
}

#[tokio::test]
async fn unreachable_api_uses_stored_roles() {
    let store = SessionStore::new();
    let creds = MemoryCredentialStore::new();
    let backup = MemoryCredentialStore::new();
    backup.set(ROLES_BACKUP_KEY, "Admin");

    let probe = MockProbe::failing(ApiError::Network("connection refused".into()));
    store.fetch_or_restore(&probe, &creds, Some(&backup)).await;
    assert!(store.is_logged_in());
    assert!(store.is_admin());
}

#[tokio::test]
async fn rejected_current_user_ignores_stored_roles() {
    let store = SessionStore::new();
    let creds = MemoryCredentialStore::new();
    creds.set(ROLES_KEY, "Admin");

    store.fetch_or_restore(&MockProbe::failing(ApiError::from_status(401, "")), &creds, None).await;
    assert_logged_out(&store);
}

#[tokio::test]
async fn unreachable_api_without_stored_roles_clears() {
    let store = SessionStore::new();
    store.set_user(7, "a@b.com", "Admin");
    let probe = MockProbe::failing(ApiError::Network("connection refused".into()));
    store.fetch_or_restore(&probe, &MemoryCredentialStore::new(), None).await;
    assert_logged_out(&store);
}

#[tokio::test]
async fn fetched_user_wins_over_stored_roles() {
    let store = SessionStore::new();
    let creds = MemoryCredentialStore::new();
    creds.set(ROLES_KEY, "Admin");
    store.fetch_or_restore(&MockProbe::user(3, "t@b.com", "Tester"), &creds, None).await;
    assert_eq!(store.snapshot().user_id, Some(3));
    assert!(store.is_tester());
    assert!(!store.is_admin());
}
