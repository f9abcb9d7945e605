//! Login redirects after unrecoverable auth failures.
//!
//! DESIGN
//! ======
//! Deciding *whether* a 401 ends in a redirect is the pure [`decide`]
//! function. Performing the redirect is the [`Navigator`] trait, so the
//! decision is testable without any browser or navigation context.
//!
//! The [`RedirectGuard`] flag is flipped with a compare-and-swap before the
//! navigation future is awaited. Concurrent 401s therefore produce one
//! navigation; everyone else fails quietly.

#[cfg(test)]
#[path = "navigation_test.rs"]
mod navigation_test;

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::net::ME_PATH;

/// Universal redirect target on unrecoverable authentication failure.
pub const LOGIN_PATH: &str = "/login";

// =============================================================================
// NAVIGATOR
// =============================================================================

/// Side-effecting navigation target.
#[async_trait::async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, target: &str);
}

/// Navigator for headless use: logs the redirect and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

#[async_trait::async_trait]
impl Navigator for LogNavigator {
    async fn navigate(&self, target: &str) {
        tracing::warn!(%target, "authentication required; redirecting");
    }
}

/// Navigator that remembers every target it was sent to.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.visits.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}

#[async_trait::async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, target: &str) {
        self.visits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(target.to_owned());
    }
}

// =============================================================================
// REDIRECT GUARD
// =============================================================================

/// Single in-memory "redirect in flight" flag.
#[derive(Debug, Default)]
pub struct RedirectGuard {
    in_flight: AtomicBool,
}

impl RedirectGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the redirect. Returns `false` if someone already holds it.
    pub fn try_begin(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Re-arm after the user has authenticated again.
    pub fn reset(&self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

// =============================================================================
// DECISION
// =============================================================================

/// Facts about a request that just received a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFailure<'a> {
    /// Request path relative to the API base, query string allowed.
    pub path: &'a str,
    /// False for requests whose 401 is an answer rather than an expired
    /// session, such as a rejected sign-in.
    pub recoverable: bool,
    /// The request has already been replayed once after a refresh.
    pub retried: bool,
    /// Refresh is enabled and a refresh token is stored.
    pub refresh_available: bool,
    pub redirect_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Exchange the refresh token and replay the request once.
    Refresh,
    /// Navigate to the login page and fail the request.
    Redirect,
    /// Fail the request without navigating.
    Quiet,
}

/// What to do about a 401.
#[must_use]
pub fn decide(failure: AuthFailure<'_>) -> AuthDecision {
    if !failure.recoverable || failure.redirect_in_flight {
        return AuthDecision::Quiet;
    }
    if !failure.retried && failure.refresh_available {
        return AuthDecision::Refresh;
    }
    if is_current_user_probe(failure.path) {
        return AuthDecision::Quiet;
    }
    AuthDecision::Redirect
}

/// True when `path` targets the current-user probe endpoint, with or
/// without the leading slash.
#[must_use]
pub fn is_current_user_probe(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.trim_matches('/') == ME_PATH.trim_start_matches('/')
}
