//! Networking modules for the coverage REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `client` owns the shared HTTP client and its auth interception, `api`
//! layers typed endpoint helpers on top of it, and `types` defines the wire
//! schema.

pub mod api;
pub mod client;
pub mod types;

#[cfg(test)]
#[path = "mock_server.rs"]
pub(crate) mod mock_server;

/// Current-user probe. Never triggers a login redirect.
pub const ME_PATH: &str = "/api/v1/auth/me";
/// Exchanges the stored refresh token for a new access token.
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";
pub const LOGIN_API_PATH: &str = "/api/v1/auth/login";
