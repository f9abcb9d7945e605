//! # coverage-client
//!
//! Client library for the e2e-coverage reporting API.
//!
//! - [`net::client::HttpClient`]: shared HTTP client that attaches the
//!   bearer token, refreshes it once on 401 and otherwise redirects to login.
//! - [`state::session::SessionStore`]: who is signed in, with which roles.
//! - [`routes`]: dashboard route table and role guard.
//! - [`net::api`]: typed endpoint helpers and [`net::types`] wire models.

pub mod config;
pub mod credentials;
pub mod error;
pub mod navigation;
pub mod net;
pub mod routes;
pub mod state;

pub use config::ClientConfig;
pub use error::ApiError;
pub use net::client::HttpClient;
pub use state::session::{Role, Session, SessionStore};
