//! Error taxonomy for API calls.
//!
//! ERROR HANDLING
//! ==============
//! `AuthExpired` is produced only after the client has already run its
//! refresh-or-redirect flow; every other variant reaches the caller exactly
//! as the transport or server reported it.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use serde_json::Value;

/// Errors produced by [`crate::net::client::HttpClient`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Transport-level failure, no response received.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// A 401 could not be recovered by refreshing the token.
    #[error("authentication expired")]
    AuthExpired,

    /// A 2xx body did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A request body could not be serialized.
    #[error("request encode failed: {0}")]
    Encode(String),

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Config(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// Grepable code for logs and CLI output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E_NETWORK",
            Self::Http { .. } => "E_HTTP",
            Self::AuthExpired => "E_AUTH_EXPIRED",
            Self::MalformedResponse(_) => "E_MALFORMED_RESPONSE",
            Self::Encode(_) => "E_ENCODE",
            Self::Config(_) => "E_CONFIG",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::AuthExpired | Self::Http { status: 401, .. })
    }

    /// Build an `Http` error from a non-2xx status and its raw body.
    ///
    /// The server reports failures as `{"error": "..."}` on most routes and
    /// `{"message": "..."}` on the envelope routes; plain-text bodies are used
    /// verbatim. Falls back to the canonical reason phrase.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        Self::Http { status, message: error_message(status, body) }
    }
}

fn error_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        for key in ["error", "message"] {
            if let Some(msg) = value.get(key).and_then(Value::as_str) {
                if !msg.is_empty() {
                    return msg.to_owned();
                }
            }
        }
    } else if !trimmed.is_empty() {
        return trimmed.to_owned();
    }
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown status")
        .to_owned()
}
