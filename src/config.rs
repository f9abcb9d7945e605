//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use crate::error::ApiError;

pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const API_URL_ENV: &str = "COVERAGE_API_URL";
pub const ORIGIN_ENV: &str = "COVERAGE_ORIGIN";
pub const REFRESH_ENABLED_ENV: &str = "COVERAGE_REFRESH_ENABLED";
pub const REQUEST_TIMEOUT_ENV: &str = "COVERAGE_REQUEST_TIMEOUT_SECS";
pub const CONNECT_TIMEOUT_ENV: &str = "COVERAGE_CONNECT_TIMEOUT_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL every request path is appended to. Never ends in `/`.
    pub api_url: String,
    /// When false, a 401 goes straight to the login redirect.
    pub refresh_enabled: bool,
    pub timeouts: ClientTimeouts,
}

impl ClientConfig {
    /// Config for a fixed base URL with defaults for everything else.
    #[must_use]
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: normalize_base_url(api_url),
            refresh_enabled: true,
            timeouts: ClientTimeouts::default(),
        }
    }

    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `COVERAGE_API_URL`: API base URL override
    /// - `COVERAGE_ORIGIN`: origin used when no override is set (default `http://127.0.0.1:8080`)
    /// - `COVERAGE_REFRESH_ENABLED`: bool, default true
    /// - `COVERAGE_REQUEST_TIMEOUT_SECS`: default 30
    /// - `COVERAGE_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the resolved base URL is not an
    /// `http`/`https` URL or `COVERAGE_REFRESH_ENABLED` is not a bool.
    pub fn from_env() -> Result<Self, ApiError> {
        let api_url = resolve_base_url(
            std::env::var(API_URL_ENV).ok().as_deref(),
            std::env::var(ORIGIN_ENV).ok().as_deref(),
        )?;

        let refresh_enabled = match std::env::var(REFRESH_ENABLED_ENV) {
            Ok(raw) => parse_bool(&raw)
                .ok_or_else(|| ApiError::Config(format!("invalid {REFRESH_ENABLED_ENV}: {raw}")))?,
            Err(_) => true,
        };

        let timeouts = ClientTimeouts {
            request_secs: env_parse_u64(REQUEST_TIMEOUT_ENV, DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64(CONNECT_TIMEOUT_ENV, DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { api_url, refresh_enabled, timeouts })
    }
}

/// Pick the API override when set and non-empty, else the origin, else the default.
pub(crate) fn resolve_base_url(api_url: Option<&str>, origin: Option<&str>) -> Result<String, ApiError> {
    let raw = [api_url, origin]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(DEFAULT_ORIGIN);
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err(ApiError::Config(format!("base URL must be http(s): {raw}")));
    }
    Ok(normalize_base_url(raw))
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
