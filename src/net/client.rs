//! Shared HTTP client with auth interception.
//!
//! ARCHITECTURE
//! ============
//! Every request goes through [`HttpClient::send`]:
//!
//! ```text
//! Idle -> Sent -> 2xx ------------------------------> Success
//!              -> non-401 --------------------------> Failed (passed through)
//!              -> 401 --decide--> Refresh -> Sent (retried, final)
//!                             \-> Redirect -> Failed (401)
//!                             \-> Quiet ----> Failed (401)
//! ```
//!
//! Requests built with [`PendingRequest::without_auth_recovery`] (sign-in)
//! always take the `Quiet` branch.
//!
//! A request is replayed at most once. Refreshes are single-flight: a caller
//! that hits 401 while another refresh is running waits for it and reuses
//! the new token rather than refreshing again. A failed refresh redirects
//! while still holding the refresh lock so waiters observe the redirect
//! flag and fail quietly.

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

pub use reqwest::Method;

use super::REFRESH_PATH;
use super::types::{RefreshRequest, RefreshResponse};
use crate::config::ClientConfig;
use crate::credentials::{CredentialStore, TOKEN_KEY};
use crate::error::ApiError;
use crate::navigation::{AuthDecision, AuthFailure, LOGIN_PATH, Navigator, RedirectGuard, decide};

// =============================================================================
// PENDING REQUEST
// =============================================================================

/// A request that can be replayed once after a token refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub method: Method,
    /// Path relative to the API base, including any query string.
    pub path: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    recoverable: bool,
    retried: bool,
}

impl PendingRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None, headers: Vec::new(), recoverable: true, retried: false }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Hand a 401 straight back to the caller: no refresh, no redirect.
    #[must_use]
    pub fn without_auth_recovery(mut self) -> Self {
        self.recoverable = false;
        self
    }

    #[must_use]
    pub fn recoverable(&self) -> bool {
        self.recoverable
    }

    /// Whether this request has already been replayed after a refresh.
    #[must_use]
    pub fn retried(&self) -> bool {
        self.retried
    }

    fn mark_retried(&mut self) {
        self.retried = true;
    }
}

struct RawResponse {
    status: u16,
    body: String,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpClient {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: Arc<dyn CredentialStore>,
    role_backup: Option<Arc<dyn CredentialStore>>,
    navigator: Arc<dyn Navigator>,
    redirect: RedirectGuard,
    refresh_lock: Mutex<()>,
}

impl HttpClient {
    /// Build the shared client: JSON content type by default, cookie store
    /// enabled, timeouts from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the TLS backend fails to initialize.
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            config,
            credentials,
            role_backup: None,
            navigator,
            redirect: RedirectGuard::new(),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Durable store that keeps a copy of the role list across sessions.
    #[must_use]
    pub fn with_role_backup(mut self, backup: Arc<dyn CredentialStore>) -> Self {
        self.role_backup = Some(backup);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    #[must_use]
    pub fn role_backup(&self) -> Option<&Arc<dyn CredentialStore>> {
        self.role_backup.as_ref()
    }

    #[must_use]
    pub fn redirect_in_flight(&self) -> bool {
        self.redirect.is_in_flight()
    }

    /// Allow login redirects again, e.g. after a fresh sign-in.
    pub fn reset_redirect(&self) {
        self.redirect.reset();
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.config.api_url)
        } else {
            format!("{}/{path}", self.config.api_url)
        }
    }

    // -------------------------------------------------------------------------
    // Convenience verbs
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// See [`HttpClient::send`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(PendingRequest::new(Method::GET, path)).await
    }

    /// # Errors
    ///
    /// See [`HttpClient::send`]; also fails with [`ApiError::Encode`] if `body` does not serialize.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send(PendingRequest::new(Method::POST, path).with_body(encode(body)?)).await
    }

    /// # Errors
    ///
    /// See [`HttpClient::post`].
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send(PendingRequest::new(Method::PUT, path).with_body(encode(body)?)).await
    }

    /// # Errors
    ///
    /// See [`HttpClient::send`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(PendingRequest::new(Method::DELETE, path)).await
    }

    /// Issue `method` against `path` with an optional JSON body.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::send`].
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let mut req = PendingRequest::new(method, path);
        if let Some(body) = body {
            req = req.with_body(body.clone());
        }
        self.send(req).await
    }

    // -------------------------------------------------------------------------
    // Interception
    // -------------------------------------------------------------------------

    /// Send a request, recovering once from an expired token.
    ///
    /// Resolves with the decoded body on any 2xx. An empty body decodes as
    /// JSON `null`.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Network`] when no response arrives.
    /// - [`ApiError::Http`] for non-2xx responses, including a 401 that ends
    ///   in (or is suppressed from) a login redirect.
    /// - [`ApiError::AuthExpired`] when the token refresh itself fails.
    /// - [`ApiError::MalformedResponse`] when a 2xx body does not decode into `T`.
    pub async fn send<T: DeserializeOwned>(&self, mut req: PendingRequest) -> Result<T, ApiError> {
        loop {
            let token = self.credentials.token();
            let raw = self.dispatch(&req, token.as_deref()).await?;
            if raw.status != 401 {
                return decode(raw);
            }

            let failure = AuthFailure {
                path: &req.path,
                recoverable: req.recoverable,
                retried: req.retried,
                refresh_available: self.refresh_available(),
                redirect_in_flight: self.redirect.is_in_flight(),
            };
            match decide(failure) {
                AuthDecision::Refresh => {
                    req.mark_retried();
                    self.refresh_or_redirect(&req.path, token.as_deref()).await?;
                }
                AuthDecision::Redirect => {
                    self.redirect_to_login(&req.path).await;
                    return Err(ApiError::from_status(raw.status, &raw.body));
                }
                AuthDecision::Quiet => {
                    tracing::debug!(path = %req.path, "unauthorized; redirect suppressed");
                    return Err(ApiError::from_status(raw.status, &raw.body));
                }
            }
        }
    }

    fn refresh_available(&self) -> bool {
        self.config.refresh_enabled && self.credentials.refresh_token().is_some()
    }

    async fn dispatch(&self, req: &PendingRequest, token: Option<&str>) -> Result<RawResponse, ApiError> {
        let mut builder = self.http.request(req.method.clone(), self.url(&req.path));
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %req.method, path = %req.path, retried = req.retried, "dispatching request");
        let response = builder.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ApiError::Network(e.to_string()))?;
        tracing::debug!(method = %req.method, path = %req.path, %status, "response received");
        Ok(RawResponse { status, body })
    }

    /// Refresh the access token unless someone else already did.
    ///
    /// `stale` is the token the failed request carried. On failure the login
    /// redirect happens before the lock is released.
    async fn refresh_or_redirect(&self, path: &str, stale: Option<&str>) -> Result<(), ApiError> {
        let _lock = self.refresh_lock.lock().await;

        if self.redirect.is_in_flight() {
            return Err(ApiError::AuthExpired);
        }
        if self.credentials.token().as_deref() != stale {
            tracing::debug!(%path, "token refreshed concurrently; replaying");
            return Ok(());
        }

        match self.exchange_refresh_token().await {
            Ok(token) => {
                self.credentials.set(TOKEN_KEY, &token);
                tracing::info!(%path, "access token refreshed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%path, error = %err, "token refresh failed");
                let failure = AuthFailure {
                    path,
                    recoverable: true,
                    retried: true,
                    refresh_available: false,
                    redirect_in_flight: false,
                };
                if decide(failure) == AuthDecision::Redirect {
                    self.redirect_to_login(path).await;
                }
                Err(ApiError::AuthExpired)
            }
        }
    }

    async fn exchange_refresh_token(&self) -> Result<String, ApiError> {
        let body = RefreshRequest { token: self.credentials.refresh_token() };
        let response = self
            .http
            .post(self.url(REFRESH_PATH))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ApiError::Network(e.to_string()))?;
        if status != 200 {
            return Err(ApiError::from_status(status, &text));
        }
        let parsed: RefreshResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::MalformedResponse(e.to_string()))?;
        if parsed.token.is_empty() {
            return Err(ApiError::MalformedResponse("empty token".into()));
        }
        Ok(parsed.token)
    }

    async fn redirect_to_login(&self, path: &str) {
        if !self.redirect.try_begin() {
            tracing::debug!(%path, "redirect already in flight");
            return;
        }
        tracing::warn!(%path, target = LOGIN_PATH, "unrecoverable authentication failure");
        self.navigator.navigate(LOGIN_PATH).await;
    }
}

pub(crate) fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(raw: RawResponse) -> Result<T, ApiError> {
    if !(200..300).contains(&raw.status) {
        return Err(ApiError::from_status(raw.status, &raw.body));
    }
    let text = if raw.body.trim().is_empty() { "null" } else { raw.body.as_str() };
    serde_json::from_str(text).map_err(|e| ApiError::MalformedResponse(e.to_string()))
}
