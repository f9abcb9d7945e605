//! In-process coverage API stand-in for client tests.
//!
//! Routes:
//! - `GET /api/v1/protected`: 200 when the bearer token equals `accept_token`, else 401
//! - `GET /api/v1/auth/me`: same auth rule, returns the `me` payload
//! - `POST /api/v1/auth/refresh`: `refresh_status`; hands out `fresh_token` on 200,
//!   or `refresh_body` verbatim when set. Waits `refresh_delay` first.
//! - `GET /api/v1/missing`: 404 with an error body
//! - `GET /api/v1/empty`: 204
//! - `GET /api/v1/garbage`: 200 with a non-JSON body

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde_json::{Value, json};

pub(crate) struct Mock {
    pub accept_token: String,
    pub fresh_token: String,
    pub refresh_status: u16,
    pub refresh_body: Option<Value>,
    pub refresh_delay: Duration,
    pub me: Value,
    /// Delay before answering protected requests, to line up concurrent 401s.
    pub delay: Duration,
    pub protected_hits: AtomicUsize,
    pub refresh_hits: AtomicUsize,
    pub me_hits: AtomicUsize,
    pub seen_auth: Mutex<Vec<String>>,
    pub refresh_bodies: Mutex<Vec<Value>>,
}

impl Default for Mock {
    fn default() -> Self {
        Self {
            accept_token: "fresh".into(),
            fresh_token: "fresh".into(),
            refresh_status: 200,
            refresh_body: None,
            refresh_delay: Duration::ZERO,
            me: json!({ "data": { "userId": 7, "email": "a@b.com", "roles": "Admin,Tester" } }),
            delay: Duration::ZERO,
            protected_hits: AtomicUsize::new(0),
            refresh_hits: AtomicUsize::new(0),
            me_hits: AtomicUsize::new(0),
            seen_auth: Mutex::new(Vec::new()),
            refresh_bodies: Mutex::new(Vec::new()),
        }
    }
}

impl Mock {
    pub fn protected_hits(&self) -> usize {
        self.protected_hits.load(Ordering::SeqCst)
    }

    pub fn refresh_hits(&self) -> usize {
        self.refresh_hits.load(Ordering::SeqCst)
    }

    pub fn me_hits(&self) -> usize {
        self.me_hits.load(Ordering::SeqCst)
    }

    pub fn seen_auth(&self) -> Vec<String> {
        self.seen_auth.lock().unwrap().clone()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        self.seen_auth.lock().unwrap().push(auth.clone());
        auth == format!("Bearer {}", self.accept_token)
    }
}

type Shared = Arc<Mock>;

async fn protected(State(mock): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    mock.protected_hits.fetch_add(1, Ordering::SeqCst);
    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }
    if mock.authorized(&headers) {
        (StatusCode::OK, Json(json!({ "ok": true })))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": "token expired" })))
    }
}

async fn me(State(mock): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    mock.me_hits.fetch_add(1, Ordering::SeqCst);
    if mock.authorized(&headers) {
        (StatusCode::OK, Json(mock.me.clone()))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": "missing token" })))
    }
}

async fn refresh(State(mock): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    mock.refresh_hits.fetch_add(1, Ordering::SeqCst);
    mock.refresh_bodies.lock().unwrap().push(body);
    if !mock.refresh_delay.is_zero() {
        tokio::time::sleep(mock.refresh_delay).await;
    }
    let status = StatusCode::from_u16(mock.refresh_status).unwrap();
    if let Some(body) = &mock.refresh_body {
        (status, Json(body.clone()))
    } else if status == StatusCode::OK {
        (status, Json(json!({ "token": mock.fresh_token })))
    } else {
        (status, Json(json!({ "error": "refresh rejected" })))
    }
}

async fn missing() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "no such product", "status": 404 })))
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn garbage() -> &'static str {
    "<html>not json</html>"
}

/// Serve `mock` on an ephemeral port; returns the base URL.
pub(crate) async fn spawn(mock: Shared) -> String {
    let app = Router::new()
        .route("/api/v1/protected", get(protected))
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/missing", get(missing))
        .route("/api/v1/empty", get(empty))
        .route("/api/v1/garbage", get(garbage))
        .with_state(mock);
    serve(app).await
}

/// Serve an arbitrary router on an ephemeral port; returns the base URL.
pub(crate) async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Base URL of a port nothing is listening on.
pub(crate) async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
