//! Typed helpers for the coverage REST API.
//!
//! Every helper goes through [`HttpClient::send`], so token refresh and the
//! login redirect apply uniformly. Access levels noted per group are
//! enforced by the server; the client does not pre-check them.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use super::client::{HttpClient, Method, PendingRequest, encode};
use super::types::{
    ApiKeyResponse, Area, CurrentUser, Envelope, ExplTest, Feature, LoginRequest, LoginResponse, NewPassword,
    Product, Test, User,
};
use super::{LOGIN_API_PATH, ME_PATH};
use crate::credentials::{REFRESH_TOKEN_KEY, ROLES_BACKUP_KEY, ROLES_KEY, TOKEN_KEY};
use crate::error::ApiError;

/// Source of the current-user record. Seam between the session store and
/// the network so the store can be tested without a server.
#[async_trait::async_trait]
pub trait UserProbe: Send + Sync {
    /// # Errors
    ///
    /// Any transport, status or payload failure.
    async fn current_user(&self) -> Result<CurrentUser, ApiError>;
}

#[async_trait::async_trait]
impl UserProbe for HttpClient {
    async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        let envelope: Envelope<CurrentUser> = self.get(ME_PATH).await?;
        envelope
            .data
            .ok_or_else(|| ApiError::MalformedResponse("current user payload has no data".into()))
    }
}

// =============================================================================
// PATHS
// =============================================================================

fn product_path(id: i64) -> String {
    format!("/api/v1/products/{id}")
}

fn product_areas_path(product_id: i64) -> String {
    format!("/api/v1/products/{product_id}/areas")
}

fn area_path(id: i64) -> String {
    format!("/api/v1/areas/{id}")
}

fn area_features_path(area_id: i64) -> String {
    format!("/api/v1/areas/{area_id}/features")
}

fn feature_path(id: i64) -> String {
    format!("/api/v1/features/{id}")
}

fn suite_tests_path(suite: &str, file_name: &str) -> String {
    format!(
        "/api/v1/tests?suite={}&file-name={}",
        urlencoding::encode(suite),
        urlencoding::encode(file_name)
    )
}

fn test_path(id: i64) -> String {
    format!("/api/v1/tests/{id}")
}

fn area_expl_tests_path(area_id: i64) -> String {
    format!("/api/v1/expl-tests/area/{area_id}")
}

fn expl_test_path(id: i64) -> String {
    format!("/api/v1/expl-tests/{id}")
}

fn area_coverage_path(product_id: i64) -> String {
    format!("/api/v1/coverage/{product_id}/areas")
}

fn feature_coverage_path(area_id: i64) -> String {
    format!("/api/v1/coverage/areas/{area_id}/features")
}

fn feature_tests_path(feature_id: i64) -> String {
    format!("/api/v1/coverage/features/{feature_id}/tests")
}

fn product_tests_path(product_id: i64) -> String {
    format!("/api/v1/coverage/products/{product_id}/tests")
}

fn user_path(id: i64) -> String {
    format!("/api/v1/users/{id}")
}

// =============================================================================
// AUTH
// =============================================================================

impl HttpClient {
    /// Sign in via `POST /api/v1/auth/login`.
    ///
    /// Stores the returned role list (also in the role backup store, when
    /// one is configured), plus any bearer tokens the server hands out, and
    /// re-arms the login redirect.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or credentials are
    /// rejected. A rejected sign-in never refreshes or redirects.
    pub async fn login(&self, email: &str, password: &str) -> Result<Vec<String>, ApiError> {
        let body = LoginRequest { email: email.to_owned(), password: password.to_owned() };
        let req = PendingRequest::new(Method::POST, LOGIN_API_PATH).with_body(encode(&body)?).without_auth_recovery();
        let resp: LoginResponse = self.send(req).await?;

        let roles = resp.roles.normalize();
        let creds = self.credentials();
        creds.set(ROLES_KEY, &roles.join(","));
        if let Some(backup) = self.role_backup() {
            backup.set(ROLES_BACKUP_KEY, &roles.join(","));
        }
        if let Some(token) = resp.token.as_deref().filter(|t| !t.is_empty()) {
            creds.set(TOKEN_KEY, token);
        }
        if let Some(refresh) = resp.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            creds.set(REFRESH_TOKEN_KEY, refresh);
        }
        self.reset_redirect();
        tracing::info!(%email, roles = %roles.join(","), "signed in");
        Ok(roles)
    }

    /// `PUT /api/v1/users/change-pwd`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn change_password(&self, password: &str, new_password: &str) -> Result<(), ApiError> {
        let body = NewPassword { password: password.to_owned(), new_password: new_password.to_owned() };
        let _: serde_json::Value = self.put("/api/v1/users/change-pwd", &body).await?;
        Ok(())
    }

    /// `POST /api/v1/users/generate-api-key` (admin).
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn generate_api_key(&self) -> Result<String, ApiError> {
        let resp: ApiKeyResponse = self.post("/api/v1/users/generate-api-key", &serde_json::json!({})).await?;
        Ok(resp.key)
    }
}

// =============================================================================
// PRODUCTS / AREAS / FEATURES (maintainer)
// =============================================================================

impl HttpClient {
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn products(&self) -> Result<Vec<Product>, ApiError> {
        self.get("/api/v1/products").await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn add_product(&self, product: &Product) -> Result<Product, ApiError> {
        self.post("/api/v1/products", product).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn update_product(&self, id: i64, product: &Product) -> Result<Product, ApiError> {
        self.put(&product_path(id), product).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn delete_product(&self, id: i64) -> Result<(), ApiError> {
        self.delete::<serde_json::Value>(&product_path(id)).await.map(|_| ())
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn product_areas(&self, product_id: i64) -> Result<Vec<Area>, ApiError> {
        self.get(&product_areas_path(product_id)).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn add_area(&self, area: &Area) -> Result<Area, ApiError> {
        self.post("/api/v1/areas", area).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn update_area(&self, id: i64, area: &Area) -> Result<Area, ApiError> {
        self.put(&area_path(id), area).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn delete_area(&self, id: i64) -> Result<(), ApiError> {
        self.delete::<serde_json::Value>(&area_path(id)).await.map(|_| ())
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn area_features(&self, area_id: i64) -> Result<Vec<Feature>, ApiError> {
        self.get(&area_features_path(area_id)).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn add_feature(&self, feature: &Feature) -> Result<Feature, ApiError> {
        self.post("/api/v1/features", feature).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn update_feature(&self, id: i64, feature: &Feature) -> Result<Feature, ApiError> {
        self.put(&feature_path(id), feature).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn delete_feature(&self, id: i64) -> Result<(), ApiError> {
        self.delete::<serde_json::Value>(&feature_path(id)).await.map(|_| ())
    }

    /// Every test recorded for a suite in a spec file.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn suite_tests(&self, suite: &str, file_name: &str) -> Result<Vec<Test>, ApiError> {
        self.get(&suite_tests_path(suite, file_name)).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn delete_test(&self, id: i64) -> Result<(), ApiError> {
        self.delete::<serde_json::Value>(&test_path(id)).await.map(|_| ())
    }
}

// =============================================================================
// EXPLORATORY TESTS (tester; delete is maintainer)
// =============================================================================

impl HttpClient {
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the envelope has no data.
    pub async fn add_expl_test(&self, test: &ExplTest) -> Result<ExplTest, ApiError> {
        let envelope: Envelope<ExplTest> = self.post("/api/v1/expl-tests", test).await?;
        envelope
            .data
            .ok_or_else(|| ApiError::MalformedResponse("created exploratory test missing".into()))
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn area_expl_tests(&self, area_id: i64) -> Result<Vec<ExplTest>, ApiError> {
        let envelope: Envelope<Vec<ExplTest>> = self.get(&area_expl_tests_path(area_id)).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn delete_expl_test(&self, id: i64) -> Result<(), ApiError> {
        self.delete::<serde_json::Value>(&expl_test_path(id)).await.map(|_| ())
    }
}

// =============================================================================
// COVERAGE (tester)
// =============================================================================

impl HttpClient {
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn area_coverage(&self, product_id: i64) -> Result<Vec<Area>, ApiError> {
        self.get(&area_coverage_path(product_id)).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn feature_coverage(&self, area_id: i64) -> Result<Vec<Feature>, ApiError> {
        self.get(&feature_coverage_path(area_id)).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn feature_tests(&self, feature_id: i64) -> Result<Vec<Test>, ApiError> {
        self.get(&feature_tests_path(feature_id)).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn product_tests(&self, product_id: i64) -> Result<Vec<Test>, ApiError> {
        self.get(&product_tests_path(product_id)).await
    }
}

// =============================================================================
// USERS (admin)
// =============================================================================

impl HttpClient {
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn users(&self) -> Result<Vec<User>, ApiError> {
        self.get("/api/v1/users").await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn create_user(&self, user: &User) -> Result<User, ApiError> {
        self.post("/api/v1/users", user).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn update_user(&self, id: i64, user: &User) -> Result<(), ApiError> {
        self.put::<serde_json::Value, _>(&user_path(id), user).await.map(|_| ())
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails.
    pub async fn delete_user(&self, id: i64) -> Result<(), ApiError> {
        self.delete::<serde_json::Value>(&user_path(id)).await.map(|_| ())
    }
}
