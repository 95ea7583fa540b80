//! Shared helpers for the Web API integration tests.
//!
//! Each test gets its own in-memory database and a temporary directory for
//! the local object store, wired into the full application router.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestRequest, TestServer};
use serde_json::{json, Value};
use tempfile::TempDir;

use cumulus::config::Config;
use cumulus::drive::{LocalObjectStore, ObjectStore};
use cumulus::web::middleware::{JwtState, RateLimitState};
use cumulus::web::{create_app, AppState};
use cumulus::Database;

pub const TEST_PASSWORD: &str = "password123";

/// A running test application.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub store: Arc<LocalObjectStore>,
    /// Keeps the object directory alive for the test's duration.
    pub objects: TempDir,
}

/// A registered user.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub token: String,
}

/// Configuration suitable for tests.
pub fn test_config(objects: &TempDir) -> Config {
    let mut config = Config::default();
    config.auth.jwt_secret = "test-secret-key-for-testing-only".to_string();
    config.auth.cookie_secure = false;
    config.auth.login_rate_limit = 1000;
    config.auth.api_rate_limit = 10_000;
    config.storage.local_path = objects.path().to_string_lossy().into_owned();
    config.storage.public_base_url = "http://localhost/objects".to_string();
    config.server.client_url = "http://drive.test".to_string();
    config
}

/// Create a test application with default settings.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Create a test application after adjusting its configuration.
pub async fn spawn_app_with(adjust: impl FnOnce(&mut Config)) -> TestApp {
    let objects = TempDir::new().expect("Failed to create object directory");
    let mut config = test_config(&objects);
    adjust(&mut config);

    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let store = Arc::new(
        LocalObjectStore::new(objects.path(), &config.storage.public_base_url)
            .expect("Failed to create object store"),
    );
    let dyn_store: Arc<dyn ObjectStore> = store.clone();

    let app_state = Arc::new(AppState::new(db.clone(), dyn_store, &config));
    let jwt_state = Arc::new(JwtState::new(&config.auth.jwt_secret));
    let rate_limits = Arc::new(RateLimitState::new(
        config.auth.login_rate_limit,
        config.auth.api_rate_limit,
    ));

    let router = create_app(app_state, jwt_state, rate_limits, &config);
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        db,
        store,
        objects,
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

impl TestApp {
    pub fn get(&self, path: &str, user: &TestUser) -> TestRequest {
        self.server
            .get(path)
            .add_header(AUTHORIZATION, bearer(&user.token))
    }

    pub fn post(&self, path: &str, user: &TestUser) -> TestRequest {
        self.server
            .post(path)
            .add_header(AUTHORIZATION, bearer(&user.token))
    }

    pub fn put(&self, path: &str, user: &TestUser) -> TestRequest {
        self.server
            .put(path)
            .add_header(AUTHORIZATION, bearer(&user.token))
    }

    pub fn delete(&self, path: &str, user: &TestUser) -> TestRequest {
        self.server
            .delete(path)
            .add_header(AUTHORIZATION, bearer(&user.token))
    }

    /// Register a user named after the local part of `email`.
    pub async fn register(&self, email: &str) -> TestUser {
        let name = email.split('@').next().unwrap_or(email);
        let response = self
            .server
            .post("/api/auth/register")
            .json(&json!({
                "name": name,
                "email": email,
                "password": TEST_PASSWORD
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        TestUser {
            id: body["data"]["user"]["id"].as_i64().unwrap(),
            email: email.to_string(),
            token: body["data"]["access_token"].as_str().unwrap().to_string(),
        }
    }

    /// Upload `content` as `filename`; returns the file JSON.
    pub async fn upload(
        &self,
        user: &TestUser,
        filename: &str,
        content: &[u8],
        folder_id: Option<i64>,
    ) -> Value {
        let response = self.upload_request(user, filename, content, folder_id).await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["data"].clone()
    }

    /// Upload without asserting the outcome.
    pub async fn upload_request(
        &self,
        user: &TestUser,
        filename: &str,
        content: &[u8],
        folder_id: Option<i64>,
    ) -> axum_test::TestResponse {
        let mut form = MultipartForm::new().add_part(
            "file",
            Part::bytes(content.to_vec())
                .file_name(filename.to_string())
                .mime_type("application/octet-stream"),
        );
        if let Some(id) = folder_id {
            form = form.add_text("folder_id", id.to_string());
        }

        self.post("/api/files/upload", user).multipart(form).await
    }

    /// Create a folder; returns its id.
    pub async fn create_folder(&self, user: &TestUser, name: &str, parent_id: Option<i64>) -> i64 {
        let response = self
            .post("/api/folders", user)
            .json(&json!({ "name": name, "parent_id": parent_id }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["data"]["id"].as_i64().unwrap()
    }

    /// Share a file or folder (`kind` is "files" or "folders").
    pub async fn share(
        &self,
        owner: &TestUser,
        kind: &str,
        id: i64,
        target: &TestUser,
        permission: &str,
    ) {
        self.post(&format!("/api/{kind}/{id}/share"), owner)
            .json(&json!({ "user_email": target.email, "permission": permission }))
            .await
            .assert_status_ok();
    }
}

/// Names in a JSON array of files or folders.
pub fn names(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_string())
        .collect()
}
