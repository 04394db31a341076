//! Integration and unit tests for the scandata backend.
//!
//! ## Test Modules
//!
//! - **api_tests**: end-to-end HTTP behaviour through the full router
//! - **config_tests**: configuration defaults, layering and validation
//! - **error_tests**: error-to-response mapping
//! - **report_tests**: report windows and aggregation against a real store
//! - **store_tests**: SQLite store semantics (uniqueness, soft delete, append-only log)
//!
//! Individual test modules can be run with:
//! ```bash
//! cargo test api_tests
//! ```

pub mod error_tests;
pub mod report_tests;

/// Shared fixtures: in-memory store, seeded accounts, request builders.
pub mod support {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{header, Method, Request, Response, StatusCode},
        Router,
    };
    use chrono::{DateTime, Utc};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::password::hash_password;
    use crate::config::AppConfig;
    use crate::state::AppState;
    use crate::store::{SqliteStore, Store};
    use crate::types::{NewScan, NewUnit, NewUser, Role, ScanRecord, Unit, User};

    pub const TEST_SECRET: &str = "test-signing-secret-0123456789abcdef";
    pub const PASSWORD: &str = "secret123";

    pub fn test_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.auth.jwt_secret = TEST_SECRET.to_string();
        cfg.auth.bcrypt_cost = 4;
        cfg.rate_limit.requests = 10_000;
        cfg.logging.enable_security_log = false;
        cfg
    }

    pub async fn memory_store() -> Arc<dyn Store> {
        Arc::new(SqliteStore::in_memory().await.unwrap())
    }

    pub async fn test_state_with(cfg: AppConfig) -> AppState {
        AppState::new(memory_store().await, cfg)
    }

    pub async fn test_state() -> AppState {
        test_state_with(test_config()).await
    }

    pub fn test_app(state: &AppState) -> Router {
        crate::routes::router(state.clone())
    }

    pub async fn seed_user(store: &dyn Store, username: &str, role: Role) -> User {
        let password_hash = hash_password(PASSWORD, 4).await.unwrap();
        store
            .create_user(NewUser {
                username: username.to_string(),
                password_hash,
                name: format!("{} name", username),
                role,
            })
            .await
            .unwrap()
    }

    pub async fn seed_unit(store: &dyn Store, qr_code: &str, active: bool) -> Unit {
        let unit = store
            .create_unit(NewUnit {
                qr_code: qr_code.to_string(),
                name: format!("Unit {}", qr_code),
                expected_grade: "A".to_string(),
                location: "Hall 1".to_string(),
            })
            .await
            .unwrap();
        if active {
            return unit;
        }
        let mut inactive = unit;
        inactive.is_active = false;
        store.update_unit(&inactive).await.unwrap()
    }

    pub async fn seed_scan(
        store: &dyn Store,
        unit: &Unit,
        user: &User,
        is_match: bool,
        at: DateTime<Utc>,
    ) -> ScanRecord {
        store
            .insert_scan(NewScan {
                unit_id: unit.id,
                user_id: user.id,
                is_match,
                notes: String::new(),
                scanned_at: at,
            })
            .await
            .unwrap()
    }

    pub fn bearer(state: &AppState, user: &User) -> String {
        let (token, _) = state.tokens.issue(user).unwrap();
        format!("Bearer {}", token)
    }

    /// Builds a request as if it came from `127.0.0.1`.
    pub fn request(method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
        request_from(method, uri, auth, body, SocketAddr::from(([127, 0, 0, 1], 40000)))
    }

    pub fn request_from(
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
        peer: SocketAddr,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let mut req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        req.extensions_mut().insert(ConnectInfo(peer));
        req
    }

    pub async fn send_raw(app: &Router, req: Request<Body>) -> Response<Body> {
        app.clone().oneshot(req).await.unwrap()
    }

    pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = send_raw(app, req).await;
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }
}
