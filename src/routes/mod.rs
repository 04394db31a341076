//! HTTP route handlers and the application router.
//!
//! - `auth`: login, current user, password change
//! - `health`: liveness probe
//! - `reports`: summaries, daily breakdown, per-user performance, xlsx export
//! - `scans`: scan submission and history
//! - `units`: unit catalog
//! - `users`: account administration

pub mod auth;
pub mod health;
pub mod reports;
pub mod scans;
pub mod units;
pub mod users;

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::ServerConfig,
    error::{expose_error_details, panic_response},
    middleware::{
        auth::{require_admin, require_auth},
        ip::client_ip_middleware,
        rate_limit::rate_limit_middleware,
        security_headers::security_headers_middleware,
        security_log::security_log_middleware,
    },
    state::AppState,
};

/// CORS: permissive outside release mode; in release only the configured origins.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION, header::RETRY_AFTER])
        .max_age(Duration::from_secs(12 * 3600));

    if !server.is_production() || server.allowed_origins.iter().any(|o| o.trim() == "*") {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

/// Routes that require a verified session token. Admin-only methods carry an
/// extra `require_admin` layer, which runs after `require_auth`.
fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/change-password", post(auth::change_password))
        .route(
            "/api/users",
            get(users::list_users).post(users::create_user).route_layer(from_fn(require_admin)),
        )
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user)
                .route_layer(from_fn(require_admin)),
        )
        .route(
            "/api/units",
            get(units::list_units).merge(post(units::create_unit).route_layer(from_fn(require_admin))),
        )
        .route(
            "/api/units/{id}",
            get(units::get_unit)
                .merge(put(units::update_unit).delete(units::delete_unit).route_layer(from_fn(require_admin))),
        )
        .route("/api/units/qr/{code}", get(units::get_unit_by_code))
        .route("/api/scans", post(scans::submit_scan).get(scans::list_scans))
        .route("/api/scans/stats", get(scans::scan_stats))
        .route("/api/reports/summary", get(reports::summary))
        .route("/api/reports/daily", get(reports::daily))
        .route("/api/reports/users", get(reports::user_performance).route_layer(from_fn(require_admin)))
        .route("/api/reports/export", get(reports::export_scans).route_layer(from_fn(require_admin)))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

/// Builds the full application: routes plus the middleware stack.
///
/// Layers, outermost first: request tracing, client ip resolution, security
/// log, CORS, security headers, rate limiting, (debug only) internal error
/// details, panic recovery, body limit.
pub fn router(state: AppState) -> Router {
    let cfg = state.config.clone();

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/login", post(auth::login))
        .merge(protected_routes(&state))
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(cfg.server.max_body_size))
        .layer(CatchPanicLayer::custom(panic_response));

    let app = if cfg.server.is_production() { app } else { app.layer(from_fn(expose_error_details)) };

    app.layer(from_fn_with_state(state.rate_limiter.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(cfg.clone(), security_headers_middleware))
        .layer(cors_layer(&cfg.server))
        .layer(from_fn_with_state(state.security_log.clone(), security_log_middleware))
        .layer(from_fn_with_state(cfg.server.trust_proxy_headers, client_ip_middleware))
        .layer(TraceLayer::new_for_http())
}
