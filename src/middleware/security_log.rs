//! Security audit log.
//!
//! Observes every response and emits one `tracing` event on the `security`
//! target per noteworthy outcome. `main` routes that target to its own
//! daily-rolling file.

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use std::{
    fmt,
    net::IpAddr,
    time::{Duration, Instant},
};

use super::{auth::AuthUser, ip::client_ip};
use crate::config::LoggingConfig;

/// `tracing` target of every audit event.
pub const SECURITY_TARGET: &str = "security";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventKind {
    AuthFailure,
    RateLimit,
    AdminAction,
    SlowRequest,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::AuthFailure => "AUTH_FAILURE",
            SecurityEventKind::RateLimit => "RATE_LIMIT",
            SecurityEventKind::AdminAction => "ADMIN_ACTION",
            SecurityEventKind::SlowRequest => "SLOW_REQUEST",
        }
    }
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    pub ip: IpAddr,
    /// Empty when the caller was not authenticated.
    pub username: String,
    pub details: String,
}

/// What the observer saw of one request/response pair.
#[derive(Debug, Clone)]
pub struct Observation<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub status: StatusCode,
    pub user: Option<&'a AuthUser>,
    pub ip: IpAddr,
    pub latency: Duration,
}

/// Derives the audit events for one request. Pure, so the rules are testable
/// without a subscriber.
pub fn classify(obs: &Observation<'_>, slow_threshold: Duration) -> Vec<SecurityEvent> {
    let username = obs.user.map(|u| u.username.clone()).unwrap_or_default();
    let event = |kind, details: String| SecurityEvent { kind, ip: obs.ip, username: username.clone(), details };

    let mut events = Vec::new();
    if obs.status == StatusCode::UNAUTHORIZED || obs.status == StatusCode::FORBIDDEN {
        events.push(event(
            SecurityEventKind::AuthFailure,
            format!("{} {} -> {}", obs.method, obs.path, obs.status.as_u16()),
        ));
    } else if obs.status == StatusCode::TOO_MANY_REQUESTS {
        events.push(event(SecurityEventKind::RateLimit, format!("{} {}", obs.method, obs.path)));
    } else if obs.status.is_success() && obs.user.is_some_and(AuthUser::is_admin) && obs.method != Method::GET {
        events.push(event(SecurityEventKind::AdminAction, format!("{} {}", obs.method, obs.path)));
    }
    if obs.latency > slow_threshold {
        events.push(event(
            SecurityEventKind::SlowRequest,
            format!("{} {} took {}ms", obs.method, obs.path, obs.latency.as_millis()),
        ));
    }
    events
}

#[derive(Debug, Clone)]
pub struct SecurityLog {
    enabled: bool,
    slow_threshold: Duration,
}

impl SecurityLog {
    pub fn new(enabled: bool, slow_threshold: Duration) -> Self {
        Self { enabled, slow_threshold }
    }

    pub fn from_config(cfg: &LoggingConfig) -> Self {
        Self::new(cfg.enable_security_log, Duration::from_millis(cfg.slow_request_ms))
    }

    pub fn record(&self, event: &SecurityEvent) {
        tracing::warn!(
            target: SECURITY_TARGET,
            event = event.kind.as_str(),
            ip = %event.ip,
            user = %event.username,
            details = %event.details,
            "security event"
        );
    }
}

pub async fn security_log_middleware(State(log): State<SecurityLog>, req: Request, next: Next) -> Response {
    if !log.enabled {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let ip = client_ip(&req);

    let res = next.run(req).await;

    let obs = Observation {
        method: &method,
        path: &path,
        status: res.status(),
        user: res.extensions().get::<AuthUser>(),
        ip,
        latency: start.elapsed(),
    };
    for event in classify(&obs, log.slow_threshold) {
        log.record(&event);
    }
    res
}
