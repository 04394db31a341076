//! Middleware components for HTTP request processing.
//!
//! Layered in `routes::router`, outermost first: client ip resolution,
//! security log, security headers, rate limiting, then the per-route access
//! control gate.

pub mod auth;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod security_log;

pub use auth::AuthUser;
pub use rate_limit::RateLimiter;
pub use security_log::SecurityLog;
