use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::middleware::{RateLimiter, SecurityLog};
use crate::store::Store;

/// The shared application state.
///
/// Cheap to clone; every field is a handle to a shared component.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    /// Per-client request windows. Owned here rather than as a global so tests
    /// and the sweeper task see the same instance.
    pub rate_limiter: RateLimiter,
    pub security_log: SecurityLog,
}

impl AppState {
    /// `config` must already carry a signing secret (see `config::ensure_signing_secret`).
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        let tokens = TokenService::new(&config.auth.jwt_secret, config.auth.jwt_expiry_hours);
        let rate_limiter = RateLimiter::from_config(&config.rate_limit);
        let security_log = SecurityLog::from_config(&config.logging);

        Self { store, config: Arc::new(config), tokens: Arc::new(tokens), rate_limiter, security_log }
    }
}
