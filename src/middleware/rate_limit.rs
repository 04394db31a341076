use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::ip::client_ip;
use crate::config::RateLimitConfig;
use crate::error::AppError;

/// A per-client sliding window rate limiter.
///
/// Owned by `AppState`; every clone shares the same window map.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<IpAddr, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Admits at most `max_requests` per client within any `window`.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self { requests: Arc::new(Mutex::new(HashMap::new())), max_requests, window }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self::new(cfg.requests, Duration::from_secs(cfg.window_seconds))
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records a request from `ip` if it is admitted.
    ///
    /// On denial nothing is recorded and the error carries how long until the
    /// oldest instant in the window expires.
    pub async fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(ip, Instant::now()).await
    }

    pub async fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut requests = self.requests.lock().await;
        let timestamps = requests.entry(ip).or_default();

        // On time skew, keep the timestamp
        timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.first().copied().unwrap_or(now);
            let retry_after = match now.checked_duration_since(oldest) {
                Some(elapsed) => self.window.saturating_sub(elapsed),
                None => Duration::from_secs(1),
            };
            return Err(retry_after);
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drops clients whose whole window has expired. Returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut requests = self.requests.lock().await;
        let before = requests.len();
        requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));
            !timestamps.is_empty()
        });
        before - requests.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Runs [`sweep`](Self::sweep) every `every` until `cancel` fires.
    pub fn spawn_sweeper(&self, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Rate limiter sweeper stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        let evicted = limiter.sweep().await;
                        if evicted > 0 {
                            tracing::debug!(evicted, "Rate limiter swept idle clients");
                        }
                    }
                }
            }
        })
    }
}

/// Rejects clients over their request budget with `429 Too Many Requests`.
pub async fn rate_limit_middleware(State(limiter): State<RateLimiter>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req);
    match limiter.check(ip).await {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            // Round up so clients never retry a fraction of a second too early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            AppError::RateLimited { retry_after_seconds: secs.max(1) }.into_response()
        }
    }
}
