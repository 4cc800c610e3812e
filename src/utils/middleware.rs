use axum::{
    extract::{ConnectInfo, Request},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Extension,
};
use dashmap::DashMap;
use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    pub count: u64,
    pub window_start: Instant,
}

/// Fixed-window request limiter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    pub requests_per_window: u64,
    pub window_duration: Duration,
    entries: DashMap<String, RateLimitEntry>,
}

impl RateLimiter {
    pub fn new(requests_per_window: u64, window_duration_secs: u64) -> Self {
        Self {
            requests_per_window,
            window_duration: Duration::from_secs(window_duration_secs),
            entries: DashMap::new(),
        }
    }

    pub fn check_rate_limit(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let allowed = {
            let mut entry = self.entries.entry(key.to_string()).or_insert(RateLimitEntry {
                count: 0,
                window_start: now,
            });
            if now.duration_since(entry.window_start) >= self.window_duration {
                entry.count = 0;
                entry.window_start = now;
            }
            if entry.count >= self.requests_per_window {
                false
            } else {
                entry.count += 1;
                true
            }
        };

        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < self.window_duration);

        allowed
    }
}

pub async fn rate_limiter_middleware(
    Extension(limiter): Extension<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    match ip {
        Some(ip) => {
            if !limiter.check_rate_limit(&ip) {
                warn!(action = "rate_limited", ip = %ip);
                return Err(StatusCode::TOO_MANY_REQUESTS);
            }
        }
        None => warn!(action = "rate_limit_skipped", reason = "client address unavailable"),
    }
    Ok(next.run(request).await)
}
