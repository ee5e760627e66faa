//! Rate limiting middleware for the API
//!
//! Sliding-window limit per client IP on the configured path prefixes, with support for
//! exempt IPs.

use axum::{
    Json,
    extract::{ConnectInfo, Request},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use std::{
    collections::{HashMap, VecDeque},
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;
use crate::error::ErrorEnvelope;

/// Message returned with HTTP 429; the client recognises it as a rate limit
pub const RATE_LIMIT_MESSAGE: &str = "Api Limit exceeded. Please wait a moment.";

/// Request timestamps inside the current window
struct SlidingWindow {
    hits: VecDeque<Instant>,
}

impl SlidingWindow {
    fn new() -> Self {
        Self {
            hits: VecDeque::new(),
        }
    }

    /// Record a hit at `now`, or return the seconds until the oldest hit leaves the window
    fn try_hit(&mut self, now: Instant, window: Duration, max_requests: usize) -> Option<u64> {
        while let Some(&oldest) = self.hits.front() {
            if now.duration_since(oldest) >= window {
                self.hits.pop_front();
            } else {
                break;
            }
        }

        if self.hits.len() < max_requests {
            self.hits.push_back(now);
            return None;
        }

        let wait = self
            .hits
            .front()
            .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
            .unwrap_or(window);
        Some(wait.as_secs_f64().ceil().max(1.0) as u64)
    }
}

/// Rate limiter with per-IP tracking
pub struct RateLimiter {
    /// Per-IP request windows
    windows: Mutex<HashMap<IpAddr, SlidingWindow>>,
    /// Configuration
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter from configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Only the configured path prefixes are limited
    fn is_path_limited(&self, path: &str) -> bool {
        self.config
            .paths
            .iter()
            .any(|limited| path == limited || path.starts_with(limited.as_str()))
    }

    /// Check if an IP address is exempt from rate limiting
    fn is_ip_exempt(&self, addr: &SocketAddr) -> bool {
        self.config.exempt_ips.contains(&addr.ip())
    }

    /// Check if request should be rate limited; `Some(seconds)` to wait when it is
    pub async fn check(&self, path: &str, addr: SocketAddr) -> Option<u64> {
        self.check_at(path, addr, Instant::now()).await
    }

    async fn check_at(&self, path: &str, addr: SocketAddr, now: Instant) -> Option<u64> {
        if !self.is_path_limited(path) || self.is_ip_exempt(&addr) {
            return None;
        }

        let mut windows = self.windows.lock().await;
        // Drop idle clients so the map does not grow without bound
        windows.retain(|_, w| {
            w.hits
                .back()
                .is_some_and(|&last| now.duration_since(last) < self.config.window)
        });
        windows
            .entry(addr.ip())
            .or_insert_with(SlidingWindow::new)
            .try_hit(now, self.config.window, self.config.max_requests)
    }
}

/// Rate limiting middleware function
pub async fn rate_limit_middleware(
    axum::extract::State(limiter): axum::extract::State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: axum::middleware::Next,
) -> Response {
    match limiter.check(req.uri().path(), addr).await {
        None => next.run(req).await,
        Some(retry_after) => {
            tracing::warn!(client = %addr.ip(), path = %req.uri().path(), retry_after, "rate limit exceeded");
            let body = ErrorEnvelope::new("rate_limited", RATE_LIMIT_MESSAGE);
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            max_requests,
            window: Duration::from_secs(3600),
            paths: vec!["/process/".to_string(), "/api/process/".to_string()],
            exempt_ips: vec!["10.0.0.1".parse().unwrap()],
        })
    }

    fn client(ip: &str) -> SocketAddr {
        format!("{ip}:50000").parse().unwrap()
    }

    #[tokio::test]
    async fn limits_after_max_requests_in_window() {
        let limiter = limiter(2);
        let start = Instant::now();
        let addr = client("192.0.2.1");

        assert_eq!(limiter.check_at("/process/", addr, start).await, None);
        assert_eq!(limiter.check_at("/api/process/", addr, start).await, None);

        let wait = limiter
            .check_at("/process/", addr, start + Duration::from_secs(600))
            .await;
        assert_eq!(wait, Some(3000));
    }

    #[tokio::test]
    async fn window_slides() {
        let limiter = limiter(1);
        let start = Instant::now();
        let addr = client("192.0.2.1");

        assert_eq!(limiter.check_at("/process/", addr, start).await, None);
        assert!(limiter.check_at("/process/", addr, start).await.is_some());
        assert_eq!(
            limiter
                .check_at("/process/", addr, start + Duration::from_secs(3600))
                .await,
            None
        );
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert_eq!(limiter.check_at("/process/", client("192.0.2.1"), now).await, None);
        assert_eq!(limiter.check_at("/process/", client("192.0.2.2"), now).await, None);
    }

    #[tokio::test]
    async fn other_paths_and_exempt_ips_pass() {
        let limiter = limiter(0);
        let now = Instant::now();

        assert_eq!(limiter.check_at("/api/video-info/", client("192.0.2.1"), now).await, None);
        assert_eq!(limiter.check_at("/download/x.mp4", client("192.0.2.1"), now).await, None);
        assert_eq!(limiter.check_at("/process/", client("10.0.0.1"), now).await, None);
        assert!(limiter.check_at("/process/", client("192.0.2.1"), now).await.is_some());
    }
}
