//! Fixed-window rate limiting keyed by client IP and request path.
//!
//! Each (ip, path) pair gets a counter that lives for one window. The first
//! request of a window starts it; once the counter reaches the limit, further
//! requests are rejected with 429 until the window rolls over. Counters are
//! kept in a shared in-process map and pruned by a background job, so the
//! limiting is approximate across replicas, which is acceptable here.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::state::ApiState;

/// Paths that must stay reachable for probes and scrapes.
const EXEMPT_PATHS: &[&str] = &["/health", "/metrics"];

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum requests per window for one (ip, path) pair
    pub max_requests: u32,
    /// Window length; also the effective TTL of a counter
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of one rate limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after: Duration,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<(String, String), Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request against the (ip, path) window and decide whether it
    /// may proceed.
    pub fn check(&self, ip: &str, path: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        let window = windows
            .entry((ip.to_string(), path.to_string()))
            .or_insert(Window {
                started: now,
                count: 0,
            });

        if now.duration_since(window.started) >= self.config.window {
            window.started = now;
            window.count = 0;
        }

        let elapsed = now.duration_since(window.started);
        let retry_after = self.config.window.saturating_sub(elapsed);

        if window.count >= self.config.max_requests {
            return RateLimitDecision {
                allowed: false,
                limit: self.config.max_requests,
                remaining: 0,
                retry_after,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            limit: self.config.max_requests,
            remaining: self.config.max_requests - window.count,
            retry_after,
        }
    }

    /// Drop windows that have been idle past their TTL. Returns how many
    /// were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let ttl = self.config.window;
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.started) < ttl);
        before - windows.len()
    }
}

/// Axum middleware enforcing the fixed-window limit.
pub async fn rate_limit_middleware(
    State(state): State<ApiState>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if EXEMPT_PATHS.contains(&path.as_str()) {
        return next.run(req).await;
    }

    let ip = client_ip(&req);
    let decision = state.rate_limiter.check(&ip, &path);

    if !decision.allowed {
        let retry_after = decision.retry_after.as_secs().max(1);
        tracing::warn!(ip = %ip, path = %path, "rate limit exceeded");

        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "too many requests",
                "retry_after": retry_after,
            })),
        )
            .into_response();
        insert_header(&mut response, "retry-after", &retry_after.to_string());
        return response;
    }

    let mut response = next.run(req).await;
    insert_header(
        &mut response,
        "x-ratelimit-limit",
        &decision.limit.to_string(),
    );
    insert_header(
        &mut response,
        "x-ratelimit-remaining",
        &decision.remaining.to_string(),
    );
    response
}

/// Client IP: first entry of `X-Forwarded-For` when present (the usual
/// reverse-proxy setup), otherwise the socket address recorded by axum.
fn client_ip(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    req.extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn insert_header(response: &mut Response, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_millis(window_ms),
        })
    }

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let limiter = limiter(3, 60_000);
        for _ in 0..3 {
            assert!(limiter.check("1.2.3.4", "/cases").allowed);
        }
        let decision = limiter.check("1.2.3.4", "/cases");
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn test_keys_are_per_ip_and_path() {
        let limiter = limiter(1, 60_000);
        assert!(limiter.check("1.2.3.4", "/cases").allowed);
        assert!(!limiter.check("1.2.3.4", "/cases").allowed);

        // Different path and different ip each get their own window
        assert!(limiter.check("1.2.3.4", "/plans").allowed);
        assert!(limiter.check("5.6.7.8", "/cases").allowed);
    }

    #[test]
    fn test_window_rolls_over() {
        let limiter = limiter(1, 50);
        assert!(limiter.check("1.2.3.4", "/cases").allowed);
        assert!(!limiter.check("1.2.3.4", "/cases").allowed);

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.check("1.2.3.4", "/cases").allowed);
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = limiter(3, 60_000);
        assert_eq!(limiter.check("1.2.3.4", "/cases").remaining, 2);
        assert_eq!(limiter.check("1.2.3.4", "/cases").remaining, 1);
        assert_eq!(limiter.check("1.2.3.4", "/cases").remaining, 0);
    }

    #[test]
    fn test_prune_drops_expired_windows() {
        let limiter = limiter(5, 50);
        limiter.check("1.2.3.4", "/cases");
        limiter.check("5.6.7.8", "/plans");
        assert_eq!(limiter.prune(), 0);

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(limiter.prune(), 2);
    }
}
