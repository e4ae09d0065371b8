use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rate limit state shared across requests
#[derive(Clone)]
pub struct RateLimitState {
    /// Map of IP address to request history
    attempts: Arc<DashMap<String, Vec<Instant>>>,
    /// Maximum requests per window
    max_requests: u32,
    /// Time window duration
    window_duration: Duration,
}

impl RateLimitState {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_requests,
            window_duration: Duration::from_secs(window_seconds),
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, 60)
    }

    /// Check if the IP address is within rate limits
    pub fn check_rate_limit(&self, ip: &str) -> bool {
        let now = Instant::now();
        let mut attempts = self.attempts.entry(ip.to_string()).or_default();

        // Sliding window: forget attempts older than the window
        attempts.retain(|&time| now.duration_since(time) < self.window_duration);

        // Check if under limit
        if attempts.len() < self.max_requests as usize {
            attempts.push(now);
            true
        } else {
            false
        }
    }

    /// Drop clients with no recent attempts
    pub fn cleanup(&self) {
        let now = Instant::now();
        let keep_for = self.window_duration * 2;

        self.attempts.retain(|_, attempts| {
            attempts.retain(|&time| now.duration_since(time) < keep_for);
            !attempts.is_empty()
        });
    }
}

/// Client address as reported by the proxy in front of us
fn client_ip(req: &Request) -> Option<String> {
    req.headers()
        .get("x-forwarded-for")
        .or_else(|| req.headers().get("x-real-ip"))
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty() && *ip != "unknown")
        .map(str::to_string)
}

/// Rate limiting middleware for the credential endpoints
pub async fn rate_limit_auth(
    State(state): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    // Requests without a client address (internal callers) are not limited
    let Some(client_ip) = client_ip(&req) else {
        return next.run(req).await;
    };

    if !state.check_rate_limit(&client_ip) {
        if cfg!(debug_assertions) {
            tracing::warn!("SECURITY: Rate limit exceeded for IP: {}", client_ip);
        } else {
            tracing::warn!("SECURITY: Rate limit exceeded on {}", req.uri().path());
        }
        return AppError::RateLimited.into_response();
    }

    // Clean up old entries periodically (every 100 tracked clients roughly)
    if state.attempts.len() % 100 == 0 {
        state.cleanup();
    }

    next.run(req).await
}
