use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::{config::RateLimitConfig, error::AppError, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Deny { retry_after_secs: u64 },
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started: Instant,
    count: u32,
}

/// Fixed-window attempt counter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_attempts: u32,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    /// A fresh window always admits its first attempt, so `max_attempts`
    /// is at least 1.
    pub fn new(window: Duration, max_attempts: u32) -> Self {
        Self {
            window,
            max_attempts: max_attempts.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self::new(Duration::from_millis(cfg.window_ms), cfg.max_attempts)
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        // A poisoned map is still a valid map of counters.
        let mut windows = self.windows.lock().unwrap_or_else(|p| p.into_inner());

        let window = self.window;
        windows.retain(|_, w| now.saturating_duration_since(w.started) < window);

        let entry = windows.entry(key.to_string()).or_insert(RateWindow {
            started: now,
            count: 0,
        });
        entry.count = entry.count.saturating_add(1);
        if entry.count <= self.max_attempts {
            return RateDecision::Allow;
        }

        let remaining = (entry.started + window).saturating_duration_since(now);
        let retry_after_secs = remaining.as_millis().div_ceil(1000).max(1) as u64;
        RateDecision::Deny { retry_after_secs }
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}

/// Client key for rate limiting: forwarded headers when the proxy is
/// trusted, else the peer address.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(first) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return first.to_string();
        }
        if let Some(real) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
            return real.trim().to_string();
        }
    }
    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Throttles the routes it wraps with the shared auth limiter.
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(req.headers(), peer, state.config.trust_proxy);

    match state.auth_limiter.check(&key) {
        RateDecision::Allow => {
            debug!(client = %key, "rate limit check passed");
            Ok(next.run(req).await)
        }
        RateDecision::Deny { retry_after_secs } => {
            warn!(client = %key, retry_after_secs, "rate limit exceeded");
            Err(AppError::RateLimited { retry_after_secs })
        }
    }
}

pub type SharedRateLimiter = Arc<RateLimiter>;
