//! Per-client token bucket for the mutation routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use hsync_core::{config::RateLimitConfig, SyncError};
use tracing::warn;

use crate::app::AppState;
use crate::http::error::ApiError;

/// Buckets idle for this long are dropped by [`RateLimiter::prune`].
pub const IDLE_BUCKET_TTL: Duration = Duration::from_secs(300);

struct Bucket {
    tokens: f64,
    last: Instant,
}

pub struct RateLimiter {
    enabled: bool,
    rate: f64,
    burst: f64,
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            rate: f64::from(config.per_second),
            burst: f64::from(config.burst),
            buckets: DashMap::new(),
        }
    }

    /// Take one token for `key`, or report how many whole seconds until one
    /// is available.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), u64> {
        if !self.enabled {
            return Ok(());
        }
        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.burst,
            last: now,
        });
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.last = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let wait = (1.0 - bucket.tokens) / self.rate;
            Err(wait.ceil().max(1.0) as u64)
        }
    }

    /// Drop buckets not touched within `ttl`. Returns how many were removed.
    pub fn prune(&self, ttl: Duration) -> usize {
        let before = self.buckets.len();
        let now = Instant::now();
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.last) < ttl);
        before - self.buckets.len()
    }

    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

/// Client key: peer address, else the first `X-Forwarded-For` hop.
pub fn client_key(peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(addr) = peer {
        return addr.ip().to_string();
    }
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Middleware rejecting requests over the limit with 429.
pub async fn limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(peer, request.headers());

    match state.limiter.check(&key) {
        Ok(()) => next.run(request).await,
        Err(retry_after_secs) => {
            warn!(client = %key, path = %request.uri().path(), "rate limit exceeded");
            ApiError(SyncError::RateLimited { retry_after_secs }).into_response()
        }
    }
}
