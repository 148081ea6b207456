use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::metrics;

/// Outcome of counting one request against its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after: u64 },
}

/// Fixed-window counters keyed by client. Swappable for a shared store
/// when several instances sit behind one balancer.
#[async_trait::async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(&self, key: &str, window: Duration, limit: u32) -> Decision;
}

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// In-process store. Expired windows are swept every [`SWEEP_EVERY`] hits.
#[derive(Default)]
pub struct InMemoryStore {
    windows: DashMap<String, Window>,
    hits: AtomicU64,
}

const SWEEP_EVERY: u64 = 256;

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit_at(&self, key: &str, window: Duration, limit: u32, now: Instant) -> Decision {
        if self.hits.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.windows.retain(|_, w| now < w.reset_at);
        }

        let mut entry = self.windows.entry(key.to_owned()).or_insert_with(|| Window {
            count: 0,
            reset_at: now + window,
        });
        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }
        if entry.count >= limit {
            let remaining = entry.reset_at.saturating_duration_since(now);
            let retry_after = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Decision::Limited { retry_after };
        }
        entry.count += 1;
        Decision::Allowed
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait::async_trait]
impl RateLimitStore for InMemoryStore {
    async fn hit(&self, key: &str, window: Duration, limit: u32) -> Decision {
        self.hit_at(key, window, limit, Instant::now())
    }
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    window: Duration,
    limit: u32,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, cfg: &RateLimitConfig) -> Self {
        Self {
            store,
            window: Duration::from_secs(cfg.window_secs),
            limit: cfg.max_requests,
        }
    }

    pub async fn check(&self, key: &str) -> Result<(), ApiError> {
        match self.store.hit(key, self.window, self.limit).await {
            Decision::Allowed => Ok(()),
            Decision::Limited { retry_after } => {
                metrics::RATE_LIMIT_HITS.inc();
                tracing::warn!(client = %key, retry_after, "rate limit exceeded");
                Err(ApiError::RateLimited { retry_after })
            }
        }
    }
}

/// First forwarded address, then the other common proxy headers.
pub fn client_key(headers: &HeaderMap) -> String {
    ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"]
        .iter()
        .filter_map(|h| headers.get(*h).and_then(|v| v.to_str().ok()))
        .filter_map(|v| v.split(',').next().map(str::trim))
        .find(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_owned()
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(request.headers());
    if let Err(e) = limiter.check(&key).await {
        return e.into_response();
    }
    next.run(request).await
}
