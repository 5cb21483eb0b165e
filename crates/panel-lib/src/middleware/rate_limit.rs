// ============================
// crates/panel-lib/src/middleware/rate_limit.rs
// ============================
//! Per-address token bucket rate limiting.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use metrics::counter;
use tokio::time::Instant;
use tracing::warn;

use crate::error::{wants_json, AppError};
use crate::metrics::RATE_LIMITED;
use crate::sweeper::Sweep;
use crate::AppState;

/// Classic token bucket refilled continuously
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            tokens: f64::from(capacity),
            capacity: f64::from(capacity),
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Take one token if one is available
    pub fn try_acquire(&mut self) -> bool {
        self.refill(Instant::now());
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Entry in the rate limit map
#[derive(Debug)]
struct ClientBucket {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Rate limiter keyed by client network address
#[derive(Debug, Clone)]
pub struct ClientRateLimiter {
    clients: Arc<DashMap<String, ClientBucket>>,
    refill_per_sec: f64,
    burst: u32,
    /// Buckets idle longer than this are evicted
    idle_timeout: Duration,
}

impl ClientRateLimiter {
    pub fn new(refill_per_sec: f64, burst: u32, idle_timeout: Duration) -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
            refill_per_sec,
            burst,
            idle_timeout,
        }
    }

    /// Consume one token for `address`, creating its bucket on first use
    pub fn allow(&self, address: &str) -> bool {
        let mut entry = self
            .clients
            .entry(address.to_string())
            .or_insert_with(|| ClientBucket {
                bucket: TokenBucket::new(self.burst, self.refill_per_sec),
                last_seen: Instant::now(),
            });

        entry.last_seen = Instant::now();
        entry.bucket.try_acquire()
    }

    /// Drop buckets idle longer than the cleanup interval
    pub fn remove_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.clients.len();
        self.clients
            .retain(|_, client| now.saturating_duration_since(client.last_seen) <= self.idle_timeout);
        before.saturating_sub(self.clients.len())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.clients.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl Sweep for ClientRateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn sweep(&self) -> usize {
        self.remove_idle()
    }
}

/// Rate limiter middleware
pub async fn rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    // Keyed by IP only; the source port changes per connection
    let client_ip = addr.ip().to_string();

    if !state.rate_limiter.allow(&client_ip) {
        counter!(RATE_LIMITED).increment(1);
        warn!(client = %client_ip, path = %request.uri().path(), "rate limit exceeded");
        return AppError::RateLimited.respond(wants_json(request.headers()));
    }

    // Continue to next middleware/handler
    next.run(request).await
}
