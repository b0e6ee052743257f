//! Rate limiting middleware.
//!
//! Fixed-window counter per client IP. Expired entries are swept lazily on
//! every check, so there is no background cleanup task. State lives in this
//! process only; several instances behind a balancer each count separately.

use crate::errors::GateError;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn per_hour(max_requests: u32) -> Self {
        Self::new(Duration::from_secs(60 * 60), max_requests)
    }
}

/// Time source for the limiter.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic system clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Used to replay request timelines.
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }

    /// Jump to `at` past the origin. Never moves backwards.
    pub fn set(&self, at: Duration) {
        let mut elapsed = self.elapsed.lock();
        if at > *elapsed {
            *elapsed = at;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

/// Counting table shared by every request a limiter sees.
///
/// Owned by whoever builds the limiter; clones share the same table.
#[derive(Clone, Default)]
pub struct RateLimitStore {
    entries: Arc<Mutex<HashMap<IpAddr, RateLimitEntry>>>,
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses currently tracked
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Requests counted for `ip` in its current window
    pub fn count(&self, ip: &IpAddr) -> Option<u32> {
        self.entries.lock().get(ip).map(|entry| entry.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Fixed-window limiter. Cheap to clone.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    store: RateLimitStore,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: RateLimitStore) -> Self {
        Self {
            config,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request from `ip` and decide whether it may proceed.
    pub fn check(&self, ip: IpAddr) -> RateLimitDecision {
        let now = self.clock.now();
        let window = self.config.window;
        let max = self.config.max_requests;

        // Sweep, lookup and increment happen under one lock so concurrent
        // requests cannot lose an increment.
        let mut entries = self.store.entries.lock();
        entries.retain(|_, entry| now.saturating_duration_since(entry.window_start) <= window);

        match entries.get_mut(&ip) {
            None => {
                entries.insert(
                    ip,
                    RateLimitEntry {
                        count: 1,
                        window_start: now,
                    },
                );
                RateLimitDecision::Allowed {
                    remaining: max.saturating_sub(1),
                }
            }
            Some(entry) if entry.count < max => {
                entry.count += 1;
                RateLimitDecision::Allowed {
                    remaining: max - entry.count,
                }
            }
            Some(entry) => RateLimitDecision::Limited {
                retry_after: (entry.window_start + window).saturating_duration_since(now),
            },
        }
    }
}

/// Rate limiting middleware function.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, GateError> {
    let ip = addr.ip();

    match limiter.check(ip) {
        RateLimitDecision::Allowed { remaining } => {
            debug!(ip = %ip, remaining, "Rate limit check passed");
            Ok(next.run(request).await)
        }
        RateLimitDecision::Limited { retry_after } => {
            warn!(
                ip = %ip,
                path = %request.uri().path(),
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            Err(GateError::RateLimited { retry_after })
        }
    }
}
