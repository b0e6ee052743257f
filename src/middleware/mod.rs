//! Middleware for observability and rate limiting.
//!
//! This module provides:
//! - Request logging with latency tracking
//! - Fixed-window rate limiting per IP address

pub mod logging;
pub mod rate_limit;

pub use logging::request_logging;
pub use rate_limit::{
    rate_limit_middleware, Clock, ManualClock, RateLimitConfig, RateLimitDecision, RateLimitStore,
    RateLimiter, SystemClock,
};
