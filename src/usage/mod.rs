//! Usage limiting module
//!
//! Quota pre-check and post-success accounting against per-project counters.

#[cfg(any(test, feature = "test-utils"))]
pub mod in_memory;
pub mod limiter;

#[cfg(any(test, feature = "test-utils"))]
pub use in_memory::InMemoryUsageLimiter;
pub use limiter::{RedisUsageLimiter, UsageKind, UsageLimiter};
