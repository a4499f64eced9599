//! Store module
//!
//! Redis access shared by the provider resolver and the usage limiter.

pub mod redis;

pub use self::redis::RedisStore;
