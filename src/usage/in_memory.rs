//! In-memory usage limiter for testing
//!
//! Same semantics as the Redis limiter without needing a Redis instance.
//! Counters live behind one mutex, so an increment touches the project,
//! organization and platform counters atomically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    error::{AppError, AppResult},
    middleware::principal::Principal,
    usage::limiter::{increment_keys, limit_reached, UsageKind, UsageLimiter},
    store::redis::keys,
};

pub struct InMemoryUsageLimiter {
    counters: Mutex<HashMap<String, i64>>,
    limits: Mutex<HashMap<String, i64>>,
    default_limit: Option<i64>,
    unavailable: AtomicBool,
    checks: AtomicUsize,
    increments: AtomicUsize,
}

impl InMemoryUsageLimiter {
    /// Create a limiter applying `default_limit` to projects without their own
    pub fn new(default_limit: Option<i64>) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            limits: Mutex::new(HashMap::new()),
            default_limit,
            unavailable: AtomicBool::new(false),
            checks: AtomicUsize::new(0),
            increments: AtomicUsize::new(0),
        }
    }

    /// Set a per-project limit
    pub fn set_limit(&self, project_id: &str, limit: i64) {
        self.limits
            .lock()
            .unwrap()
            .insert(project_id.to_string(), limit);
    }

    /// Seed a project's usage counter
    pub fn set_usage(&self, project_id: &str, used: i64) {
        self.counters
            .lock()
            .unwrap()
            .insert(keys::project_usage(UsageKind::AiTokens.as_str(), project_id), used);
    }

    /// Make every operation fail as if the store were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn project_usage(&self, project_id: &str) -> i64 {
        self.counter(&keys::project_usage(UsageKind::AiTokens.as_str(), project_id))
    }

    pub fn organization_usage(&self, organization_id: &str) -> i64 {
        self.counter(&keys::organization_usage(UsageKind::AiTokens.as_str(), organization_id))
    }

    pub fn platform_usage(&self) -> i64 {
        self.counter(&keys::platform_usage(UsageKind::AiTokens.as_str()))
    }

    /// Number of `check_exceeded` calls received
    pub fn check_calls(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    /// Number of successful `increment` calls received
    pub fn increment_calls(&self) -> usize {
        self.increments.load(Ordering::SeqCst)
    }

    fn counter(&self, key: &str) -> i64 {
        self.counters.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    fn ensure_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::QuotaStoreUnavailable("in-memory store marked unavailable".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryUsageLimiter {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl UsageLimiter for InMemoryUsageLimiter {
    async fn check_exceeded(&self, project_id: &str) -> AppResult<bool> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;

        let used = self.project_usage(project_id);
        let project_limit = self.limits.lock().unwrap().get(project_id).copied();
        Ok(limit_reached(used, project_limit, self.default_limit))
    }

    async fn increment(&self, principal: &Principal, amount: i64, kind: UsageKind) -> AppResult<()> {
        self.ensure_available()?;

        let mut counters = self.counters.lock().unwrap();
        for key in increment_keys(principal, kind) {
            *counters.entry(key).or_insert(0) += amount;
        }
        self.increments.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        self.ensure_available()
    }
}
