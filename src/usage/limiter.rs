//! Usage limiter implementation
//!
//! `check_exceeded` is the read-only gate evaluated before dispatch;
//! `increment` records one successful relay against the project, its
//! organization (when known) and the platform total in a single atomic step.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{
    error::AppResult,
    middleware::principal::Principal,
    store::redis::{keys, RedisStore},
};

/// Metered usage kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageKind {
    AiTokens,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::AiTokens => "ai_tokens",
        }
    }
}

impl std::fmt::Display for UsageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate and accounting operations over the usage counter store
#[async_trait]
pub trait UsageLimiter: Send + Sync {
    /// Whether the project's usage meets or exceeds its limit
    async fn check_exceeded(&self, project_id: &str) -> AppResult<bool>;

    /// Add `amount` to the project and every aggregate above it
    async fn increment(&self, principal: &Principal, amount: i64, kind: UsageKind) -> AppResult<()>;

    /// Check that the backing store is reachable
    async fn ping(&self) -> AppResult<()>;
}

/// Decide whether `used` has reached the effective limit.
///
/// A stored per-project limit wins over the default; no limit at all means
/// the project is unmetered.
pub fn limit_reached(used: i64, project_limit: Option<i64>, default_limit: Option<i64>) -> bool {
    match project_limit.or(default_limit) {
        Some(limit) => used >= limit,
        None => false,
    }
}

/// Counter keys touched by one increment
pub fn increment_keys(principal: &Principal, kind: UsageKind) -> Vec<String> {
    let mut keys = vec![keys::project_usage(kind.as_str(), &principal.project_id)];
    if let Some(org) = &principal.organization_id {
        keys.push(keys::organization_usage(kind.as_str(), org));
    }
    keys.push(keys::platform_usage(kind.as_str()));
    keys
}

/// Redis-backed limiter
pub struct RedisUsageLimiter {
    store: RedisStore,
    default_limit: Option<i64>,
}

impl RedisUsageLimiter {
    pub fn new(store: RedisStore, default_limit: Option<i64>) -> Self {
        Self { store, default_limit }
    }
}

#[async_trait]
impl UsageLimiter for RedisUsageLimiter {
    #[instrument(skip(self))]
    async fn check_exceeded(&self, project_id: &str) -> AppResult<bool> {
        let kind = UsageKind::AiTokens.as_str();
        let values = self
            .store
            .get_i64s(&[
                keys::project_usage(kind, project_id),
                keys::project_limit(kind, project_id),
            ])
            .await?;

        let used = values.first().copied().flatten().unwrap_or(0);
        let project_limit = values.get(1).copied().flatten();
        let exceeded = limit_reached(used, project_limit, self.default_limit);

        debug!(used, limit = ?project_limit.or(self.default_limit), exceeded, "Quota check");
        Ok(exceeded)
    }

    #[instrument(skip(self, principal), fields(project_id = %principal.project_id))]
    async fn increment(&self, principal: &Principal, amount: i64, kind: UsageKind) -> AppResult<()> {
        let keys = increment_keys(principal, kind);
        let values = self.store.incr_many_atomic(&keys, amount).await?;
        debug!(kind = %kind, amount, project_total = ?values.first(), "Recorded usage");
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
