//! Redis store implementation
//!
//! Thin typed wrapper over a Redis connection manager: JSON values, integer
//! counters and atomic multi-key increments.

use redis::AsyncCommands;
use serde::de::DeserializeOwned;

use crate::error::AppResult;

/// Redis store wrapper
#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    /// Create a new Redis store
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to Redis at `url`
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }

    /// Get a JSON value
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => {
                let parsed: T = serde_json::from_str(&v)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Get several integer values at once; missing keys are `None`
    pub async fn get_i64s(&self, keys: &[String]) -> AppResult<Vec<Option<i64>>> {
        let mut conn = self.conn.clone();
        // MGET with a single key returns a scalar, so go through a pipeline
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.get(key);
        }
        let values: Vec<Option<i64>> = pipe.query_async(&mut conn).await?;
        Ok(values)
    }

    /// Increment every key by `delta` in one MULTI/EXEC transaction
    pub async fn incr_many_atomic(&self, keys: &[String], delta: i64) -> AppResult<Vec<i64>> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.incr(key, delta);
        }
        let values: Vec<i64> = pipe.query_async(&mut conn).await?;
        Ok(values)
    }

    /// Round-trip a PING
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

/// Key layout
pub mod keys {
    /// Provider configuration for a tenant
    pub fn provider_config(tenant: &str, provider: &str) -> String {
        format!("tollgate:provider:{}:{}", tenant, provider)
    }

    /// Usage counter of a project
    pub fn project_usage(kind: &str, project_id: &str) -> String {
        format!("tollgate:usage:{}:project:{}", kind, project_id)
    }

    /// Usage counter of an organization (parent of projects)
    pub fn organization_usage(kind: &str, organization_id: &str) -> String {
        format!("tollgate:usage:{}:org:{}", kind, organization_id)
    }

    /// Platform-wide usage counter
    pub fn platform_usage(kind: &str) -> String {
        format!("tollgate:usage:{}:platform", kind)
    }

    /// Per-project limit override
    pub fn project_limit(kind: &str, project_id: &str) -> String {
        format!("tollgate:limit:{}:project:{}", kind, project_id)
    }
}
