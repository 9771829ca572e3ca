use std::sync::Arc;

use async_trait::async_trait;
use common::error::Res;
use dashmap::DashMap;
use sqlx::PgPool;

use crate::window::window_expired;

/// Outcome of one counted request against a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    pub allowed: bool,
    /// Requests seen in the current window, this one included.
    pub count: u32,
    /// Epoch millis at which the window resets.
    pub reset_at_ms: i64,
}

impl WindowHit {
    pub fn remaining(&self, max_requests: u32) -> u32 {
        max_requests.saturating_sub(self.count)
    }
}

/// Atomic increment-and-check against a fixed window, keyed by
/// identity (`global`, `user:<id>` or `ip:<addr>`).
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(
        &self,
        key: &str,
        max_requests: u32,
        window_ms: i64,
        now_ms: i64,
    ) -> Res<WindowHit>;
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u32,
    reset_at_ms: i64,
}

/// Process-local fallback store. Not shared across instances and
/// reset on restart; that degradation is accepted when the persistent
/// store is unreachable.
#[derive(Default)]
pub struct InMemoryStore {
    counters: DashMap<String, Counter>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry whose window already expired. Run
    /// periodically to bound memory.
    pub fn sweep(&self, now_ms: i64) {
        self.counters
            .retain(|_, counter| !window_expired(counter.reset_at_ms, now_ms));
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn hit(
        &self,
        key: &str,
        max_requests: u32,
        window_ms: i64,
        now_ms: i64,
    ) -> Res<WindowHit> {
        let mut entry = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            reset_at_ms: now_ms + window_ms,
        });

        if window_expired(entry.reset_at_ms, now_ms) {
            entry.count = 0;
            entry.reset_at_ms = now_ms + window_ms;
        }
        entry.count += 1;

        Ok(WindowHit {
            allowed: entry.count <= max_requests,
            count: entry.count,
            reset_at_ms: entry.reset_at_ms,
        })
    }
}

/// Persistent store: delegates the increment-and-check to the
/// `rate_limit_hit` database function, which is transactionally safe
/// across concurrent callers and instances.
pub struct PgRateLimitStore {
    pool: Arc<PgPool>,
}

impl PgRateLimitStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitStore for PgRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        max_requests: u32,
        window_ms: i64,
        _now_ms: i64,
    ) -> Res<WindowHit> {
        let (allowed, count, reset_at_ms): (bool, i64, i64) =
            sqlx::query_as("SELECT allowed, hit_count, reset_at_ms FROM rate_limit_hit($1, $2, $3)")
                .bind(key)
                .bind(max_requests as i64)
                .bind(window_ms)
                .fetch_one(&*self.pool)
                .await?;

        Ok(WindowHit {
            allowed,
            count: count.try_into().unwrap_or(u32::MAX),
            reset_at_ms,
        })
    }
}

/// Primary/fallback composite. Always tries the primary first; any
/// primary error substitutes the in-memory fallback for this request.
/// The primary is never retried within the same request and there is
/// no caller-visible error path.
pub struct FailoverStore {
    primary: Option<Arc<dyn RateLimitStore>>,
    fallback: Arc<InMemoryStore>,
}

impl FailoverStore {
    pub fn new(primary: Option<Arc<dyn RateLimitStore>>, fallback: Arc<InMemoryStore>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl RateLimitStore for FailoverStore {
    async fn hit(
        &self,
        key: &str,
        max_requests: u32,
        window_ms: i64,
        now_ms: i64,
    ) -> Res<WindowHit> {
        if let Some(primary) = &self.primary {
            match primary.hit(key, max_requests, window_ms, now_ms).await {
                Ok(hit) => return Ok(hit),
                Err(e) => {
                    log::debug!("Primary rate-limit store unavailable, using fallback: {}", e);
                }
            }
        }
        self.fallback.hit(key, max_requests, window_ms, now_ms).await
    }
}

/// Always-erroring store, used to exercise the failover path.
#[cfg(test)]
pub struct FailingStore;

#[cfg(test)]
#[async_trait]
impl RateLimitStore for FailingStore {
    async fn hit(&self, _key: &str, _max: u32, _window_ms: i64, _now_ms: i64) -> Res<WindowHit> {
        Err(common::error::AppError::Internal(
            "store unreachable".to_string(),
        ))
    }
}
