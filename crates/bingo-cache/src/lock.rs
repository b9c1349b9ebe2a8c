//! Distributed lock coordinator over the shared state store.
//!
//! A lock is a string key holding the owner's token, written with
//! set-if-absent and a TTL. Release and extension are compare-and-delete
//! and compare-and-expire on that token, so an instance can never release
//! or renew a lock it no longer holds. A crashed holder's lock expires on
//! its own.
//!
//! No blocking variant exists: callers either report "busy" after one
//! attempt or use [`LockCoordinator::acquire_with_retry`] with a bounded
//! [`RetryPolicy`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use bingo_core::config::game::RetryConfig;
use bingo_core::result::AppResult;
use bingo_core::traits::store::StateStore;

/// Identifies the holder of a lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    /// A fresh random token, unique to one critical section.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// A token naming a stable owner, for re-entrant locks.
    pub fn for_owner(owner: impl fmt::Display) -> Self {
        Self(owner.to_string())
    }

    /// The raw token value stored under the lock key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LockToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `attempts` counts the first try and is at least one.
    pub fn new(attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Build a policy from configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Same delays with a different attempt count.
    pub fn with_attempts(self, attempts: u32) -> Self {
        Self::new(attempts, self.base_delay, self.max_delay)
    }

    /// Total attempts, including the first.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay after the `failure`-th failed attempt (zero based).
    pub fn delay_for(&self, failure: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << failure.min(16))
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or
    /// attempts run out. The last error is returned on exhaustion.
    pub async fn retry_transient<T, F, Fut>(&self, operation: &str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut failure = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && failure + 1 < self.attempts => {
                    let delay = self.delay_for(failure);
                    warn!(operation, attempt = failure + 1, error = %e, ?delay, "Transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    failure += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// TTL-bound mutual exclusion identified by owner tokens.
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    store: Arc<dyn StateStore>,
}

impl LockCoordinator {
    /// Create a coordinator over `store`.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Take the lock if nobody holds it.
    pub async fn acquire(&self, key: &str, token: &LockToken, ttl: Duration) -> AppResult<bool> {
        let acquired = self.store.set_nx(key, token.as_str(), ttl).await?;
        if !acquired {
            debug!(key, "Lock held by another owner");
        }
        Ok(acquired)
    }

    /// Take the lock if nobody holds it, or refresh it if `token` already does.
    pub async fn acquire_reentrant(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> AppResult<bool> {
        if self.store.set_nx(key, token.as_str(), ttl).await? {
            return Ok(true);
        }
        let reentered = self.store.expire_if_eq(key, token.as_str(), ttl).await?;
        if !reentered {
            debug!(key, "Lock held by another owner");
        }
        Ok(reentered)
    }

    /// Try to take the lock, backing off between attempts.
    ///
    /// Returns `false` once the policy's attempts are exhausted.
    pub async fn acquire_with_retry(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
        policy: &RetryPolicy,
    ) -> AppResult<bool> {
        for failure in 0..policy.attempts() {
            if self.store.set_nx(key, token.as_str(), ttl).await? {
                return Ok(true);
            }
            if failure + 1 < policy.attempts() {
                tokio::time::sleep(policy.delay_for(failure)).await;
            }
        }
        debug!(key, attempts = policy.attempts(), "Lock acquisition exhausted retries");
        Ok(false)
    }

    /// Release the lock if `token` holds it.
    pub async fn release(&self, key: &str, token: &LockToken) -> AppResult<bool> {
        let released = self.store.delete_if_eq(key, token.as_str()).await?;
        if !released {
            debug!(key, "Lock not released: no longer held by this owner");
        }
        Ok(released)
    }

    /// Release, logging instead of propagating store failures.
    ///
    /// Used on cleanup paths where the TTL bounds the damage of a failure.
    pub async fn release_quietly(&self, key: &str, token: &LockToken) {
        if let Err(e) = self.release(key, token).await {
            warn!(key, error = %e, "Failed to release lock; it will expire");
        }
    }

    /// Reset the TTL if `token` still holds the lock.
    pub async fn extend(&self, key: &str, token: &LockToken, ttl: Duration) -> AppResult<bool> {
        self.store.expire_if_eq(key, token.as_str(), ttl).await
    }

    /// Current holder's token, if the lock is held.
    pub async fn holder(&self, key: &str) -> AppResult<Option<String>> {
        self.store.get(key).await
    }
}
