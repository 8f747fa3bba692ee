// ============================================================================
// GCRA Rate Limiter
// ============================================================================
//
// Generic Cell Rate Algorithm against a single counter key per rate-limited
// entity. The whole per-key state is one floating-point "theoretical arrival
// time" (TAT) stored as a string with a TTL; a per-key distributed lock
// serializes evaluation so concurrent callers agree on ordering.
//
// ============================================================================

use crate::core::{GuardError, Result};
use crate::store::StoreClient;
use std::sync::Arc;
use std::time::Duration;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Bounded wait for the per-key lock. On timeout the check fails closed.
    pub lock_timeout: Duration,

    /// TTL refreshed on every allowed call; idle keys self-heal away.
    pub state_ttl: Duration,

    /// Prefix for per-key lock names.
    pub lock_prefix: String,
}

impl RateLimiterConfig {
    pub fn new() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            state_ttl: Duration::from_secs(60 * 60 * 24),
            lock_prefix: "rate_limiter_lock:".to_string(),
        }
    }

    /// Set the lock-acquire timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the TAT key TTL
    pub fn state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    /// Set the lock name prefix
    pub fn lock_prefix(mut self, prefix: &str) -> Self {
        self.lock_prefix = prefix.to_string();
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// GCRA rate limiter over a shared store.
///
/// Stateless between calls; everything lives under the caller-supplied key
/// in the store, so any number of processes can evaluate the same limit.
pub struct RateLimiter {
    store: Arc<dyn StoreClient>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self::with_config(store, RateLimiterConfig::new())
    }

    pub fn with_config(store: Arc<dyn StoreClient>, config: RateLimiterConfig) -> Self {
        Self { store, config }
    }

    /// Answer "is this call throttled right now?" for `key`, allowing at
    /// most `limit` calls per `period`.
    ///
    /// Returns `Ok(true)` when the call must NOT be allowed. Time comes from
    /// the store's clock, not the local machine, so distributed callers
    /// cannot disagree through clock skew. A lock-acquire timeout or lock
    /// manager failure is answered as "limited" rather than an error.
    pub fn request_is_limited(&self, key: &str, limit: u32, period: Duration) -> Result<bool> {
        if limit == 0 {
            return Err(GuardError::Validation(
                "rate limit must be a positive integer".to_string(),
            ));
        }

        let period_secs = period.as_secs_f64();
        let separation = period_secs / limit as f64;

        let lock_name = format!("{}{}", self.config.lock_prefix, key);
        let _lock = match self.store.acquire_lock(&lock_name, self.config.lock_timeout) {
            Ok(guard) => guard,
            Err(err) => {
                // Fail closed: availability of the protected resource
                // matters more than fairness under store outage.
                tracing::warn!(key, error = %err, "rate limiter lock unavailable, failing closed");
                return Ok(true);
            }
        };

        let now = self.store.time()?;
        let stored_tat = match self.store.get(key)? {
            Some(raw) => raw.parse::<f64>().map_err(|_| {
                GuardError::StoreError(format!("malformed TAT value under key '{key}'"))
            })?,
            None => now,
        };
        let tat = stored_tat.max(now);

        if tat - now <= period_secs - separation {
            let new_tat = tat.max(now) + separation;
            self.store
                .set(key, &new_tat.to_string(), Some(self.config.state_ttl))?;
            Ok(false)
        } else {
            Ok(true)
        }
    }
}
