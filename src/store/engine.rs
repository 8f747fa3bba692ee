use crate::core::{KeyType, Result};
use crate::store::LockGuard;
use std::collections::HashMap;
use std::time::Duration;

/// Store client trait - allows pluggable key-value/sorted-set backends.
///
/// Implementable over any Redis-compatible engine. All components take a
/// client by `Arc<dyn StoreClient>` so backends can be swapped per
/// deployment (and per test).
pub trait StoreClient: Send + Sync {
    /// Read a string key. Missing keys are `None`, not an error.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a string key unconditionally, replacing any prior value of any
    /// type. `ttl` of `None` leaves the key persistent.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Write a string key only if it does not already exist. Returns whether
    /// the write happened.
    fn set_nx(&self, key: &str, value: &str) -> Result<bool>;

    /// Delete a key. Returns whether it existed.
    fn del(&self, key: &str) -> Result<bool>;

    /// Set a TTL on an existing key. Returns whether the key existed.
    fn expire(&self, key: &str, seconds: i64) -> Result<bool>;

    /// Append to a string key (creating it if missing). Returns the new
    /// length.
    fn append(&self, key: &str, value: &str) -> Result<usize>;

    /// Set hash fields from a mapping.
    fn hset(&self, key: &str, fields: &HashMap<String, String>) -> Result<()>;

    /// Add a member to a set. Returns whether it was newly added.
    fn sadd(&self, key: &str, member: &str) -> Result<bool>;

    /// Push to the head of a list. Returns the new length.
    fn lpush(&self, key: &str, value: &str) -> Result<usize>;

    /// Push to the tail of a list. Returns the new length.
    fn rpush(&self, key: &str, value: &str) -> Result<usize>;

    /// Set the list element at `index` (negative indices count from the
    /// tail). Out-of-range is an error, as is a missing key.
    fn lset(&self, key: &str, index: i64, value: &str) -> Result<()>;

    /// Add members with scores to a sorted set. Returns the number of
    /// members newly added (score updates of existing members don't count).
    fn zadd(&self, key: &str, members: &HashMap<String, f64>) -> Result<usize>;

    /// Range over a sorted set by rank, ascending by (score, member).
    /// `start`/`stop` follow Redis semantics (inclusive, negatives from the
    /// tail).
    fn zrange_withscores(&self, key: &str, start: i64, stop: i64) -> Result<Vec<(String, f64)>>;

    /// Remove members from a sorted set. Returns how many were removed.
    fn zrem(&self, key: &str, members: &[String]) -> Result<usize>;

    /// Increment a sorted-set member's score, creating it at `amount` if
    /// absent. Returns the new score.
    fn zincrby(&self, key: &str, amount: f64, member: &str) -> Result<f64>;

    /// Store-side type of a key, `None` if the key does not exist.
    fn key_type(&self, key: &str) -> Result<Option<KeyType>>;

    /// Server-side clock, seconds since the Unix epoch. All distributed
    /// callers must agree on this one time source.
    fn time(&self) -> Result<f64>;

    /// Acquire a named distributed lock with a bounded wait.
    fn acquire_lock(&self, name: &str, blocking_timeout: Duration) -> Result<LockGuard>;
}
