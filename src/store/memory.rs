use crate::core::{GuardError, KeyType, Result};
use crate::store::lock::LockRegistry;
use crate::store::{LockGuard, StoreClient, StoreValue};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

struct Entry {
    value: StoreValue,
    expires_at: Option<f64>,
}

impl Entry {
    fn persistent(value: StoreValue) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: f64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory reference store.
///
/// Implements the full [`StoreClient`] surface with lazy TTL expiry against
/// its own clock. The clock can be advanced explicitly, which makes
/// time-dependent behavior (GCRA recovery, limit-set expiry scores)
/// deterministic in tests. A write-op counter backs idempotence assertions.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    locks: Arc<LockRegistry>,
    clock_skew: RwLock<f64>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            locks: Arc::new(LockRegistry::new()),
            clock_skew: RwLock::new(0.0),
            writes: AtomicU64::new(0),
        }
    }

    /// Advance the store's clock. Affects `time()` and TTL expiry only.
    pub fn advance_clock(&self, by: Duration) {
        let mut skew = self.clock_skew.write().unwrap_or_else(|e| e.into_inner());
        *skew += by.as_secs_f64();
    }

    /// Number of mutating commands executed so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Set members of a set key (test/inspection helper, not part of the
    /// client trait).
    pub fn smembers(&self, key: &str) -> Result<HashSet<String>> {
        match self.read_value(key)? {
            None => Ok(HashSet::new()),
            Some(StoreValue::Set(members)) => Ok(members),
            Some(other) => Err(wrong_type(key, "set", other.type_name())),
        }
    }

    /// All fields of a hash key (test/inspection helper).
    pub fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        match self.read_value(key)? {
            None => Ok(HashMap::new()),
            Some(StoreValue::Hash(fields)) => Ok(fields),
            Some(other) => Err(wrong_type(key, "hash", other.type_name())),
        }
    }

    /// All elements of a list key, head to tail (test/inspection helper).
    pub fn lrange_all(&self, key: &str) -> Result<Vec<String>> {
        match self.read_value(key)? {
            None => Ok(Vec::new()),
            Some(StoreValue::List(items)) => Ok(items),
            Some(other) => Err(wrong_type(key, "list", other.type_name())),
        }
    }

    fn now(&self) -> Result<f64> {
        let base = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GuardError::StoreError(format!("system clock error: {e}")))?
            .as_secs_f64();
        let skew = *self.clock_skew.read()?;
        Ok(base + skew)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    /// Clone the live value under `key`, honoring expiry.
    fn read_value(&self, key: &str) -> Result<Option<StoreValue>> {
        let now = self.now()?;
        let entries = self.entries.read()?;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    /// Write-lock the map with the expired entry for `key` evicted, so type
    /// checks never see a dead value.
    fn write_entries(&self, key: &str) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        let now = self.now()?;
        let mut entries = self.entries.write()?;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(entries)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_type(key: &str, expected: &str, actual: &str) -> GuardError {
    GuardError::TypeMismatch(format!(
        "key '{key}' holds a {actual} value, expected {expected}"
    ))
}

/// Normalize a Redis-style inclusive rank range against `len`.
fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }
    let start = if start < 0 { len + start } else { start }.max(0);
    let stop = if stop < 0 { len + stop } else { stop }.min(len - 1);
    if start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl StoreClient for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.read_value(key)? {
            None => Ok(None),
            Some(StoreValue::Str(s)) => Ok(Some(s)),
            Some(other) => Err(wrong_type(key, "string", other.type_name())),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.record_write();
        let expires_at = match ttl {
            Some(ttl) => Some(self.now()? + ttl.as_secs_f64()),
            None => None,
        };
        let mut entries = self.write_entries(key)?;
        entries.insert(
            key.to_string(),
            Entry {
                value: StoreValue::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    fn set_nx(&self, key: &str, value: &str) -> Result<bool> {
        self.record_write();
        let mut entries = self.write_entries(key)?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry::persistent(StoreValue::Str(value.to_string())),
        );
        Ok(true)
    }

    fn del(&self, key: &str) -> Result<bool> {
        self.record_write();
        let mut entries = self.write_entries(key)?;
        Ok(entries.remove(key).is_some())
    }

    fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        self.record_write();
        let now = self.now()?;
        let mut entries = self.write_entries(key)?;
        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(now + seconds as f64);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn append(&self, key: &str, value: &str) -> Result<usize> {
        self.record_write();
        let mut entries = self.write_entries(key)?;
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(StoreValue::Str(String::new())))
        {
            Entry {
                value: StoreValue::Str(s),
                ..
            } => {
                s.push_str(value);
                Ok(s.len())
            }
            entry => Err(wrong_type(key, "string", entry.value.type_name())),
        }
    }

    fn hset(&self, key: &str, fields: &HashMap<String, String>) -> Result<()> {
        self.record_write();
        let mut entries = self.write_entries(key)?;
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(StoreValue::Hash(HashMap::new())))
        {
            Entry {
                value: StoreValue::Hash(existing),
                ..
            } => {
                for (field, value) in fields {
                    existing.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            entry => Err(wrong_type(key, "hash", entry.value.type_name())),
        }
    }

    fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        self.record_write();
        let mut entries = self.write_entries(key)?;
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(StoreValue::Set(HashSet::new())))
        {
            Entry {
                value: StoreValue::Set(members),
                ..
            } => Ok(members.insert(member.to_string())),
            entry => Err(wrong_type(key, "set", entry.value.type_name())),
        }
    }

    fn lpush(&self, key: &str, value: &str) -> Result<usize> {
        self.record_write();
        let mut entries = self.write_entries(key)?;
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(StoreValue::List(Vec::new())))
        {
            Entry {
                value: StoreValue::List(items),
                ..
            } => {
                items.insert(0, value.to_string());
                Ok(items.len())
            }
            entry => Err(wrong_type(key, "list", entry.value.type_name())),
        }
    }

    fn rpush(&self, key: &str, value: &str) -> Result<usize> {
        self.record_write();
        let mut entries = self.write_entries(key)?;
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(StoreValue::List(Vec::new())))
        {
            Entry {
                value: StoreValue::List(items),
                ..
            } => {
                items.push(value.to_string());
                Ok(items.len())
            }
            entry => Err(wrong_type(key, "list", entry.value.type_name())),
        }
    }

    fn lset(&self, key: &str, index: i64, value: &str) -> Result<()> {
        self.record_write();
        let mut entries = self.write_entries(key)?;
        match entries.get_mut(key) {
            None => Err(GuardError::StoreError(format!("key '{key}' does not exist"))),
            Some(Entry {
                value: StoreValue::List(items),
                ..
            }) => {
                let len = items.len() as i64;
                let idx = if index < 0 { len + index } else { index };
                if idx < 0 || idx >= len {
                    return Err(GuardError::StoreError(format!(
                        "index {index} out of range for key '{key}'"
                    )));
                }
                items[idx as usize] = value.to_string();
                Ok(())
            }
            Some(entry) => Err(wrong_type(key, "list", entry.value.type_name())),
        }
    }

    fn zadd(&self, key: &str, members: &HashMap<String, f64>) -> Result<usize> {
        self.record_write();
        let mut entries = self.write_entries(key)?;
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(StoreValue::ZSet(HashMap::new())))
        {
            Entry {
                value: StoreValue::ZSet(existing),
                ..
            } => {
                let mut added = 0;
                for (member, score) in members {
                    if existing.insert(member.clone(), *score).is_none() {
                        added += 1;
                    }
                }
                Ok(added)
            }
            entry => Err(wrong_type(key, "zset", entry.value.type_name())),
        }
    }

    fn zrange_withscores(&self, key: &str, start: i64, stop: i64) -> Result<Vec<(String, f64)>> {
        let members = match self.read_value(key)? {
            None => return Ok(Vec::new()),
            Some(StoreValue::ZSet(members)) => members,
            Some(other) => return Err(wrong_type(key, "zset", other.type_name())),
        };

        let mut ordered: Vec<(String, f64)> = members.into_iter().collect();
        ordered.sort_by(|(am, asc), (bm, bsc)| {
            asc.partial_cmp(bsc)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| am.cmp(bm))
        });

        Ok(match normalize_range(start, stop, ordered.len()) {
            Some((start, stop)) => ordered[start..=stop].to_vec(),
            None => Vec::new(),
        })
    }

    fn zrem(&self, key: &str, members: &[String]) -> Result<usize> {
        self.record_write();
        let mut entries = self.write_entries(key)?;
        match entries.get_mut(key) {
            None => Ok(0),
            Some(Entry {
                value: StoreValue::ZSet(existing),
                ..
            }) => {
                let mut removed = 0;
                for member in members {
                    if existing.remove(member).is_some() {
                        removed += 1;
                    }
                }
                Ok(removed)
            }
            Some(entry) => Err(wrong_type(key, "zset", entry.value.type_name())),
        }
    }

    fn zincrby(&self, key: &str, amount: f64, member: &str) -> Result<f64> {
        self.record_write();
        let mut entries = self.write_entries(key)?;
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(StoreValue::ZSet(HashMap::new())))
        {
            Entry {
                value: StoreValue::ZSet(existing),
                ..
            } => {
                let score = existing.entry(member.to_string()).or_insert(0.0);
                *score += amount;
                Ok(*score)
            }
            entry => Err(wrong_type(key, "zset", entry.value.type_name())),
        }
    }

    fn key_type(&self, key: &str) -> Result<Option<KeyType>> {
        Ok(self.read_value(key)?.map(|value| value.key_type()))
    }

    fn time(&self) -> Result<f64> {
        self.now()
    }

    fn acquire_lock(&self, name: &str, blocking_timeout: Duration) -> Result<LockGuard> {
        self.locks.acquire(name, blocking_timeout)
    }
}
