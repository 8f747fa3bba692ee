// ============================================================================
// Distributed Lock Primitive
// ============================================================================
//
// The store exposes named locks with a bounded blocking acquire. The rate
// limiter serializes TAT updates through them, and the mutation engine uses
// a per-record lock to prevent concurrent double-apply.
//
// ============================================================================

use crate::core::{GuardError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// RAII handle for an acquired named lock. Releases on drop.
pub struct LockGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

/// In-process registry of held lock names.
///
/// Waiters block on a condvar until the name is free or the deadline passes.
pub(crate) struct LockRegistry {
    held: Mutex<HashSet<String>>,
    freed: Condvar,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            freed: Condvar::new(),
        }
    }

    /// Acquire `name`, blocking up to `blocking_timeout`.
    pub fn acquire(self: &Arc<Self>, name: &str, blocking_timeout: Duration) -> Result<LockGuard> {
        let deadline = Instant::now() + blocking_timeout;
        let mut held = self.held.lock()?;

        while held.contains(name) {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => remaining,
                _ => return Err(GuardError::LockTimeout(name.to_string())),
            };

            let (guard, result) = self.freed.wait_timeout(held, remaining)?;
            held = guard;

            if result.timed_out() && held.contains(name) {
                return Err(GuardError::LockTimeout(name.to_string()));
            }
        }

        held.insert(name.to_string());
        drop(held);

        let registry = Arc::clone(self);
        let name = name.to_string();
        Ok(LockGuard::new(move || {
            if let Ok(mut held) = registry.held.lock() {
                held.remove(&name);
                registry.freed.notify_all();
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let registry = Arc::new(LockRegistry::new());

        let guard = registry
            .acquire("lock:a", Duration::from_millis(100))
            .unwrap();
        drop(guard);

        // Reacquirable after release
        let _guard = registry
            .acquire("lock:a", Duration::from_millis(100))
            .unwrap();
    }

    #[test]
    fn test_contended_acquire_times_out() {
        let registry = Arc::new(LockRegistry::new());
        let _held = registry
            .acquire("lock:b", Duration::from_millis(100))
            .unwrap();

        let result = registry.acquire("lock:b", Duration::from_millis(50));
        assert!(matches!(result, Err(GuardError::LockTimeout(_))));
    }

    #[test]
    fn test_independent_names_do_not_contend() {
        let registry = Arc::new(LockRegistry::new());
        let _a = registry
            .acquire("lock:a", Duration::from_millis(50))
            .unwrap();
        let _b = registry
            .acquire("lock:b", Duration::from_millis(50))
            .unwrap();
    }

    #[test]
    fn test_waiter_gets_lock_after_release() {
        let registry = Arc::new(LockRegistry::new());
        let guard = registry
            .acquire("lock:c", Duration::from_secs(1))
            .unwrap();

        let registry2 = Arc::clone(&registry);
        let waiter = std::thread::spawn(move || {
            registry2
                .acquire("lock:c", Duration::from_secs(2))
                .is_ok()
        });

        std::thread::sleep(Duration::from_millis(50));
        drop(guard);

        assert!(waiter.join().unwrap());
    }
}
