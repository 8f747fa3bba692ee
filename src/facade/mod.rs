use crate::limiter::{RateLimiter, RateLimiterConfig};
use crate::mutation::{MutationEngine, MutationLedger};
use crate::quota::QuotaEvaluator;
use crate::store::StoreClient;
use std::sync::Arc;

/// One store client and one ledger wired into the three components.
///
/// Everything is dependency-injected: construct one `QuotaGuard` per store,
/// or construct the components directly when only one is needed. No global
/// state anywhere.
pub struct QuotaGuard {
    store: Arc<dyn StoreClient>,
    limiter: RateLimiter,
    quota: QuotaEvaluator,
    mutations: MutationEngine,
}

impl QuotaGuard {
    pub fn new(store: Arc<dyn StoreClient>, ledger: Arc<dyn MutationLedger>) -> Self {
        Self::with_limiter_config(store, ledger, RateLimiterConfig::new())
    }

    pub fn with_limiter_config(
        store: Arc<dyn StoreClient>,
        ledger: Arc<dyn MutationLedger>,
        limiter_config: RateLimiterConfig,
    ) -> Self {
        let limiter = RateLimiter::with_config(Arc::clone(&store), limiter_config);
        let quota = QuotaEvaluator::new(Arc::clone(&store));
        let mutations = MutationEngine::new(Arc::clone(&store), ledger);
        Self {
            store,
            limiter,
            quota,
            mutations,
        }
    }

    pub fn store(&self) -> &Arc<dyn StoreClient> {
        &self.store
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn quota(&self) -> &QuotaEvaluator {
        &self.quota
    }

    pub fn mutations(&self) -> &MutationEngine {
        &self.mutations
    }
}
