// ============================================================================
// QuotaGuard Library
// ============================================================================
//
// Control-plane library for a shared key-value/sorted-set store:
//
// - `limiter`:  GCRA rate limiter over a single TAT key per entity,
//               serialized by a per-key distributed lock, failing closed.
// - `quota`:    per-organization usage-quota evaluator maintaining
//               store-side sorted sets of currently-limited tenants.
// - `mutation`: human-approval-gated workflow for direct store mutations,
//               with a strict lifecycle state machine and per-command
//               payload validation.
//
// All three talk to the store through the `StoreClient` trait; the bundled
// `MemoryStore` is the reference backend and any Redis-compatible client
// can implement it. Mutation state persists through the `MutationLedger`
// trait.
//
// ============================================================================

pub mod core;
pub mod facade;
pub mod limiter;
pub mod mutation;
pub mod prelude;
pub mod quota;
pub mod store;

// Re-export main types for convenience
pub use crate::core::{GuardError, KeyType, QuotaResource, Result};
pub use facade::QuotaGuard;
pub use limiter::{RateLimiter, RateLimiterConfig};
pub use mutation::{
    CommandKind, InMemoryLedger, LedgerError, MutationEngine, MutationLedger, MutationStatus,
    RedisMutation,
};
pub use quota::{
    org_quota_limited_until, set_org_usage_summary, Organization, OrgUsageSummary, QuotaEvaluator,
    ResourceUsage, Team,
};
pub use store::{LockGuard, MemoryStore, StoreClient, StoreValue};
