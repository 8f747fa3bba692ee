//! Convenience re-exports for the common surface.
//!
//! ```
//! use quotaguard::prelude::*;
//! ```

pub use crate::core::{GuardError, KeyType, QuotaResource, Result};
pub use crate::facade::QuotaGuard;
pub use crate::limiter::{RateLimiter, RateLimiterConfig};
pub use crate::mutation::{
    CommandKind, InMemoryLedger, MutationEngine, MutationLedger, MutationStatus, RedisMutation,
};
pub use crate::quota::{
    org_quota_limited_until, set_org_usage_summary, Organization, OrgUsageSummary, QuotaEvaluator,
    ResourceUsage, Team,
};
pub use crate::store::{MemoryStore, StoreClient};
