pub mod evaluator;
pub mod usage;

pub use evaluator::{org_quota_limited_until, set_org_usage_summary, QuotaEvaluator};
pub use usage::{Organization, OrgUsageSummary, ResourceUsage, Team};
