use crate::core::{GuardError, QuotaResource, Result};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Usage/limit pair for one billable resource.
///
/// `limit == None` means unlimited: the resource can never be quota-limited.
/// `todays_usage` is usage accrued in the current partial day and counts
/// toward the limit on top of `usage`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub usage: u64,
    pub limit: Option<u64>,
    #[serde(default)]
    pub todays_usage: u64,
}

impl ResourceUsage {
    pub fn new(usage: u64, limit: Option<u64>) -> Self {
        Self {
            usage,
            limit,
            todays_usage: 0,
        }
    }

    pub fn effective_usage(&self) -> u64 {
        self.usage + self.todays_usage
    }
}

/// Billing-period usage summary for one organization, externally supplied
/// by the billing sync job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgUsageSummary {
    pub events: ResourceUsage,
    pub recordings: ResourceUsage,
    pub rows_synced: ResourceUsage,
    /// `[start, end]` of the current billing period, ISO-8601.
    pub period: (String, String),
}

impl OrgUsageSummary {
    pub fn new(period_start: &str, period_end: &str) -> Self {
        Self {
            events: ResourceUsage::default(),
            recordings: ResourceUsage::default(),
            rows_synced: ResourceUsage::default(),
            period: (period_start.to_string(), period_end.to_string()),
        }
    }

    pub fn get(&self, resource: QuotaResource) -> &ResourceUsage {
        match resource {
            QuotaResource::Events => &self.events,
            QuotaResource::Recordings => &self.recordings,
            QuotaResource::RowsSynced => &self.rows_synced,
        }
    }

    pub fn get_mut(&mut self, resource: QuotaResource) -> &mut ResourceUsage {
        match resource {
            QuotaResource::Events => &mut self.events,
            QuotaResource::Recordings => &mut self.recordings,
            QuotaResource::RowsSynced => &mut self.rows_synced,
        }
    }

    /// Unix timestamp of the billing period's end.
    pub fn period_end_timestamp(&self) -> Result<i64> {
        DateTime::parse_from_rfc3339(&self.period.1)
            .map(|dt| dt.timestamp())
            .map_err(|e| {
                GuardError::Validation(format!(
                    "malformed billing period end '{}': {e}",
                    self.period.1
                ))
            })
    }
}

/// The organization-shaped input the evaluator needs: a usage summary and
/// the `never_drop_data` allow-list escape hatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub usage_summary: Option<OrgUsageSummary>,
    pub never_drop_data: bool,
}

impl Organization {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            usage_summary: None,
            never_drop_data: false,
        }
    }
}

/// A team belonging to an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    pub api_token: String,
}

impl Team {
    pub fn new(id: u64, api_token: &str) -> Self {
        Self {
            id,
            api_token: api_token.to_string(),
        }
    }

    /// Identifier this team appears under in a resource's limit set.
    /// Most resources key by API token; rows-synced keys by team id.
    pub fn limited_attribute(&self, resource: QuotaResource) -> String {
        match resource {
            QuotaResource::RowsSynced => self.id.to_string(),
            _ => self.api_token.clone(),
        }
    }
}
