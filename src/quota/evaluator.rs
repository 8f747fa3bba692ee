// ============================================================================
// Quota Evaluator
// ============================================================================
//
// Translates an organization's usage summary into (a) a per-resource
// "limited until" answer and (b) durable sorted sets of currently-limited
// tenant identifiers, reconciled per organization. Reconciliation is
// idempotent and only ever touches the given organization's own teams'
// identifiers, so manual override tokens survive every sync.
//
// ============================================================================

use crate::core::{QuotaResource, Result};
use crate::quota::usage::{Organization, OrgUsageSummary, Team};
use crate::store::StoreClient;
use std::collections::HashMap;
use std::sync::Arc;

/// When is this organization limited for `resource`, if at all?
///
/// `None` when there is no usage summary, the resource is unlimited, or the
/// organization is on the `never_drop_data` allow list. Otherwise the
/// organization is limited until the end of the billing period once
/// `usage + todays_usage` reaches the limit plus the resource's overage
/// buffer (recordings tolerate 1000 extra; everything else none).
pub fn org_quota_limited_until(
    org: &Organization,
    resource: QuotaResource,
) -> Result<Option<i64>> {
    let Some(summary) = &org.usage_summary else {
        return Ok(None);
    };
    if org.never_drop_data {
        return Ok(None);
    }

    let usage = summary.get(resource);
    let Some(limit) = usage.limit else {
        return Ok(None);
    };

    if usage.effective_usage() >= limit + resource.overage_buffer() {
        Ok(Some(summary.period_end_timestamp()?))
    } else {
        Ok(None)
    }
}

/// Merge a fresh usage summary (and per-resource today's-usage overrides)
/// into the organization, preserving anything not explicitly supplied.
///
/// Returns whether the stored summary actually changed, so callers can skip
/// redundant downstream syncs. Unspecified today's usage falls back to the
/// previously stored value, or 0 on first write.
pub fn set_org_usage_summary(
    org: &mut Organization,
    new_usage: Option<OrgUsageSummary>,
    todays_usage: Option<HashMap<QuotaResource, u64>>,
) -> bool {
    let Some(mut merged) = new_usage.or_else(|| org.usage_summary.clone()) else {
        return false;
    };

    for resource in QuotaResource::ALL {
        let stored_todays = org
            .usage_summary
            .as_ref()
            .map(|summary| summary.get(resource).todays_usage);
        let override_todays = todays_usage
            .as_ref()
            .and_then(|overrides| overrides.get(&resource).copied());

        merged.get_mut(resource).todays_usage =
            override_todays.or(stored_todays).unwrap_or(0);
    }

    if org.usage_summary.as_ref() == Some(&merged) {
        return false;
    }

    org.usage_summary = Some(merged);
    true
}

/// Quota evaluator over a shared store.
pub struct QuotaEvaluator {
    store: Arc<dyn StoreClient>,
}

impl QuotaEvaluator {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    /// Reconcile every resource's limit set against the organization's
    /// current usage, touching only the given teams' identifiers.
    ///
    /// Running twice with unchanged usage issues zero store writes.
    pub fn sync_org_quota_limits(&self, org: &Organization, teams: &[Team]) -> Result<()> {
        for resource in QuotaResource::ALL {
            let limited_until = org_quota_limited_until(org, resource)?;
            let set_key = resource.limit_set_key();

            let attributes: Vec<String> = teams
                .iter()
                .map(|team| team.limited_attribute(resource))
                .collect();
            let current: HashMap<String, f64> = self
                .store
                .zrange_withscores(&set_key, 0, -1)?
                .into_iter()
                .collect();

            match limited_until {
                Some(until) => {
                    let score = until as f64;
                    let to_add: HashMap<String, f64> = attributes
                        .iter()
                        .filter(|attr| current.get(*attr) != Some(&score))
                        .map(|attr| (attr.clone(), score))
                        .collect();

                    if !to_add.is_empty() {
                        self.store.zadd(&set_key, &to_add)?;
                        tracing::info!(
                            org = %org.id,
                            resource = %resource,
                            added = to_add.len(),
                            limited_until = until,
                            "added teams to quota limit set"
                        );
                    }
                }
                None => {
                    let to_remove: Vec<String> = attributes
                        .into_iter()
                        .filter(|attr| current.contains_key(attr))
                        .collect();

                    if !to_remove.is_empty() {
                        self.store.zrem(&set_key, &to_remove)?;
                        tracing::info!(
                            org = %org.id,
                            resource = %resource,
                            removed = to_remove.len(),
                            "removed teams from quota limit set"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Current members of a resource's limit set. No score filtering:
    /// stale entries are evicted by reconciliation, not TTL.
    pub fn list_limited_team_attributes(&self, resource: QuotaResource) -> Result<Vec<String>> {
        Ok(self
            .store
            .zrange_withscores(&resource.limit_set_key(), 0, -1)?
            .into_iter()
            .map(|(member, _score)| member)
            .collect())
    }

    /// Bulk-replace a resource's limit set. Administrative escape hatch,
    /// independent of reconciliation.
    pub fn replace_limited_team_tokens(
        &self,
        resource: QuotaResource,
        tokens: HashMap<String, i64>,
    ) -> Result<()> {
        let set_key = resource.limit_set_key();
        self.store.del(&set_key)?;

        if !tokens.is_empty() {
            let members: HashMap<String, f64> = tokens
                .into_iter()
                .map(|(member, expiry)| (member, expiry as f64))
                .collect();
            self.store.zadd(&set_key, &members)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const PERIOD_START: &str = "2024-01-01T00:00:00+00:00";
    const PERIOD_END: &str = "2024-02-01T00:00:00+00:00";
    const PERIOD_END_TS: i64 = 1706745600;

    fn org_with_usage(resource: QuotaResource, usage: u64, limit: Option<u64>) -> Organization {
        let mut org = Organization::new("org-1");
        let mut summary = OrgUsageSummary::new(PERIOD_START, PERIOD_END);
        *summary.get_mut(resource) = ResourceUsage::new(usage, limit);
        org.usage_summary = Some(summary);
        org
    }

    use crate::quota::usage::ResourceUsage;

    #[test]
    fn test_no_summary_means_not_limited() {
        let org = Organization::new("org-1");
        assert_eq!(
            org_quota_limited_until(&org, QuotaResource::Events).unwrap(),
            None
        );
    }

    #[test]
    fn test_unlimited_resource_is_never_limited() {
        let org = org_with_usage(QuotaResource::Events, 1_000_000, None);
        assert_eq!(
            org_quota_limited_until(&org, QuotaResource::Events).unwrap(),
            None
        );
    }

    #[test]
    fn test_events_have_no_buffer() {
        let org = org_with_usage(QuotaResource::Events, 1100, Some(100));
        assert_eq!(
            org_quota_limited_until(&org, QuotaResource::Events).unwrap(),
            Some(PERIOD_END_TS)
        );
    }

    #[test]
    fn test_recordings_buffer_asymmetry() {
        let under = org_with_usage(QuotaResource::Recordings, 1099, Some(100));
        assert_eq!(
            org_quota_limited_until(&under, QuotaResource::Recordings).unwrap(),
            None
        );

        let over = org_with_usage(QuotaResource::Recordings, 1100, Some(100));
        assert_eq!(
            org_quota_limited_until(&over, QuotaResource::Recordings).unwrap(),
            Some(PERIOD_END_TS)
        );
    }

    #[test]
    fn test_todays_usage_counts_toward_limit() {
        let mut org = org_with_usage(QuotaResource::Events, 90, Some(100));
        org.usage_summary
            .as_mut()
            .unwrap()
            .get_mut(QuotaResource::Events)
            .todays_usage = 10;
        assert_eq!(
            org_quota_limited_until(&org, QuotaResource::Events).unwrap(),
            Some(PERIOD_END_TS)
        );
    }

    #[test]
    fn test_never_drop_data_overrides_everything() {
        for resource in QuotaResource::ALL {
            let mut org = org_with_usage(resource, u64::MAX / 2, Some(1));
            org.never_drop_data = true;
            assert_eq!(org_quota_limited_until(&org, resource).unwrap(), None);
        }
    }

    #[test]
    fn test_set_usage_summary_reports_change() {
        let mut org = Organization::new("org-1");
        let summary = OrgUsageSummary::new(PERIOD_START, PERIOD_END);

        assert!(set_org_usage_summary(&mut org, Some(summary.clone()), None));
        // Same summary again: nothing changed
        assert!(!set_org_usage_summary(&mut org, Some(summary), None));
    }

    #[test]
    fn test_set_usage_summary_merges_todays_usage() {
        let mut org = Organization::new("org-1");
        let mut summary = OrgUsageSummary::new(PERIOD_START, PERIOD_END);
        summary.events = ResourceUsage::new(50, Some(100));

        let todays: HashMap<QuotaResource, u64> = [(QuotaResource::Events, 7)].into();
        assert!(set_org_usage_summary(
            &mut org,
            Some(summary.clone()),
            Some(todays)
        ));
        let stored = org.usage_summary.as_ref().unwrap();
        assert_eq!(stored.events.todays_usage, 7);
        // Unspecified resources default to 0 on first write
        assert_eq!(stored.recordings.todays_usage, 0);

        // New summary without overrides preserves the stored todays_usage
        summary.events.usage = 60;
        assert!(set_org_usage_summary(&mut org, Some(summary), None));
        assert_eq!(org.usage_summary.as_ref().unwrap().events.todays_usage, 7);
    }

    #[test]
    fn test_sync_adds_and_removes_only_own_teams() {
        let store = Arc::new(MemoryStore::new());
        let evaluator = QuotaEvaluator::new(Arc::clone(&store) as Arc<dyn StoreClient>);

        // Manual override token inserted by another mechanism
        let manual: HashMap<String, f64> = [("manual-token".to_string(), 9e9)].into();
        store
            .zadd(&QuotaResource::Events.limit_set_key(), &manual)
            .unwrap();

        let org = org_with_usage(QuotaResource::Events, 200, Some(100));
        let teams = vec![Team::new(1, "token-a"), Team::new(2, "token-b")];

        evaluator.sync_org_quota_limits(&org, &teams).unwrap();
        let mut limited = evaluator
            .list_limited_team_attributes(QuotaResource::Events)
            .unwrap();
        limited.sort();
        assert_eq!(limited, vec!["manual-token", "token-a", "token-b"]);

        // Usage drops under the limit: own teams leave, the manual token stays
        let recovered = org_with_usage(QuotaResource::Events, 50, Some(100));
        evaluator.sync_org_quota_limits(&recovered, &teams).unwrap();
        assert_eq!(
            evaluator
                .list_limited_team_attributes(QuotaResource::Events)
                .unwrap(),
            vec!["manual-token"]
        );
    }

    #[test]
    fn test_sync_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let evaluator = QuotaEvaluator::new(Arc::clone(&store) as Arc<dyn StoreClient>);

        let org = org_with_usage(QuotaResource::Events, 200, Some(100));
        let teams = vec![Team::new(1, "token-a")];

        evaluator.sync_org_quota_limits(&org, &teams).unwrap();
        let membership = evaluator
            .list_limited_team_attributes(QuotaResource::Events)
            .unwrap();

        let writes_before = store.write_count();
        evaluator.sync_org_quota_limits(&org, &teams).unwrap();

        assert_eq!(store.write_count(), writes_before);
        assert_eq!(
            evaluator
                .list_limited_team_attributes(QuotaResource::Events)
                .unwrap(),
            membership
        );
    }

    #[test]
    fn test_replace_limited_team_tokens() {
        let store = Arc::new(MemoryStore::new());
        let evaluator = QuotaEvaluator::new(Arc::clone(&store) as Arc<dyn StoreClient>);

        let initial: HashMap<String, i64> = [("old".to_string(), 100)].into();
        evaluator
            .replace_limited_team_tokens(QuotaResource::Recordings, initial)
            .unwrap();

        let replacement: HashMap<String, i64> =
            [("a".to_string(), 200), ("b".to_string(), 300)].into();
        evaluator
            .replace_limited_team_tokens(QuotaResource::Recordings, replacement)
            .unwrap();

        let mut limited = evaluator
            .list_limited_team_attributes(QuotaResource::Recordings)
            .unwrap();
        limited.sort();
        assert_eq!(limited, vec!["a", "b"]);
    }

    #[test]
    fn test_rows_synced_uses_team_ids() {
        let store = Arc::new(MemoryStore::new());
        let evaluator = QuotaEvaluator::new(Arc::clone(&store) as Arc<dyn StoreClient>);

        let org = org_with_usage(QuotaResource::RowsSynced, 500, Some(100));
        let teams = vec![Team::new(7, "token-a")];

        evaluator.sync_org_quota_limits(&org, &teams).unwrap();
        assert_eq!(
            evaluator
                .list_limited_team_attributes(QuotaResource::RowsSynced)
                .unwrap(),
            vec!["7"]
        );
        // The events set is untouched for an org only over on rows-synced
        assert!(evaluator
            .list_limited_team_attributes(QuotaResource::Events)
            .unwrap()
            .is_empty());
    }
}
