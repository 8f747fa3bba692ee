use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-side type of a key, as reported by the backend's TYPE probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    String,
    List,
    Set,
    Hash,
    ZSet,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::List => "list",
            Self::Set => "set",
            Self::Hash => "hash",
            Self::ZSet => "zset",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billable dimension with independent usage/limit tracking.
///
/// Each resource owns one store-side sorted set listing the tenant
/// identifiers currently over quota for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaResource {
    Events,
    Recordings,
    RowsSynced,
}

impl QuotaResource {
    pub const ALL: [QuotaResource; 3] = [Self::Events, Self::Recordings, Self::RowsSynced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Recordings => "recordings",
            Self::RowsSynced => "rows_synced",
        }
    }

    /// Absolute slack tolerated on top of the limit before the resource is
    /// considered over quota. Recordings get 1000; everything else gets none.
    pub fn overage_buffer(&self) -> u64 {
        match self {
            Self::Recordings => 1000,
            _ => 0,
        }
    }

    /// Store key of the sorted set holding currently-limited tenant
    /// identifiers for this resource.
    pub fn limit_set_key(&self) -> String {
        format!("quota-limited:{}", self.as_str())
    }
}

impl fmt::Display for QuotaResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overage_buffer_is_recordings_only() {
        assert_eq!(QuotaResource::Recordings.overage_buffer(), 1000);
        assert_eq!(QuotaResource::Events.overage_buffer(), 0);
        assert_eq!(QuotaResource::RowsSynced.overage_buffer(), 0);
    }

    #[test]
    fn test_limit_set_keys_are_distinct() {
        let keys: std::collections::HashSet<String> = QuotaResource::ALL
            .iter()
            .map(|r| r.limit_set_key())
            .collect();
        assert_eq!(keys.len(), QuotaResource::ALL.len());
    }
}
