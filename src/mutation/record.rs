// ============================================================================
// Mutation Record & Lifecycle State Machine
// ============================================================================
//
// A RedisMutation moves through defined states:
//
//   CREATED ──approve()──> CREATED (under threshold) or APPROVED
//   CREATED/APPROVED ──discard()──> DISCARDED
//   APPROVED ──apply()──> COMPLETED or FAILED
//
// DISCARDED, COMPLETED and FAILED are terminal: once reached, the record is
// permanently inactive and no engine operation may change it again.
//
// ============================================================================

use crate::core::{GuardError, KeyType, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

/// Minimum distinct approvers required before apply() is permitted.
pub const DEFAULT_APPROVAL_THRESHOLD: u32 = 2;

/// Lifecycle status of a mutation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationStatus {
    /// Created, still collecting approvals
    Created,

    /// Approval threshold met, ready to apply
    Approved,

    /// Thrown away before application (terminal)
    Discarded,

    /// Store command executed successfully (terminal)
    Completed,

    /// Store command raised; error recorded on the record (terminal)
    Failed,
}

impl MutationStatus {
    /// Check if the record is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Discarded | Self::Completed | Self::Failed)
    }
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Discarded => write!(f, "DISCARDED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// The fixed enumeration of reviewable store commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandKind {
    Append,
    Del,
    Expire,
    Hset,
    Lpush,
    Lset,
    Rpush,
    Sadd,
    Set,
    Zadd,
    Zincrby,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Append => "APPEND",
            Self::Del => "DEL",
            Self::Expire => "EXPIRE",
            Self::Hset => "HSET",
            Self::Lpush => "LPUSH",
            Self::Lset => "LSET",
            Self::Rpush => "RPUSH",
            Self::Sadd => "SADD",
            Self::Set => "SET",
            Self::Zadd => "ZADD",
            Self::Zincrby => "ZINCRBY",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reviewable, multi-approver mutation of one store key.
///
/// Immutable fields are set at creation; the engine only ever touches the
/// lifecycle fields (status, approvals, applier/discarder metadata).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisMutation {
    pub id: Uuid,

    /// Target store key
    pub key: String,

    /// Store-side type of the target key at creation time, if it existed
    pub key_type: Option<KeyType>,

    pub command: CommandKind,

    /// Command payload as it arrives from the ledger; shape depends on the
    /// command and is parsed into a typed command before execution
    pub value: Option<JsonValue>,

    /// Optional extra command parameters, opaque to the engine
    pub parameters: Option<JsonValue>,

    pub approval_threshold: u32,

    pub status: MutationStatus,

    /// Unique approver identities, in approval order
    pub approved_by: Vec<String>,
    pub last_approved_at: Option<DateTime<Utc>>,

    pub applied_by: Option<String>,
    pub applied_at: Option<DateTime<Utc>>,
    pub apply_error: Option<String>,

    pub discarded_by: Option<String>,
    pub discarded_at: Option<DateTime<Utc>>,

    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl RedisMutation {
    pub fn new(key: &str, command: CommandKind, value: Option<JsonValue>, created_by: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.to_string(),
            key_type: None,
            command,
            value,
            parameters: None,
            approval_threshold: DEFAULT_APPROVAL_THRESHOLD,
            status: MutationStatus::Created,
            approved_by: Vec::new(),
            last_approved_at: None,
            applied_by: None,
            applied_at: None,
            apply_error: None,
            discarded_by: None,
            discarded_at: None,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Set the approval threshold
    pub fn approval_threshold(mut self, threshold: u32) -> Self {
        self.approval_threshold = threshold;
        self
    }

    /// Set extra command parameters
    pub fn parameters(mut self, parameters: JsonValue) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Guard shared by every engine operation.
    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(GuardError::InactiveMutation(self.id.to_string()));
        }
        Ok(())
    }
}
