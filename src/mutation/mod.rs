// ============================================================================
// Audited Mutation Module
// ============================================================================
//
// Human-approval-gated workflow for directly mutating store keys, with a
// strict lifecycle state machine and per-command payload validation.
//
// ============================================================================

pub mod command;
pub mod engine;
pub mod ledger;
pub mod record;

pub use command::{validate_mutation, MutationCommand};
pub use engine::MutationEngine;
pub use ledger::{InMemoryLedger, LedgerError, MutationLedger};
pub use record::{CommandKind, MutationStatus, RedisMutation, DEFAULT_APPROVAL_THRESHOLD};
