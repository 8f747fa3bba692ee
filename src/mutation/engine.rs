// ============================================================================
// Mutation Engine
// ============================================================================
//
// Drives RedisMutation records through their lifecycle. Every transition is
// persisted to the ledger; a failed persistence after a store command leaves
// ledger and store potentially disagreeing, which is surfaced as a distinct
// error for the host application to alert on (the engine never retries).
//
// ============================================================================

use crate::core::{GuardError, Result};
use crate::mutation::command::{validate_mutation, MutationCommand};
use crate::mutation::ledger::{LedgerError, MutationLedger};
use crate::mutation::record::{MutationStatus, RedisMutation};
use crate::store::StoreClient;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// How `apply()`'s command execution ended. Deliberately infallible: once
/// the guards pass, the record always reaches a terminal state.
enum TerminalOutcome {
    Completed,
    Failed(String),
}

/// Approval-gated engine for direct store mutations.
pub struct MutationEngine {
    store: Arc<dyn StoreClient>,
    ledger: Arc<dyn MutationLedger>,
    lock_timeout: Duration,
}

impl MutationEngine {
    pub fn new(store: Arc<dyn StoreClient>, ledger: Arc<dyn MutationLedger>) -> Self {
        Self {
            store,
            ledger,
            lock_timeout: Duration::from_secs(5),
        }
    }

    /// Set the bounded wait for the per-record apply lock
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Validate and persist a new mutation record.
    ///
    /// Validation failures mean the record is never persisted. The target
    /// key's current store type is captured on the record for reviewers.
    pub fn create(&self, draft: RedisMutation) -> Result<RedisMutation> {
        if draft.approval_threshold == 0 {
            return Err(GuardError::Validation(
                "approval threshold must be at least 1".to_string(),
            ));
        }
        validate_mutation(
            self.store.as_ref(),
            &draft.key,
            draft.command,
            draft.value.as_ref(),
        )?;

        let mut record = draft;
        record.key_type = self.store.key_type(&record.key)?;

        self.ledger
            .create(&record)
            .map_err(|e| save_error(&record, e))?;
        Ok(record)
    }

    /// Record one approval. Idempotent per unique identity; flips the record
    /// to APPROVED within the same call once the threshold is met.
    pub fn approve(&self, id: Uuid, approver: &str) -> Result<RedisMutation> {
        let mut record = self.load(id)?;
        record.ensure_active()?;

        if record.approved_by.iter().any(|a| a == approver) {
            // Duplicate identity: no field changes, nothing to persist
            return Ok(record);
        }

        record.approved_by.push(approver.to_string());
        record.last_approved_at = Some(Utc::now());
        if record.approved_by.len() as u32 >= record.approval_threshold {
            record.status = MutationStatus::Approved;
        }

        self.save(&record)?;
        Ok(record)
    }

    /// Throw the record away. Allowed from CREATED or APPROVED.
    pub fn discard(&self, id: Uuid, discarded_by: &str) -> Result<RedisMutation> {
        let mut record = self.load(id)?;
        record.ensure_active()?;

        record.status = MutationStatus::Discarded;
        record.discarded_by = Some(discarded_by.to_string());
        record.discarded_at = Some(Utc::now());

        self.save(&record)?;
        Ok(record)
    }

    /// Execute the approved command against the store.
    ///
    /// Guard violations (inactive record, threshold not met) raise without
    /// touching anything. Once past the guards the record always lands in
    /// COMPLETED or FAILED — command errors are recorded on it, not raised.
    /// A per-record lock keeps two concurrent appliers from both passing the
    /// guards and running the command twice.
    pub fn apply(&self, id: Uuid, applied_by: &str) -> Result<RedisMutation> {
        let lock_name = format!("redis_mutation_lock:{id}");
        let _lock = self.store.acquire_lock(&lock_name, self.lock_timeout)?;

        // Re-read under the lock: a concurrent applier may have finished
        let mut record = self.load(id)?;
        record.ensure_active()?;
        if record.status != MutationStatus::Approved {
            return Err(GuardError::MissingApproval(id.to_string()));
        }

        let outcome = self.execute_command(&record);
        record.applied_by = Some(applied_by.to_string());
        record.applied_at = Some(Utc::now());
        match outcome {
            TerminalOutcome::Completed => {
                record.status = MutationStatus::Completed;
                record.apply_error = None;
            }
            TerminalOutcome::Failed(reason) => {
                tracing::warn!(mutation = %record.id, key = %record.key, error = %reason, "mutation apply failed");
                record.status = MutationStatus::Failed;
                record.apply_error = Some(reason);
            }
        }

        self.save(&record)?;
        Ok(record)
    }

    fn execute_command(&self, record: &RedisMutation) -> TerminalOutcome {
        let command = match MutationCommand::from_parts(record.command, record.value.as_ref()) {
            Ok(command) => command,
            Err(e) => return TerminalOutcome::Failed(e.to_string()),
        };

        match command.execute(self.store.as_ref(), &record.key) {
            Ok(()) => TerminalOutcome::Completed,
            Err(e) => TerminalOutcome::Failed(e.to_string()),
        }
    }

    fn load(&self, id: Uuid) -> Result<RedisMutation> {
        self.ledger.get(id).map_err(|e| match e {
            LedgerError::NotFound(id) => GuardError::MutationNotFound(id.to_string()),
            LedgerError::Backend(source) => {
                GuardError::Ledger(format!("failed to read mutation record: {source}"))
            }
        })
    }

    fn save(&self, record: &RedisMutation) -> Result<()> {
        self.ledger
            .update(record)
            .map_err(|e| save_error(record, e))
    }
}

fn save_error(record: &RedisMutation, error: LedgerError) -> GuardError {
    tracing::error!(
        mutation = %record.id,
        error = %error,
        "failed to persist mutation record; ledger and store may now disagree"
    );
    GuardError::FailedToSave {
        source: anyhow::Error::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KeyType;
    use crate::mutation::ledger::InMemoryLedger;
    use crate::mutation::record::CommandKind;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn engine() -> (Arc<MemoryStore>, Arc<InMemoryLedger>, MutationEngine) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let engine = MutationEngine::new(
            Arc::clone(&store) as Arc<dyn StoreClient>,
            Arc::clone(&ledger) as Arc<dyn MutationLedger>,
        );
        (store, ledger, engine)
    }

    #[test]
    fn test_create_captures_key_type() {
        let (store, _ledger, engine) = engine();
        store.set("k", "v", None).unwrap();

        let record = engine
            .create(RedisMutation::new("k", CommandKind::Del, None, "alice"))
            .unwrap();
        assert_eq!(record.key_type, Some(KeyType::String));

        let fresh = engine
            .create(RedisMutation::new("missing", CommandKind::Del, None, "alice"))
            .unwrap();
        assert_eq!(fresh.key_type, None);
    }

    #[test]
    fn test_create_rejects_sadd_against_string_key() {
        let (store, ledger, engine) = engine();
        store.set("k", "v", None).unwrap();

        let draft = RedisMutation::new("k", CommandKind::Sadd, Some(json!("member")), "alice");
        let id = draft.id;
        assert!(matches!(
            engine.create(draft),
            Err(GuardError::Validation(_))
        ));

        // Record never persisted, store key untouched
        assert!(matches!(ledger.get(id), Err(LedgerError::NotFound(_))));
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_approval_threshold_flow() {
        let (_store, _ledger, engine) = engine();
        let record = engine
            .create(RedisMutation::new("k", CommandKind::Del, None, "alice").approval_threshold(2))
            .unwrap();

        let after_one = engine.approve(record.id, "reviewer-1").unwrap();
        assert_eq!(after_one.status, MutationStatus::Created);

        // Same identity again: count does not advance
        let duplicate = engine.approve(record.id, "reviewer-1").unwrap();
        assert_eq!(duplicate.approved_by, vec!["reviewer-1"]);
        assert_eq!(duplicate.status, MutationStatus::Created);
        assert_eq!(duplicate.last_approved_at, after_one.last_approved_at);

        let after_two = engine.approve(record.id, "reviewer-2").unwrap();
        assert_eq!(after_two.status, MutationStatus::Approved);
        assert_eq!(after_two.approved_by.len(), 2);
    }

    #[test]
    fn test_apply_before_approval_raises() {
        let (store, _ledger, engine) = engine();
        store.set("k", "v", None).unwrap();

        let record = engine
            .create(RedisMutation::new("k", CommandKind::Del, None, "alice"))
            .unwrap();

        assert!(matches!(
            engine.apply(record.id, "alice"),
            Err(GuardError::MissingApproval(_))
        ));
        // Guard violation: no record mutation, no store mutation
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_terminal_records_are_immutable() {
        let (_store, _ledger, engine) = engine();
        let record = engine
            .create(RedisMutation::new("k", CommandKind::Del, None, "alice"))
            .unwrap();
        let discarded = engine.discard(record.id, "bob").unwrap();
        assert_eq!(discarded.status, MutationStatus::Discarded);

        for result in [
            engine.approve(record.id, "carol"),
            engine.discard(record.id, "carol"),
            engine.apply(record.id, "carol"),
        ] {
            assert!(matches!(result, Err(GuardError::InactiveMutation(_))));
        }

        // All fields untouched after the rejected calls
        let reloaded = engine.load(record.id).unwrap();
        assert_eq!(reloaded, discarded);
    }

    #[test]
    fn test_apply_command_failure_reaches_failed_state() {
        let (store, _ledger, engine) = engine();
        // APPEND against a zset key fails at execution time
        let members = [("m".to_string(), 1.0)].into();
        store.zadd("k", &members).unwrap();

        let record = engine
            .create(
                RedisMutation::new("k", CommandKind::Append, Some(json!("tail")), "alice")
                    .approval_threshold(1),
            )
            .unwrap();
        engine.approve(record.id, "reviewer").unwrap();

        let applied = engine.apply(record.id, "alice").unwrap();
        assert_eq!(applied.status, MutationStatus::Failed);
        assert!(applied.apply_error.as_deref().unwrap().contains("zset"));
        assert!(applied.applied_by.is_some());
    }

    #[test]
    fn test_malformed_ledger_payload_fails_terminally() {
        let (_store, ledger, engine) = engine();
        let record = engine
            .create(
                RedisMutation::new("k", CommandKind::Set, Some(json!("v")), "alice")
                    .approval_threshold(1),
            )
            .unwrap();
        engine.approve(record.id, "reviewer").unwrap();

        // Corrupt the payload behind the engine's back (legacy/foreign data)
        let mut corrupted = ledger.get(record.id).unwrap();
        corrupted.value = Some(json!(42));
        ledger.update(&corrupted).unwrap();

        let applied = engine.apply(record.id, "alice").unwrap();
        assert_eq!(applied.status, MutationStatus::Failed);
        assert!(applied
            .apply_error
            .as_deref()
            .unwrap()
            .contains("Unsupported command"));
    }

    #[test]
    fn test_persistence_failure_is_distinguishable() {
        let (_store, ledger, engine) = engine();
        let record = engine
            .create(RedisMutation::new("k", CommandKind::Del, None, "alice"))
            .unwrap();

        ledger.set_fail_updates(true);
        assert!(matches!(
            engine.approve(record.id, "reviewer"),
            Err(GuardError::FailedToSave { .. })
        ));
    }

    #[test]
    fn test_apply_hset_and_zadd_payloads() {
        let (store, _ledger, engine) = engine();

        let hset = engine
            .create(
                RedisMutation::new(
                    "h",
                    CommandKind::Hset,
                    Some(json!({"f1": "a", "f2": "b"})),
                    "alice",
                )
                .approval_threshold(1),
            )
            .unwrap();
        engine.approve(hset.id, "reviewer").unwrap();
        assert_eq!(
            engine.apply(hset.id, "alice").unwrap().status,
            MutationStatus::Completed
        );
        assert_eq!(store.hgetall("h").unwrap().get("f1").unwrap(), "a");

        let zadd = engine
            .create(
                RedisMutation::new("z", CommandKind::Zadd, Some(json!({"m": 1.5})), "alice")
                    .approval_threshold(1),
            )
            .unwrap();
        engine.approve(zadd.id, "reviewer").unwrap();
        assert_eq!(
            engine.apply(zadd.id, "alice").unwrap().status,
            MutationStatus::Completed
        );
        assert_eq!(
            store.zrange_withscores("z", 0, -1).unwrap(),
            vec![("m".to_string(), 1.5)]
        );
    }
}
