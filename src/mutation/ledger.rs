use crate::mutation::record::RedisMutation;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the durable record store backing mutation state.
///
/// "Record doesn't exist" is distinguishable from backend failures so the
/// engine can map them to different caller-visible errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("mutation record {0} not found")]
    NotFound(Uuid),

    #[error("ledger backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Durable create/read/update of mutation records.
///
/// The production system persists these in its relational database; the
/// engine only needs this narrow contract.
pub trait MutationLedger: Send + Sync {
    fn create(&self, record: &RedisMutation) -> Result<(), LedgerError>;

    fn get(&self, id: Uuid) -> Result<RedisMutation, LedgerError>;

    fn update(&self, record: &RedisMutation) -> Result<(), LedgerError>;
}

/// In-memory ledger for embedding and tests.
pub struct InMemoryLedger {
    records: RwLock<HashMap<Uuid, RedisMutation>>,
    fail_updates: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            fail_updates: AtomicBool::new(false),
        }
    }

    /// Make subsequent update() calls fail, for exercising the
    /// persistence-failure path.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationLedger for InMemoryLedger {
    fn create(&self, record: &RedisMutation) -> Result<(), LedgerError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow::anyhow!("ledger lock poisoned: {e}"))?;
        if records.contains_key(&record.id) {
            return Err(LedgerError::Backend(anyhow::anyhow!(
                "duplicate mutation record {}",
                record.id
            )));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<RedisMutation, LedgerError> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow::anyhow!("ledger lock poisoned: {e}"))?;
        records.get(&id).cloned().ok_or(LedgerError::NotFound(id))
    }

    fn update(&self, record: &RedisMutation) -> Result<(), LedgerError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(LedgerError::Backend(anyhow::anyhow!(
                "injected ledger write failure"
            )));
        }

        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow::anyhow!("ledger lock poisoned: {e}"))?;
        if !records.contains_key(&record.id) {
            return Err(LedgerError::NotFound(record.id));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }
}
