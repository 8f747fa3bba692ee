use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    #[error("Mutation {0} is inactive and cannot be changed")]
    InactiveMutation(String),

    #[error("Mutation {0} has not reached its approval threshold")]
    MissingApproval(String),

    #[error("Mutation record {0} not found")]
    MutationNotFound(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Failed to save mutation record: {source}")]
    FailedToSave {
        #[source]
        source: anyhow::Error,
    },

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Timed out acquiring lock '{0}'")]
    LockTimeout(String),

    #[error("Store error: {0}")]
    StoreError(String),
}

pub type Result<T> = std::result::Result<T, GuardError>;

impl<T> From<std::sync::PoisonError<T>> for GuardError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
