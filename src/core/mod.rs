pub mod error;
pub mod types;

pub use error::{GuardError, Result};
pub use types::{KeyType, QuotaResource};
