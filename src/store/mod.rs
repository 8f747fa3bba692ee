pub mod engine;
pub mod lock;
pub mod memory;
pub mod value;

pub use engine::StoreClient;
pub use lock::LockGuard;
pub use memory::MemoryStore;
pub use value::StoreValue;
