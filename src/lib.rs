//! Fair, deadline-aware lock arbitration in front of a remote key-value mutex

pub mod config;
pub mod error;
pub mod lock;
pub mod store;
pub mod utils;

pub use config::LockConfig;
pub use error::{AcquireError, LockError, Result, StoreError};
pub use lock::{KeyState, LockArbiter, LockHandle};
pub use store::{LockStore, MemoryStore};
#[cfg(feature = "redis")]
pub use store::RedisStore;
