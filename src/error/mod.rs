mod types;

pub use types::{AcquireError, LockError, Result, StoreError};

// Re-export for convenience
pub use LockError as Error;
