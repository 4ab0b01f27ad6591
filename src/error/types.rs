use thiserror::Error;

/// Why the arbiter refused to hand out a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("will not wait")]
    WillNotWait,

    #[error("expired")]
    Expired,
}

impl AcquireError {
    pub fn reason(&self) -> &'static str {
        match self {
            AcquireError::WillNotWait => "will not wait",
            AcquireError::Expired => "expired",
        }
    }
}

/// Failures reported by a [`LockStore`](crate::store::LockStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Lock store failure: {0}")]
    Backend(String),

    #[cfg(feature = "redis")]
    #[error("Redis failure: {0}")]
    Redis(#[from] redis::RedisError),
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Failed to acquire lock on {key}: {reason}")]
    Acquire { key: String, reason: AcquireError },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid lease for {key}: lease must be longer than zero")]
    InvalidLease { key: String },

    #[error("Lock arbiter is no longer running")]
    ArbiterClosed,

    #[error("Lock request was dropped before it resolved")]
    Cancelled,

    #[error("Invalid duration format '{input}': {message}")]
    InvalidDuration { input: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl LockError {
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Acquire { .. } => 2,
            LockError::Cancelled => 3,
            _ => 1,
        }
    }

    pub fn will_not_wait(key: impl Into<String>) -> Self {
        LockError::Acquire {
            key: key.into(),
            reason: AcquireError::WillNotWait,
        }
    }

    pub fn expired(key: impl Into<String>) -> Self {
        LockError::Acquire {
            key: key.into(),
            reason: AcquireError::Expired,
        }
    }

    /// The acquisition failure reason, if this error is one.
    pub fn acquire_error(&self) -> Option<AcquireError> {
        match self {
            LockError::Acquire { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn is_acquire_error(&self) -> bool {
        self.acquire_error().is_some()
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
