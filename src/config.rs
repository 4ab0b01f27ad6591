use std::time::Duration;

/// Lease used when the caller does not pass one.
pub const DEFAULT_LEASE: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long a granted lock is held before the store expires it.
    pub default_lease: Duration,
    /// How long `acquire` waits when the caller does not say.
    pub default_max_wait: Duration,
    /// Prepended to every key sent to the store.
    pub key_prefix: String,
}

impl LockConfig {
    pub fn new() -> Self {
        Self {
            default_lease: DEFAULT_LEASE,
            default_max_wait: Duration::ZERO,
            key_prefix: String::new(),
        }
    }

    pub fn with_default_lease(mut self, lease: Duration) -> Self {
        self.default_lease = lease;
        self
    }

    pub fn with_default_max_wait(mut self, max_wait: Duration) -> Self {
        self.default_max_wait = max_wait;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// The key as the remote store sees it.
    pub fn store_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::new()
    }
}
