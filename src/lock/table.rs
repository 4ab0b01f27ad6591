use super::request::LockRequest;
use std::collections::HashMap;

/// Which request currently holds each key's remote lock.
#[derive(Default)]
pub(crate) struct LockTable {
    held: HashMap<String, LockRequest>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains_key(key)
    }

    pub fn holder(&self, key: &str) -> Option<&LockRequest> {
        self.held.get(key)
    }

    pub fn set(&mut self, request: LockRequest) {
        self.held.insert(request.key.clone(), request);
    }

    /// Remove the holder of `key`. The caller cancels its lease timer.
    pub fn clear(&mut self, key: &str) -> Option<LockRequest> {
        self.held.remove(key)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn clear_all(&mut self) {
        self.held.clear();
    }
}
