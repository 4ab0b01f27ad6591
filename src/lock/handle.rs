use super::arbiter::Event;
use super::request::LockRequest;
use crate::error::{LockError, Result};
use crate::store::LockStore;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// A granted lock.
///
/// The lock is held until [`release`](Self::release) is called or the
/// lease runs out, whichever comes first. Dropping the handle does not
/// release it.
#[must_use = "the lock stays held until released or its lease expires"]
pub struct LockHandle {
    id: u64,
    key: String,
    store_key: String,
    token: String,
    lease: Duration,
    granted_at: DateTime<Utc>,
    store: Arc<dyn LockStore>,
    events: mpsc::UnboundedSender<Event>,
}

impl LockHandle {
    pub(crate) fn new(
        request: &LockRequest,
        granted_at: DateTime<Utc>,
        store_key: String,
        store: Arc<dyn LockStore>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            id: request.id,
            key: request.key.clone(),
            store_key,
            token: request.token.clone(),
            lease: request.lease,
            granted_at,
            store,
            events,
        }
    }

    /// Sequence id of the request this lock was granted to.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Ownership proof presented to the store.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }

    /// Delete the remote key if this handle still owns it, then let the
    /// next waiter in.
    ///
    /// Safe to call more than once and after the lease has expired: the
    /// store only deletes on a token match, and the arbiter ignores a
    /// release for a key someone else now holds.
    pub async fn release(&self) -> Result<()> {
        let deleted = self
            .store
            .compare_delete(&self.store_key, &self.token)
            .await?;

        if deleted {
            debug!("Lock released: {} (#{})", self.key, self.id);
        } else {
            debug!(
                "Lock {} (#{}) no longer owned remotely, releasing locally",
                self.key, self.id
            );
        }

        let (reply, done) = oneshot::channel();
        self.events
            .send(Event::Release {
                key: self.key.clone(),
                token: self.token.clone(),
                reply: Some(reply),
            })
            .map_err(|_| LockError::ArbiterClosed)?;

        done.await.map_err(|_| LockError::Cancelled)??;
        Ok(())
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("token", &self.token)
            .field("lease", &self.lease)
            .field("granted_at", &self.granted_at)
            .finish()
    }
}
