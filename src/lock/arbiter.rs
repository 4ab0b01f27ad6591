//! Local arbitration in front of the remote lock.
//!
//! A single task owns the sequencer, the waiting queue and the lock table.
//! Callers, timers and lock handles talk to it through one channel, and
//! every event (store call included) is handled to completion before the
//! next one is read. That serialization is the only synchronization the
//! local structures get, and it is also what keeps two acquisition
//! attempts for the same key from being in flight at once.
//!
//! For a given key, waiters are granted strictly in sequence-id order. A
//! newcomer never races the store while an earlier, still-eligible waiter
//! is queued for the same key.

use super::handle::LockHandle;
use super::queue::WaitingQueue;
use super::request::{LockRequest, Responder};
use super::sequencer::Sequencer;
use super::table::LockTable;
use crate::config::LockConfig;
use crate::error::{LockError, Result, StoreError};
use crate::store::LockStore;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

/// The arbiter keeps only a weak sender to itself so it stops once every
/// front handle, lock handle and armed timer is gone.
pub(crate) type EventSender = mpsc::WeakUnboundedSender<Event>;

type ReleaseReply = oneshot::Sender<std::result::Result<(), StoreError>>;

pub(crate) enum Event {
    Submit {
        key: String,
        max_wait: Duration,
        lease: Duration,
        reply: Responder,
    },
    /// A queued request's wait deadline passed.
    Expire { token: String },
    /// Explicit release (with a reply) or lease expiry (without one).
    Release {
        key: String,
        token: String,
        reply: Option<ReleaseReply>,
    },
    Clear { reply: oneshot::Sender<()> },
    Inspect {
        key: String,
        reply: oneshot::Sender<KeyState>,
    },
}

/// Snapshot of the arbiter's view of one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyState {
    /// Id of the request holding the key, if any.
    pub holder: Option<u64>,
    /// Ids of queued requests for the key, in grant order. May include
    /// requests whose deadline passed but whose expiry is still pending.
    pub waiting: Vec<u64>,
}

impl KeyState {
    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }
}

/// Front handle to a running arbiter. Cheap to clone; all clones share
/// the same queue and table.
///
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct LockArbiter {
    events: mpsc::UnboundedSender<Event>,
    config: Arc<LockConfig>,
}

impl LockArbiter {
    pub fn new(store: Arc<dyn LockStore>, config: LockConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = Arc::new(config);
        let state = ArbiterState::new(store, Arc::clone(&config), tx.downgrade());
        tokio::spawn(state.run(rx));

        Self { events: tx, config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire `key` using the configured default wait and lease.
    pub fn lock(
        &self,
        key: impl Into<String>,
    ) -> impl Future<Output = Result<LockHandle>> + Send + 'static {
        self.acquire(key, self.config.default_max_wait)
    }

    /// Acquire `key` without waiting behind anyone.
    pub fn try_acquire(
        &self,
        key: impl Into<String>,
    ) -> impl Future<Output = Result<LockHandle>> + Send + 'static {
        self.acquire(key, Duration::ZERO)
    }

    /// Acquire `key`, waiting up to `max_wait`, with the default lease.
    pub fn acquire(
        &self,
        key: impl Into<String>,
        max_wait: Duration,
    ) -> impl Future<Output = Result<LockHandle>> + Send + 'static {
        self.acquire_with_lease(key, max_wait, self.config.default_lease)
    }

    /// Acquire `key`, waiting up to `max_wait`; once granted the store
    /// drops the lock after `lease` unless it is released first.
    ///
    /// The request is submitted when this is called, not when the future
    /// is first polled, so call order is queue order.
    pub fn acquire_with_lease(
        &self,
        key: impl Into<String>,
        max_wait: Duration,
        lease: Duration,
    ) -> impl Future<Output = Result<LockHandle>> + Send + 'static {
        let key = key.into();
        let (reply, outcome) = oneshot::channel();

        let submitted = if lease.is_zero() {
            Err(LockError::InvalidLease { key })
        } else {
            self.events
                .send(Event::Submit {
                    key,
                    max_wait,
                    lease,
                    reply,
                })
                .map_err(|_| LockError::ArbiterClosed)
        };

        async move {
            submitted?;
            outcome.await.map_err(|_| LockError::Cancelled)?
        }
    }

    /// Forget every queued and held request and restart ids from 1.
    ///
    /// Pending callers are not resolved; their futures fail with
    /// [`LockError::Cancelled`]. Nothing is removed from the store.
    /// Meant for test isolation, not for use under load.
    pub async fn clear(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.events
            .send(Event::Clear { reply })
            .map_err(|_| LockError::ArbiterClosed)?;
        done.await.map_err(|_| LockError::Cancelled)
    }

    pub async fn inspect(&self, key: &str) -> Result<KeyState> {
        let (reply, state) = oneshot::channel();
        self.events
            .send(Event::Inspect {
                key: key.to_string(),
                reply,
            })
            .map_err(|_| LockError::ArbiterClosed)?;
        state.await.map_err(|_| LockError::Cancelled)
    }
}

struct ArbiterState {
    store: Arc<dyn LockStore>,
    config: Arc<LockConfig>,
    events: EventSender,
    sequencer: Sequencer,
    queue: WaitingQueue,
    table: LockTable,
}

impl ArbiterState {
    fn new(store: Arc<dyn LockStore>, config: Arc<LockConfig>, events: EventSender) -> Self {
        Self {
            store,
            config,
            queue: WaitingQueue::new(events.clone()),
            events,
            sequencer: Sequencer::new(),
            table: LockTable::new(),
        }
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        debug!("Lock arbiter started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("Lock arbiter stopped");
    }

    async fn handle(&mut self, event: Event) {
        match event {
            Event::Submit {
                key,
                max_wait,
                lease,
                reply,
            } => self.submit(key, max_wait, lease, reply).await,
            Event::Expire { token } => self.expire(&token),
            Event::Release { key, token, reply } => {
                let outcome = self.release(&key, &token).await;
                match reply {
                    Some(reply) => {
                        let _ = reply.send(outcome);
                    }
                    None => {
                        if let Err(e) = outcome {
                            warn!("Failed to hand {} to the next waiter after lease expiry: {}", key, e);
                        }
                    }
                }
            }
            Event::Clear { reply } => {
                self.clear();
                let _ = reply.send(());
            }
            Event::Inspect { key, reply } => {
                let _ = reply.send(self.inspect(&key));
            }
        }
    }

    async fn submit(&mut self, key: String, max_wait: Duration, lease: Duration, reply: Responder) {
        let mut request = LockRequest::new(self.sequencer.next(), key, max_wait, lease, reply);
        debug!(
            "Lock request #{} for {} (max wait {:?}, lease {:?})",
            request.id, request.key, max_wait, lease
        );

        // Someone holding the key, or an earlier waiter still in line,
        // means this request goes to the back of the queue.
        let free = !self.table.is_held(&request.key)
            && !self.queue.has_eligible(&request.key, Instant::now());

        if free {
            match self.attempt(&request.key, &request.token, request.lease).await {
                Ok(true) => {
                    self.grant(request);
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Lock store failed for {} (#{}): {}", request.key, request.id, e);
                    request.fail(e.into());
                    return;
                }
            }
        } else {
            debug!("{} is busy, request #{} has to wait", request.key, request.id);
        }

        if !request.is_eligible(Instant::now()) {
            debug!("Lock request #{} for {} will not wait", request.id, request.key);
            let err = LockError::will_not_wait(request.key.clone());
            request.fail(err);
            return;
        }

        self.queue.insert(request);
    }

    /// One conditional set against the store. Leaves local state alone.
    async fn attempt(
        &self,
        key: &str,
        token: &str,
        lease: Duration,
    ) -> std::result::Result<bool, StoreError> {
        let store_key = self.config.store_key(key);
        let acquired = self.store.conditional_set(&store_key, token, lease).await?;
        if acquired {
            debug!("Acquired {} in store", store_key);
        } else {
            debug!("{} is taken in store", store_key);
        }
        Ok(acquired)
    }

    /// Record ownership of a request whose conditional set just succeeded.
    fn grant(&mut self, mut request: LockRequest) {
        request.cancel_wait_timer();

        let Some(events) = self.events.upgrade() else {
            warn!(
                "Arbiter shutting down, dropping grant of {} (#{})",
                request.key, request.id
            );
            request.fail(LockError::ArbiterClosed);
            return;
        };

        let granted_at = Utc::now();
        request.granted_at = Some(granted_at);
        request.arm_lease_timer(&self.events);

        let handle = LockHandle::new(
            &request,
            granted_at,
            self.config.store_key(&request.key),
            Arc::clone(&self.store),
            events,
        );
        debug!("Lock granted: {} (#{})", request.key, request.id);

        if let Some(orphan) = request.fulfil(handle) {
            warn!(
                "Lock {} (#{}) granted after its caller went away, releasing",
                request.key, request.id
            );
            tokio::spawn(async move {
                if let Err(e) = orphan.release().await {
                    warn!("Failed to release abandoned lock {}: {}", orphan.key(), e);
                }
            });
        }

        self.table.set(request);
    }

    fn expire(&mut self, token: &str) {
        match self.queue.remove(token) {
            Some(mut request) => {
                debug!("Lock request #{} for {} expired", request.id, request.key);
                let err = LockError::expired(request.key.clone());
                request.fail(err);
            }
            None => debug!("Expiry for a request that already left the queue, ignoring"),
        }
    }

    async fn release(&mut self, key: &str, token: &str) -> std::result::Result<(), StoreError> {
        let holder = self
            .table
            .holder(key)
            .map(|holder| (holder.id, holder.token == token));

        match holder {
            Some((_, true)) => {
                if let Some(mut released) = self.table.clear(key) {
                    released.cancel_lease_timer();
                    let held_ms = released
                        .granted_at
                        .map(|at| (Utc::now() - at).num_milliseconds())
                        .unwrap_or_default();
                    debug!(
                        "Lock {} (#{}) no longer held after {}ms",
                        key, released.id, held_ms
                    );
                }
            }
            Some((id, false)) => {
                debug!("Stale release for {}, now held by #{}, ignoring", key, id);
                return Ok(());
            }
            None => {}
        }

        self.promote(key).await
    }

    /// Try to give `key` to its first eligible waiter. On refusal or error
    /// the waiter stays queued until the next release of `key`.
    async fn promote(&mut self, key: &str) -> std::result::Result<(), StoreError> {
        let next = self
            .queue
            .first_eligible(key, Instant::now())
            .map(|r| (r.id, r.token.clone(), r.lease));

        let Some((id, token, lease)) = next else {
            debug!("Nobody waiting for {}", key);
            return Ok(());
        };

        debug!("Handing {} to waiting request #{}", key, id);
        if self.attempt(key, &token, lease).await? {
            if let Some(request) = self.queue.remove(&token) {
                self.grant(request);
            }
        } else {
            debug!("Request #{} could not take {} in store, stays queued", id, key);
        }
        Ok(())
    }

    fn clear(&mut self) {
        debug!(
            "Clearing arbiter: {} queued, {} held",
            self.queue.len(),
            self.table.len()
        );
        self.queue.clear();
        self.table.clear_all();
        self.sequencer.reset();
    }

    fn inspect(&self, key: &str) -> KeyState {
        KeyState {
            holder: self.table.holder(key).map(|r| r.id),
            waiting: self.queue.ids_for(key),
        }
    }
}
