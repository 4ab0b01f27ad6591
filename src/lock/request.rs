use super::arbiter::{Event, EventSender};
use super::handle::LockHandle;
use super::timer::Timer;
use crate::error::{LockError, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

pub(crate) type Responder = oneshot::Sender<Result<LockHandle>>;

// Roughly 30 years, the same horizon tokio uses for "never".
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// One caller's attempt to take a key, from submission until it resolves.
pub(crate) struct LockRequest {
    pub id: u64,
    pub key: String,
    pub token: String,
    pub wait_deadline: Instant,
    pub lease: Duration,
    pub granted_at: Option<DateTime<Utc>>,
    responder: Option<Responder>,
    wait_timer: Option<Timer>,
    lease_timer: Option<Timer>,
}

impl LockRequest {
    pub fn new(
        id: u64,
        key: String,
        max_wait: Duration,
        lease: Duration,
        responder: Responder,
    ) -> Self {
        let now = Instant::now();
        let wait_deadline = now
            .checked_add(max_wait)
            .unwrap_or_else(|| now + FAR_FUTURE);

        Self {
            id,
            key,
            token: new_token(id),
            wait_deadline,
            lease,
            granted_at: None,
            responder: Some(responder),
            wait_timer: None,
            lease_timer: None,
        }
    }

    /// Still allowed to be granted at `now`.
    pub fn is_eligible(&self, now: Instant) -> bool {
        self.wait_deadline > now
    }

    pub fn arm_wait_timer(&mut self, events: &EventSender) {
        let event = Event::Expire {
            token: self.token.clone(),
        };
        self.wait_timer = Some(Timer::arm(self.wait_deadline, events, event));
    }

    pub fn cancel_wait_timer(&mut self) {
        if let Some(mut timer) = self.wait_timer.take() {
            timer.cancel();
        }
    }

    pub fn arm_lease_timer(&mut self, events: &EventSender) {
        let event = Event::Release {
            key: self.key.clone(),
            token: self.token.clone(),
            reply: None,
        };
        let deadline = Instant::now() + self.lease;
        self.lease_timer = Some(Timer::arm(deadline, events, event));
    }

    pub fn cancel_lease_timer(&mut self) {
        if let Some(mut timer) = self.lease_timer.take() {
            timer.cancel();
        }
    }

    /// Hand the granted lock to the caller.
    ///
    /// Gives the handle back when the caller is gone or the request was
    /// already resolved.
    pub fn fulfil(&mut self, handle: LockHandle) -> Option<LockHandle> {
        match self.responder.take() {
            Some(responder) => responder.send(Ok(handle)).err().and_then(|unsent| unsent.ok()),
            None => Some(handle),
        }
    }

    pub fn fail(&mut self, err: LockError) {
        if let Some(responder) = self.responder.take() {
            let _ = responder.send(Err(err));
        }
    }

    #[cfg(test)]
    pub fn is_resolved(&self) -> bool {
        self.responder.is_none()
    }
}

fn new_token(id: u64) -> String {
    let salt: u64 = rand::thread_rng().gen();
    format!("{}-{:016x}", id, salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: u64, max_wait: Duration) -> (LockRequest, oneshot::Receiver<Result<LockHandle>>) {
        let (tx, rx) = oneshot::channel();
        let req = LockRequest::new(id, "k".to_string(), max_wait, Duration::from_secs(1), tx);
        (req, rx)
    }

    #[tokio::test]
    async fn test_zero_wait_is_never_eligible() {
        let (req, _rx) = request(1, Duration::ZERO);
        assert!(!req.is_eligible(Instant::now()));
    }

    #[tokio::test]
    async fn test_tokens_embed_id_and_differ() {
        let (a, _ra) = request(7, Duration::ZERO);
        let (b, _rb) = request(7, Duration::ZERO);
        assert!(a.token.starts_with("7-"));
        assert_ne!(a.token, b.token);
    }

    #[tokio::test]
    async fn test_fail_resolves_once() {
        let (mut req, rx) = request(1, Duration::ZERO);
        req.fail(LockError::expired("k"));
        req.fail(LockError::will_not_wait("k"));
        assert!(req.is_resolved());

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.acquire_error(), Some(crate::AcquireError::Expired));
    }

    #[tokio::test]
    async fn test_huge_wait_does_not_overflow() {
        let (req, _rx) = request(1, Duration::MAX);
        assert!(req.is_eligible(Instant::now() + Duration::from_secs(3600)));
    }
}
