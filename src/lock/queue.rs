use super::arbiter::EventSender;
use super::request::LockRequest;
use tokio::time::Instant;
use tracing::debug;

/// Requests waiting for a key, kept in ascending id order across all keys.
///
/// Every entry has its wait-deadline timer armed while it sits here.
pub(crate) struct WaitingQueue {
    entries: Vec<LockRequest>,
    events: EventSender,
}

impl WaitingQueue {
    pub fn new(events: EventSender) -> Self {
        Self {
            entries: Vec::new(),
            events,
        }
    }

    /// Insert in id order and arm the wait-deadline timer.
    pub fn insert(&mut self, mut request: LockRequest) {
        debug!("Queueing lock request #{} for {}", request.id, request.key);
        request.arm_wait_timer(&self.events);

        // New ids almost always go last, so scan from the back.
        let pos = self
            .entries
            .iter()
            .rposition(|queued| queued.id < request.id)
            .map_or(0, |i| i + 1);
        self.entries.insert(pos, request);
    }

    /// Remove the request holding `token`, cancelling its wait timer.
    pub fn remove(&mut self, token: &str) -> Option<LockRequest> {
        let pos = self.entries.iter().position(|r| r.token == token)?;
        let mut request = self.entries.remove(pos);
        request.cancel_wait_timer();
        debug!(
            "Removed lock request #{} from queue ({} left)",
            request.id,
            self.entries.len()
        );
        Some(request)
    }

    /// Lowest-id request for `key` whose wait deadline is still ahead.
    ///
    /// Stale entries are skipped here; their expiry event removes them.
    pub fn first_eligible(&self, key: &str, now: Instant) -> Option<&LockRequest> {
        self.entries
            .iter()
            .find(|r| r.key == key && r.is_eligible(now))
    }

    pub fn has_eligible(&self, key: &str, now: Instant) -> bool {
        self.first_eligible(key, now).is_some()
    }

    /// Queued ids for `key`, in queue order.
    pub fn ids_for(&self, key: &str) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|r| r.key == key)
            .map(|r| r.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop every entry without resolving it; dropping cancels the timers.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::super::arbiter::Event;
    use super::*;
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};

    fn request(id: u64, key: &str, max_wait: Duration) -> LockRequest {
        let (tx, _rx) = oneshot::channel();
        LockRequest::new(id, key.to_string(), max_wait, Duration::from_secs(10), tx)
    }

    fn queue() -> (WaitingQueue, mpsc::UnboundedSender<Event>) {
        let (tx, _rx) = mpsc::unbounded_channel();
        (WaitingQueue::new(tx.downgrade()), tx)
    }

    #[tokio::test]
    async fn test_insert_keeps_id_order() {
        let (mut q, _tx) = queue();
        let wait = Duration::from_secs(5);
        q.insert(request(3, "a", wait));
        q.insert(request(1, "a", wait));
        q.insert(request(2, "b", wait));
        q.insert(request(5, "a", wait));
        q.insert(request(4, "b", wait));

        assert_eq!(q.ids_for("a"), vec![1, 3, 5]);
        assert_eq!(q.ids_for("b"), vec![2, 4]);
        assert_eq!(q.len(), 5);
    }

    #[tokio::test]
    async fn test_first_eligible_skips_other_keys_and_expired() {
        let (mut q, _tx) = queue();
        q.insert(request(1, "a", Duration::from_millis(10)));
        q.insert(request(2, "b", Duration::from_secs(5)));
        q.insert(request(3, "a", Duration::from_secs(5)));

        let later = Instant::now() + Duration::from_millis(50);
        assert_eq!(q.first_eligible("a", later).map(|r| r.id), Some(3));
        assert_eq!(q.first_eligible("b", later).map(|r| r.id), Some(2));
        assert!(!q.has_eligible("c", later));

        // Skipped, not removed.
        assert_eq!(q.ids_for("a"), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (mut q, _tx) = queue();
        let req = request(1, "a", Duration::from_secs(5));
        let token = req.token.clone();
        q.insert(req);

        assert!(q.remove(&token).is_some());
        assert!(q.remove(&token).is_none());
        assert_eq!(q.len(), 0);
    }
}
