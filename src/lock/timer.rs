use super::arbiter::{Event, EventSender};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// A one-shot timer that posts an event to the arbiter when it fires.
///
/// Dropping the timer cancels it. A timer whose event was already queued
/// when it got cancelled still delivers; the arbiter treats such late
/// events as no-ops.
#[derive(Debug)]
pub(crate) struct Timer {
    task: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn arm(deadline: Instant, events: &EventSender, event: Event) -> Self {
        let Some(tx) = events.upgrade() else {
            // Arbiter is shutting down; nobody would receive the event.
            return Self { task: None };
        };

        let task = tokio::spawn(async move {
            time::sleep_until(deadline).await;
            let _ = tx.send(event);
        });

        Self { task: Some(task) }
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}
