use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::engine::types::DiffEvent;

/// FIFO queue between the stream task (producer) and the reconciler
/// (consumer). This is the only shared mutable state crossing that boundary.
///
/// A plain lock-guarded `VecDeque` with a [`Notify`] for wake-on-push: the
/// reconciler parks on [`notified`] when the queue is empty instead of
/// spinning. Events come out in the exact order the stream produced them.
///
/// [`notified`]: EventBuffer::notified
#[derive(Debug, Default)]
pub struct EventBuffer {
    queue: Mutex<VecDeque<DiffEvent>>,
    notify: Notify,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, event: DiffEvent) {
        trace!(
            first_update_id = event.first_update_id,
            final_update_id = event.final_update_id,
            "Buffered diff event"
        );
        self.queue.lock().push_back(event);
        self.notify.notify_one();
    }

    /// Remove and return the earliest pending event, or `None` when empty.
    pub fn pop_oldest(&self) -> Option<DiffEvent> {
        self.queue.lock().pop_front()
    }

    /// Drop every buffered event whose `final_update_id <= baseline`. These
    /// predate the snapshot and carry no new information; returns how many
    /// were dropped.
    pub fn discard_stale(&self, baseline: u64) -> usize {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|e| e.final_update_id > baseline);
        let dropped = before - queue.len();
        if dropped > 0 {
            debug!(baseline, dropped, "Discarded stale buffered events");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Resolves after the next `push`. A permit is stored if the push won the
    /// race, so a wakeup cannot be lost between an empty `pop_oldest` and
    /// this call.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}
