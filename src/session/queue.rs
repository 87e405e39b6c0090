use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::RelayError;

use super::events::TranscriptionEvent;

/// Ordered handoff of transcription events between execution contexts.
///
/// The producer side is the recognition engine's own callback task, which must
/// never be suspended on this session's scheduler: `push` takes a plain lock
/// and returns. The consumer side is the session's send loop, which awaits
/// `next` and delivers events in exactly the order they were enqueued.
pub struct TranscriptQueue {
    inner: Mutex<Inner>,
    /// Wakes the consumer on push and on close
    added: Notify,
    /// Wakes drain waiters when the queue transitions to empty
    emptied: Notify,
}

struct Inner {
    events: VecDeque<TranscriptionEvent>,
    closed: bool,
}

impl TranscriptQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::new(),
                closed: false,
            }),
            added: Notify::new(),
            emptied: Notify::new(),
        }
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("transcript queue lock poisoned")
    }

    /// Append an event to the tail. Callable from any thread; never blocks
    /// beyond the internal lock.
    ///
    /// Fails with `QueueClosed` once `close` has been called; the producer is
    /// expected to log and carry on.
    pub fn push(&self, event: TranscriptionEvent) -> Result<(), RelayError> {
        {
            let mut inner = self.locked();
            if inner.closed {
                return Err(RelayError::QueueClosed);
            }
            inner.events.push_back(event);
        }
        self.added.notify_one();
        Ok(())
    }

    /// Remove and return the head, if present. Non-blocking.
    pub fn pop(&self) -> Option<TranscriptionEvent> {
        let mut inner = self.locked();
        let event = inner.events.pop_front();
        if event.is_some() && inner.events.is_empty() {
            self.emptied.notify_waiters();
        }
        event
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the queue has been closed and every remaining
    /// event has been consumed — the drain-complete condition.
    pub async fn next(&self) -> Option<TranscriptionEvent> {
        loop {
            let added = self.added.notified();
            {
                let mut inner = self.locked();
                if let Some(event) = inner.events.pop_front() {
                    if inner.events.is_empty() {
                        self.emptied.notify_waiters();
                    }
                    return Some(event);
                }
                if inner.closed {
                    return None;
                }
            }
            added.await;
        }
    }

    /// Block until the queue is empty, up to `timeout`.
    ///
    /// Returns true if everything was consumed in time. Events are never
    /// discarded here; a false return means the consumer is still behind.
    pub async fn drain_and_wait(&self, timeout: Duration) -> bool {
        let drained = async {
            loop {
                let emptied = self.emptied.notified();
                if self.locked().events.is_empty() {
                    return;
                }
                emptied.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }

    /// Mark the queue closed. Later pushes fail with `QueueClosed`; events
    /// already queued remain available to the consumer.
    pub fn close(&self) {
        self.locked().closed = true;
        self.added.notify_one();
        self.emptied.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.locked().closed
    }

    /// Number of events currently waiting for delivery
    pub fn len(&self) -> usize {
        self.locked().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().events.is_empty()
    }
}

impl Default for TranscriptQueue {
    fn default() -> Self {
        Self::new()
    }
}
