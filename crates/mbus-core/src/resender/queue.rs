//! Delay queue: a min-heap of messages keyed on monotonic due time.
//!
//! Many producers schedule, one consumer awaits. A schedule that becomes the
//! new earliest entry wakes the consumer so it can shorten its sleep.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::message::{Message, MessageId};

/// Stand-in due time for delays past what the clock can represent.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + delay`, saturating to a due time that never comes in practice.
pub(crate) fn due_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Why the queue refused an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("delay queue is closed")]
    Closed,
    #[error("delay queue is full ({capacity} entries)")]
    Full { capacity: usize },
}

/// A message the queue refused to schedule, handed back to the caller.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Rejected {
    pub kind: QueueError,
    pub message: Message,
}

struct Entry {
    due: Instant,
    seq: u64,
    message: Message,
}

// Reversed so that BinaryHeap (a max-heap) pops the earliest due time first,
// and the lowest sequence number among equal due times.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

#[derive(Default)]
struct State {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
    closed: bool,
}

/// Priority queue of messages waiting to be resent.
pub struct DelayQueue {
    state: Mutex<State>,
    notify: Notify,
    capacity: Option<usize>,
}

impl Default for DelayQueue {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DelayQueue {
    /// Create a queue; `capacity` bounds the number of waiting entries.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule `message` to become due after `delay`. A zero delay makes it
    /// due immediately; a delay too large for the clock is never due.
    pub fn schedule(&self, message: Message, delay: Duration) -> Result<(), Rejected> {
        self.schedule_at(message, due_after(Instant::now(), delay))
    }

    /// Schedule `message` to become due at `due`.
    pub fn schedule_at(&self, message: Message, due: Instant) -> Result<(), Rejected> {
        let mut state = self.lock();
        if state.closed {
            return Err(Rejected {
                kind: QueueError::Closed,
                message,
            });
        }
        if let Some(capacity) = self.capacity {
            if state.heap.len() >= capacity {
                return Err(Rejected {
                    kind: QueueError::Full { capacity },
                    message,
                });
            }
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Entry { due, seq, message });
        let is_earliest = state.heap.peek().is_some_and(|e| e.seq == seq);
        drop(state);
        if is_earliest {
            self.notify.notify_one();
        }
        Ok(())
    }

    /// Wait until the earliest entry is due, then remove and return it.
    pub async fn await_due(&self) -> Result<Message, QueueError> {
        loop {
            let head_due = {
                let mut state = self.lock();
                if state.closed {
                    return Err(QueueError::Closed);
                }
                match state.heap.peek().map(|e| e.due) {
                    Some(due) if due <= Instant::now() => {
                        if let Some(entry) = state.heap.pop() {
                            return Ok(entry.message);
                        }
                        None
                    }
                    other => other,
                }
            };
            match head_due {
                Some(due) => {
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep_until(due) => {}
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    /// Remove a waiting message by id. Returns it if it was still queued.
    pub fn remove(&self, id: MessageId) -> Option<Message> {
        let mut state = self.lock();
        let mut entries = std::mem::take(&mut state.heap).into_vec();
        let removed = entries
            .iter()
            .position(|e| e.message.id() == id)
            .map(|i| entries.swap_remove(i).message);
        state.heap = BinaryHeap::from(entries);
        drop(state);
        if removed.is_some() {
            // Head may have changed; let the consumer recompute its sleep.
            self.notify.notify_one();
        }
        removed
    }

    /// Close the queue, wake every waiter and return the entries that were
    /// still waiting, earliest first.
    pub fn close(&self) -> Vec<Message> {
        let mut state = self.lock();
        state.closed = true;
        let drained: Vec<Message> = std::iter::from_fn(|| state.heap.pop())
            .map(|e| e.message)
            .collect();
        drop(state);
        self.notify.notify_waiters();
        self.notify.notify_one();
        drained
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
