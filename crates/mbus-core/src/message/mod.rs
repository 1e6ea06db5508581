//! Messages and replies exchanged over the bus.
//!
//! A `Message` is owned by exactly one party at a time: the caller, the
//! transport while in flight, or the resender's delay queue while waiting.
//! A `Reply` takes ownership of its message, so the message (with its retry
//! counter and trace) travels back with the reply.

mod reply;
mod trace;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::time::Instant;

pub use reply::Reply;
pub use trace::{format_seconds, retry_line, Trace};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MessageId(u64);

impl MessageId {
    fn next() -> Self {
        MessageId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message sent through the bus. The payload is opaque to the resender.
#[derive(Debug, Clone)]
pub struct Message {
    id: MessageId,
    payload: Vec<u8>,
    retry: u32,
    retry_enabled: bool,
    trace: Trace,
    deadline: Option<Instant>,
}

impl Message {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: MessageId::next(),
            payload: payload.into(),
            retry: 0,
            retry_enabled: true,
            trace: Trace::new(),
            deadline: None,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of times this message has been resent.
    pub fn retry(&self) -> u32 {
        self.retry
    }

    pub(crate) fn increment_retry(&mut self) {
        self.retry = self.retry.saturating_add(1);
    }

    pub fn retry_enabled(&self) -> bool {
        self.retry_enabled
    }

    /// When false, the resender surfaces any error reply verbatim.
    pub fn set_retry_enabled(&mut self, enabled: bool) {
        self.retry_enabled = enabled;
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut Trace {
        &mut self.trace
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// True when a deadline is set and has passed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| d <= now)
    }
}
