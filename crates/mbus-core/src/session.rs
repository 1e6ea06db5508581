//! Source session: the caller-facing side of the bus.
//!
//! The session stamps every message with a deadline, tracks it until its
//! single reply has been handed to the caller, and enforces the end-to-end
//! timeout. When the timeout fires while the message waits for a resend, the
//! message is pulled off the queue and answered with `TIMEOUT`; when it fires
//! while the message is in flight, a detached `TIMEOUT` reply is delivered
//! and the late reply is discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::error_code::{self, Error};
use crate::message::{Message, MessageId, Reply};
use crate::resender::{Resender, ResenderOptions};
use crate::retry::RetryPolicy;
use crate::transport::{ReplyHandler, Transport};

/// Session parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// End-to-end timeout of a send, resends included.
    pub timeout: Duration,
    pub resender: ResenderOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            resender: ResenderOptions::default(),
        }
    }
}

/// Sends that are still waiting for their reply, with their timeout tasks.
struct Pending {
    /// `None` when the timeout is too large to schedule.
    timers: Mutex<HashMap<MessageId, Option<AbortHandle>>>,
    handler: Arc<dyn ReplyHandler>,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, HashMap<MessageId, Option<AbortHandle>>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop tracking `id`; true if it was still pending.
    fn take(&self, id: MessageId) -> bool {
        match self.lock().remove(&id) {
            Some(timer) => {
                if let Some(timer) = timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }
}

impl ReplyHandler for Pending {
    fn handle_reply(&self, reply: Reply) {
        if self.take(reply.id()) {
            self.handler.handle_reply(reply);
        } else {
            tracing::debug!(id = %reply.id(), "discarding reply for send that already completed");
        }
    }
}

/// Caller-facing session. Every accepted send yields exactly one reply on
/// the handler passed to [`SourceSession::new`].
pub struct SourceSession {
    resender: Resender,
    pending: Arc<Pending>,
    timeout: Duration,
}

impl SourceSession {
    /// Create a session and start its resender worker. Must be called from
    /// within a tokio runtime.
    pub fn new(
        transport: Arc<dyn Transport>,
        policy: Arc<dyn RetryPolicy>,
        options: SessionOptions,
        handler: Arc<dyn ReplyHandler>,
    ) -> Self {
        let pending = Arc::new(Pending {
            timers: Mutex::new(HashMap::new()),
            handler,
        });
        let upstream: Arc<dyn ReplyHandler> = pending.clone();
        let resender = Resender::new(policy, transport, upstream, options.resender);
        resender.start();
        Self {
            resender,
            pending,
            timeout: options.timeout,
        }
    }

    /// Send a message. Its reply (or a synthesized `TIMEOUT`) arrives on the
    /// session's handler.
    pub fn send(&self, mut message: Message) -> MessageId {
        let id = message.id();
        let deadline = Instant::now().checked_add(self.timeout);
        message.set_deadline(deadline);

        {
            // Hold the lock across the spawn so the timer cannot fire before
            // the send is registered.
            let mut timers = self.pending.lock();
            let timer = deadline.map(|deadline| {
                let resender = self.resender.clone();
                let pending = Arc::clone(&self.pending);
                tokio::spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    expire(&pending, &resender, id);
                })
                .abort_handle()
            });
            timers.insert(id, timer);
        }

        tracing::debug!(%id, timeout = ?self.timeout, "sending message");
        self.resender.send(message);
        id
    }

    /// Number of sends still waiting for their reply.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of messages waiting for a resend.
    pub fn queued(&self) -> usize {
        self.resender.queued()
    }

    /// Stop resending. Messages waiting for a resend are answered with
    /// `SEND_ABORTED`; messages in flight still get their reply or timeout.
    pub fn close(&self) {
        self.resender.shutdown();
    }
}

impl Drop for SourceSession {
    fn drop(&mut self) {
        self.resender.shutdown();
        for timer in self.pending.lock().drain().filter_map(|(_, t)| t) {
            timer.abort();
        }
    }
}

fn expire(pending: &Pending, resender: &Resender, id: MessageId) {
    if !pending.take(id) {
        return;
    }
    let reply = match resender.cancel(id) {
        Some(message) => {
            let retry = message.retry();
            let mut reply = Reply::new(message);
            reply.add_error(Error::new(
                error_code::TIMEOUT,
                format!("send timed out while waiting for retry {}", retry.saturating_add(1)),
            ));
            reply
        }
        None => {
            let mut reply = Reply::detached(id);
            reply.add_error(Error::new(
                error_code::TIMEOUT,
                "send timed out while message was in flight",
            ));
            reply
        }
    };
    tracing::warn!(%id, "send timed out");
    pending.handler.handle_reply(reply);
}
