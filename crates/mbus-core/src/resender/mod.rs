//! Resender: retries messages whose replies carry transient errors.
//!
//! Replies arrive through [`Resender::on_reply`] (or the resender's
//! [`ReplyHandler`] sink). A reply whose first error is transient, for a
//! message that allows retries and a policy that agrees, is not surfaced:
//! the message is annotated with a trace line, its retry counter is bumped
//! and it waits in the [`DelayQueue`] until the worker resends it. Every
//! other reply goes upstream unchanged.

mod queue;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error_code::{self, Error};
use crate::message::{format_seconds, retry_line, Message, MessageId, Reply};
use crate::retry::{classify, ErrorClass, RetryPolicy};
use crate::transport::{ReplyHandler, Transport};

pub use queue::{DelayQueue, QueueError, Rejected};

/// Limits applied by the resender on top of the retry policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResenderOptions {
    /// Hard cap on resends per message. `None` leaves termination to the
    /// send timeout.
    pub max_retries: Option<u32>,
    /// Maximum number of messages waiting for resend.
    pub max_queued: Option<usize>,
}

/// Handle to a resender. Clones share the same queue and worker.
#[derive(Clone)]
pub struct Resender {
    inner: Arc<Inner>,
}

struct Inner {
    policy: Arc<dyn RetryPolicy>,
    queue: DelayQueue,
    transport: Arc<dyn Transport>,
    upstream: Arc<dyn ReplyHandler>,
    max_retries: Option<u32>,
}

impl Resender {
    /// Replies that are not retried are forwarded to `upstream`.
    pub fn new(
        policy: Arc<dyn RetryPolicy>,
        transport: Arc<dyn Transport>,
        upstream: Arc<dyn ReplyHandler>,
        options: ResenderOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                policy,
                queue: DelayQueue::new(options.max_queued),
                transport,
                upstream,
                max_retries: options.max_retries,
            }),
        }
    }

    /// Spawn the worker that resends due messages. Must be called from
    /// within a tokio runtime. The worker exits after [`Resender::shutdown`].
    pub fn start(&self) -> JoinHandle<()> {
        tokio::spawn(worker::run(Arc::clone(&self.inner)))
    }

    /// Submit a message to the transport, with this resender receiving
    /// the reply.
    pub fn send(&self, message: Message) {
        if self.inner.queue.is_closed() {
            self.inner.deliver(Reply::with_error(
                message,
                error_code::SEND_ABORTED,
                "resender is shut down",
            ));
            return;
        }
        self.inner.submit(message);
    }

    /// Sink to hand to a transport so replies come back to this resender.
    pub fn reply_handler(&self) -> Arc<dyn ReplyHandler> {
        self.inner.clone()
    }

    pub fn on_reply(&self, reply: Reply) {
        self.inner.on_reply(reply);
    }

    /// Remove a waiting message, e.g. because its send timed out.
    pub fn cancel(&self, id: MessageId) -> Option<Message> {
        self.inner.queue.remove(id)
    }

    /// Number of messages waiting for resend.
    pub fn queued(&self) -> usize {
        self.inner.queue.len()
    }

    /// Close the queue. Waiting messages are answered with `SEND_ABORTED`
    /// and the worker stops.
    pub fn shutdown(&self) {
        let drained = self.inner.queue.close();
        if !drained.is_empty() {
            tracing::warn!(count = drained.len(), "aborting queued resends on shutdown");
        }
        for message in drained {
            self.inner.deliver(Reply::with_error(
                message,
                error_code::SEND_ABORTED,
                "resender shut down while message was waiting for resend",
            ));
        }
    }
}

impl ReplyHandler for Inner {
    fn handle_reply(&self, reply: Reply) {
        self.on_reply(reply);
    }
}

impl Inner {
    fn on_reply(&self, mut reply: Reply) {
        let code = reply.first_error_code();
        let Some(message) = reply.take_message() else {
            self.deliver(reply);
            return;
        };
        let Some(delay_secs) = self.retry_delay_for(&reply, &message, code) else {
            reply.put_message(message);
            self.deliver(reply);
            return;
        };

        // A delay the clock cannot represent is never due.
        let due = Duration::try_from_secs_f64(delay_secs)
            .ok()
            .and_then(|delay| Instant::now().checked_add(delay));
        let expires_first = match (due, message.deadline()) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(due), Some(deadline)) => due >= deadline,
        };
        if expires_first {
            tracing::debug!(id = %message.id(), delay = delay_secs, "resend would exceed deadline");
            reply.add_error(Error::new(
                error_code::TIMEOUT,
                format!(
                    "timeout exceeded by resender: retry {} in {} would pass the deadline",
                    message.retry().saturating_add(1),
                    format_seconds(delay_secs)
                ),
            ));
            reply.put_message(message);
            self.deliver(reply);
            return;
        }

        let mut message = message;
        message.increment_retry();
        let retry = message.retry();
        message.trace_mut().add(retry_line(retry, delay_secs));
        tracing::debug!(id = %message.id(), retry, delay = delay_secs, "scheduling resend");

        // The reply (and the errors of this attempt) is dropped here.
        let scheduled = match due {
            Some(due) => self.queue.schedule_at(message, due),
            None => self.queue.schedule(message, Duration::MAX),
        };
        if let Err(rejected) = scheduled {
            self.reject(rejected);
        }
    }

    /// Delay in seconds before resending, or `None` when the reply is terminal.
    fn retry_delay_for(&self, reply: &Reply, message: &Message, code: u32) -> Option<f64> {
        if classify(code) != ErrorClass::Transient || !message.retry_enabled() {
            return None;
        }
        if let Some(max) = self.max_retries {
            if message.retry() >= max {
                tracing::debug!(id = %message.id(), max, "retry cap reached");
                return None;
            }
        }
        let policy_delay = self.policy.should_retry(message.retry(), code)?;
        Some(reply.retry_delay().unwrap_or(policy_delay))
    }

    fn submit(self: &Arc<Self>, message: Message) {
        let sink: Arc<dyn ReplyHandler> = self.clone();
        self.transport.send(message, sink);
    }

    fn reject(&self, rejected: Rejected) {
        let code = match rejected.kind {
            QueueError::Full { .. } => error_code::SEND_QUEUE_FULL,
            QueueError::Closed => error_code::SEND_ABORTED,
        };
        tracing::warn!(id = %rejected.message.id(), "could not schedule resend: {}", rejected.kind);
        self.deliver(Reply::with_error(
            rejected.message,
            code,
            format!("could not schedule resend: {}", rejected.kind),
        ));
    }

    fn deliver(&self, reply: Reply) {
        tracing::debug!(
            id = %reply.id(),
            errors = reply.errors().len(),
            fatal = reply.has_fatal_errors(),
            "surfacing reply"
        );
        self.upstream.handle_reply(reply);
    }
}
