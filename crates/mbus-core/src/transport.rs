//! Seams to the network layer and to the caller.
//!
//! The resender never touches sockets: it hands messages to a `Transport`
//! and receives replies through a `ReplyHandler`.

use std::sync::Arc;

use crate::message::{Message, Reply};

/// Receives replies. Implementations must not block; they are called from
/// the transport's delivery path.
pub trait ReplyHandler: Send + Sync {
    fn handle_reply(&self, reply: Reply);
}

/// Delivers messages to their destination.
///
/// `send` must return without waiting for the destination. Exactly one reply
/// per send is later delivered to `replies`; delivery failures surface as a
/// reply carrying an error code.
pub trait Transport: Send + Sync {
    fn send(&self, message: Message, replies: Arc<dyn ReplyHandler>);
}

impl ReplyHandler for tokio::sync::mpsc::UnboundedSender<Reply> {
    fn handle_reply(&self, reply: Reply) {
        if let Err(e) = self.send(reply) {
            tracing::debug!(id = %e.0.id(), "reply receiver dropped; discarding reply");
        }
    }
}
