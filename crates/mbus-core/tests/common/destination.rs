//! Loopback transport for integration tests.
//!
//! Every message sent through the transport is handed to the test as a
//! `Delivery`; the test plays the destination and answers it with
//! `Delivery::reply`, which routes the reply back to whoever sent it.

use std::sync::Arc;
use std::time::Duration;

use mbus_core::error_code::{self, Error};
use mbus_core::{Message, Reply, ReplyHandler, Transport};
use tokio::sync::mpsc;

pub struct Delivery {
    pub message: Message,
    replies: Arc<dyn ReplyHandler>,
}

impl Delivery {
    /// Answer with `error_code` (NONE = ack) and the given retry delay in
    /// seconds (negative = let the policy decide).
    pub fn reply(self, error_code: u32, retry_delay: f64) {
        let mut reply = Reply::new(self.message);
        if error_code != error_code::NONE {
            reply.add_error(Error::new(error_code, "err"));
        }
        reply.set_retry_delay(retry_delay);
        self.replies.handle_reply(reply);
    }

    pub fn ack(self) {
        self.reply(error_code::NONE, -1.0);
    }
}

pub struct LoopbackTransport {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl Transport for LoopbackTransport {
    fn send(&self, message: Message, replies: Arc<dyn ReplyHandler>) {
        let _ = self.tx.send(Delivery { message, replies });
    }
}

pub struct Destination {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Destination {
    /// Wait up to `secs` for the next delivery.
    pub async fn next(&mut self, secs: u64) -> Option<Delivery> {
        tokio::time::timeout(Duration::from_secs(secs), self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// A delivery that is already waiting, if any.
    pub fn try_next(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }
}

pub fn loopback() -> (Arc<LoopbackTransport>, Destination) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(LoopbackTransport { tx }), Destination { rx })
}

/// Wait up to `secs` for the next reply on `rx`.
pub async fn next_reply(rx: &mut mpsc::UnboundedReceiver<Reply>, secs: u64) -> Option<Reply> {
    tokio::time::timeout(Duration::from_secs(secs), rx.recv())
        .await
        .ok()
        .flatten()
}
