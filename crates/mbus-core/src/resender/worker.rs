//! Worker loop: pull due messages off the delay queue and resend them.

use std::sync::Arc;

use tokio::time::Instant;

use crate::error_code;
use crate::message::Reply;

use super::Inner;

/// Runs until the queue is closed. Spawn this with tokio::spawn.
pub(super) async fn run(inner: Arc<Inner>) {
    tracing::info!("resender worker started");
    while let Ok(message) = inner.queue.await_due().await {
        if message.is_expired(Instant::now()) {
            tracing::warn!(id = %message.id(), retry = message.retry(), "message expired while waiting for resend");
            inner.deliver(Reply::with_error(
                message,
                error_code::TIMEOUT,
                "message expired while waiting for resend",
            ));
            continue;
        }
        tracing::debug!(id = %message.id(), retry = message.retry(), "resending");
        inner.submit(message);
    }
    tracing::info!("resender worker stopped");
}
