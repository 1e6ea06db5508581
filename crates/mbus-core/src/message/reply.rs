//! Reply to a message: the message itself plus the errors of one attempt.

use crate::error_code::{self, Error};

use super::{Message, MessageId, Trace};

/// Reply produced for one delivery attempt of a message.
///
/// `Reply::new` moves the message into the reply. A reply built after the
/// message itself was lost (e.g. the send timed out while in flight) is
/// detached and only knows the message id.
#[derive(Debug, Clone)]
pub struct Reply {
    id: MessageId,
    message: Option<Message>,
    errors: Vec<Error>,
    retry_delay: Option<f64>,
}

impl Reply {
    pub fn new(message: Message) -> Self {
        Self {
            id: message.id(),
            message: Some(message),
            errors: Vec::new(),
            retry_delay: None,
        }
    }

    pub fn detached(id: MessageId) -> Self {
        Self {
            id,
            message: None,
            errors: Vec::new(),
            retry_delay: None,
        }
    }

    /// Build a terminal reply carrying a single error.
    pub(crate) fn with_error(message: Message, code: u32, text: impl Into<String>) -> Self {
        let mut reply = Reply::new(message);
        reply.add_error(Error::new(code, text));
        reply
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    pub fn message_mut(&mut self) -> Option<&mut Message> {
        self.message.as_mut()
    }

    /// Take the message out of the reply, leaving it detached.
    pub fn take_message(&mut self) -> Option<Message> {
        self.message.take()
    }

    pub(crate) fn put_message(&mut self, message: Message) {
        self.message = Some(message);
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.message.as_ref().map(Message::trace)
    }

    pub fn add_error(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Code of the first error, or `NONE`.
    pub fn first_error_code(&self) -> u32 {
        self.errors.first().map_or(error_code::NONE, |e| e.code)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_fatal_errors(&self) -> bool {
        self.errors.iter().any(Error::is_fatal)
    }

    /// Delay in seconds the sender should wait before resending. Negative
    /// values clear the override so the retry policy decides.
    pub fn set_retry_delay(&mut self, secs: f64) {
        self.retry_delay = (secs >= 0.0).then_some(secs);
    }

    pub fn retry_delay(&self) -> Option<f64> {
        self.retry_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::{APP_FATAL_ERROR, APP_TRANSIENT_ERROR, TIMEOUT};

    #[test]
    fn reply_takes_message_state() {
        let mut msg = Message::new("msg");
        msg.trace_mut().add("hop");
        let id = msg.id();
        let reply = Reply::new(msg);
        assert_eq!(reply.id(), id);
        assert!(reply.trace().unwrap().contains("hop"));
        assert!(!reply.has_errors());
        assert_eq!(reply.first_error_code(), error_code::NONE);
    }

    #[test]
    fn error_flags() {
        let mut reply = Reply::new(Message::new("msg"));
        reply.add_error(Error::new(APP_TRANSIENT_ERROR, "err"));
        assert!(reply.has_errors());
        assert!(!reply.has_fatal_errors());
        reply.add_error(Error::new(APP_FATAL_ERROR, "err"));
        assert!(reply.has_fatal_errors());
        assert_eq!(reply.first_error_code(), APP_TRANSIENT_ERROR);
        reply.clear_errors();
        assert!(!reply.has_errors());
    }

    #[test]
    fn negative_retry_delay_means_policy_default() {
        let mut reply = Reply::new(Message::new("msg"));
        assert_eq!(reply.retry_delay(), None);
        reply.set_retry_delay(0.0);
        assert_eq!(reply.retry_delay(), Some(0.0));
        reply.set_retry_delay(-1.0);
        assert_eq!(reply.retry_delay(), None);
    }

    #[test]
    fn detached_reply_has_no_message() {
        let msg = Message::new("msg");
        let mut reply = Reply::detached(msg.id());
        reply.add_error(Error::new(TIMEOUT, "timed out"));
        assert!(reply.message().is_none());
        assert!(reply.trace().is_none());
        assert!(reply.has_errors() && !reply.has_fatal_errors());
    }
}
