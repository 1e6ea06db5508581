//! Classify reply error codes into retry classes.

use crate::error_code::{FATAL_ERROR, NONE};
use crate::message::Reply;

/// Retry-relevant classification of an error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// No error: the attempt succeeded.
    None,
    /// The failure may go away if the message is resent later.
    Transient,
    /// Resending cannot succeed.
    Fatal,
}

/// Classify a single error code.
pub fn classify(code: u32) -> ErrorClass {
    match code {
        NONE => ErrorClass::None,
        c if c < FATAL_ERROR => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

/// Classify a reply by its first error (or `None` when it has no errors).
pub fn classify_reply(reply: &Reply) -> ErrorClass {
    classify(reply.first_error_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::*;
    use crate::message::Message;

    #[test]
    fn none_is_none() {
        assert_eq!(classify(NONE), ErrorClass::None);
    }

    #[test]
    fn transient_range() {
        assert_eq!(classify(TRANSIENT_ERROR), ErrorClass::Transient);
        assert_eq!(classify(APP_TRANSIENT_ERROR), ErrorClass::Transient);
        assert_eq!(classify(CONNECTION_ERROR), ErrorClass::Transient);
        assert_eq!(classify(FATAL_ERROR - 1), ErrorClass::Transient);
    }

    #[test]
    fn fatal_range() {
        assert_eq!(classify(FATAL_ERROR), ErrorClass::Fatal);
        assert_eq!(classify(APP_FATAL_ERROR), ErrorClass::Fatal);
        assert_eq!(classify(DECODE_ERROR), ErrorClass::Fatal);
    }

    #[test]
    fn reply_uses_first_error() {
        let mut reply = Reply::new(Message::new("msg"));
        assert_eq!(classify_reply(&reply), ErrorClass::None);
        reply.add_error(Error::new(APP_TRANSIENT_ERROR, "err"));
        reply.add_error(Error::new(APP_FATAL_ERROR, "err"));
        assert_eq!(classify_reply(&reply), ErrorClass::Transient);
    }
}
