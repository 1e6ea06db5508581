//! Numeric error codes carried by replies.
//!
//! Codes below `FATAL_ERROR` are transient (a later attempt may succeed);
//! codes at or above it are fatal. Applications allocate their own codes
//! from `APP_TRANSIENT_ERROR` and `APP_FATAL_ERROR` upwards.

use serde::Serialize;
use std::fmt;

pub const NONE: u32 = 0;

pub const TRANSIENT_ERROR: u32 = 100_000;
pub const SEND_QUEUE_FULL: u32 = TRANSIENT_ERROR + 1;
pub const NO_ADDRESS_FOR_SERVICE: u32 = TRANSIENT_ERROR + 2;
pub const CONNECTION_ERROR: u32 = TRANSIENT_ERROR + 3;
pub const UNKNOWN_SESSION: u32 = TRANSIENT_ERROR + 4;
pub const SESSION_BUSY: u32 = TRANSIENT_ERROR + 5;
pub const SEND_ABORTED: u32 = TRANSIENT_ERROR + 6;
pub const HANDSHAKE_FAILED: u32 = TRANSIENT_ERROR + 7;
pub const TIMEOUT: u32 = TRANSIENT_ERROR + 8;
pub const APP_TRANSIENT_ERROR: u32 = TRANSIENT_ERROR + 50_000;

pub const FATAL_ERROR: u32 = 200_000;
pub const SEND_QUEUE_CLOSED: u32 = FATAL_ERROR + 1;
pub const ILLEGAL_ROUTE: u32 = FATAL_ERROR + 2;
pub const NO_SERVICES_FOR_ROUTE: u32 = FATAL_ERROR + 3;
pub const ENCODE_ERROR: u32 = FATAL_ERROR + 5;
pub const NETWORK_ERROR: u32 = FATAL_ERROR + 6;
pub const UNKNOWN_PROTOCOL: u32 = FATAL_ERROR + 7;
pub const DECODE_ERROR: u32 = FATAL_ERROR + 8;
pub const APP_FATAL_ERROR: u32 = FATAL_ERROR + 50_000;

pub const ERROR_LIMIT: u32 = APP_FATAL_ERROR + 150_000;

/// Symbolic name of an error code, for logs and trace output.
pub fn name(code: u32) -> String {
    let known = match code {
        NONE => "NONE",
        TRANSIENT_ERROR => "TRANSIENT_ERROR",
        SEND_QUEUE_FULL => "SEND_QUEUE_FULL",
        NO_ADDRESS_FOR_SERVICE => "NO_ADDRESS_FOR_SERVICE",
        CONNECTION_ERROR => "CONNECTION_ERROR",
        UNKNOWN_SESSION => "UNKNOWN_SESSION",
        SESSION_BUSY => "SESSION_BUSY",
        SEND_ABORTED => "SEND_ABORTED",
        HANDSHAKE_FAILED => "HANDSHAKE_FAILED",
        TIMEOUT => "TIMEOUT",
        APP_TRANSIENT_ERROR => "APP_TRANSIENT_ERROR",
        FATAL_ERROR => "FATAL_ERROR",
        SEND_QUEUE_CLOSED => "SEND_QUEUE_CLOSED",
        ILLEGAL_ROUTE => "ILLEGAL_ROUTE",
        NO_SERVICES_FOR_ROUTE => "NO_SERVICES_FOR_ROUTE",
        ENCODE_ERROR => "ENCODE_ERROR",
        NETWORK_ERROR => "NETWORK_ERROR",
        UNKNOWN_PROTOCOL => "UNKNOWN_PROTOCOL",
        DECODE_ERROR => "DECODE_ERROR",
        APP_FATAL_ERROR => "APP_FATAL_ERROR",
        ERROR_LIMIT => "ERROR_LIMIT",
        _ => return format!("UNKNOWN({})", code),
    };
    known.to_string()
}

/// One error attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Error {
    pub code: u32,
    pub message: String,
}

impl Error {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// True when the code is in the fatal range.
    pub fn is_fatal(&self) -> bool {
        self.code >= FATAL_ERROR
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", name(self.code), self.message)
    }
}
