//! Retry policy.
//!
//! This module encapsulates error classification (none / transient / fatal)
//! and the back-off decision so that the resender and any custom policy
//! share one notion of what is retryable.

mod classify;
mod policy;

pub use classify::{classify, classify_reply, ErrorClass};
pub use policy::{RetryPolicy, RetryTransientErrorsPolicy};
