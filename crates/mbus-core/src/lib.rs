pub mod config;
pub mod logging;

pub mod error_code;
pub mod message;
pub mod resender;
pub mod retry;
pub mod session;
pub mod transport;

pub use error_code::Error;
pub use message::{Message, MessageId, Reply, Trace};
pub use resender::{DelayQueue, QueueError, Resender, ResenderOptions};
pub use retry::{ErrorClass, RetryPolicy, RetryTransientErrorsPolicy};
pub use session::{SessionOptions, SourceSession};
pub use transport::{ReplyHandler, Transport};
