//! Failsafe mechanisms: the single-retry decision shared by token exchange,
//! gateway connect and tool calls

mod retry;

pub use retry::{MAX_ATTEMPTS, Operation, RetryDecision, decide};
