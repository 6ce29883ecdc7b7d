//! Resilience around upstream calls.
//!
//! - Minimum spacing between calls to the same source ([`RateGate`])
//! - Retry with exponential backoff and jitter ([`run_with_retry`])
//! - Payload sanity checks ([`Validate`])

mod backoff;
mod rate_gate;
mod validator;

pub use backoff::{run_with_retry, RetryPolicy};
pub use rate_gate::{RateGate, DEFAULT_MIN_INTERVAL};
pub use validator::Validate;
