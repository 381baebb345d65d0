//! Retry and backoff policy.
//!
//! The policy is a pure decision function over one attempt's outcome and the
//! candidate's attempt state; [`run_with_retry`] is the loop that applies it,
//! sleeps, and counts retries.

mod policy;
mod run;

pub use policy::{Action, AttemptState, FailureReason, FinalStatus, RetryPolicy};
pub use run::run_with_retry;
