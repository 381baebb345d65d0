//! Retry loop: send until the policy says stop, sleeping between attempts.

use crate::candidate::Candidate;
use crate::control::CancelToken;
use crate::metrics::Metrics;
use crate::transport::{SendOutcome, Transport};

use super::policy::{Action, AttemptState, FailureReason, FinalStatus, RetryPolicy};

/// Drives one candidate to a terminal status.
///
/// Every wait increments `retried`. Terminal counters (`sent`, `failed`) are
/// left to the caller, which knows whether a failure is final for this run.
/// A raised `cancel` token ends the loop at the next wait boundary.
pub fn run_with_retry<T: Transport + ?Sized>(
    transport: &T,
    candidate: &Candidate,
    policy: &RetryPolicy,
    metrics: &Metrics,
    cancel: &CancelToken,
) -> FinalStatus {
    let mut state = AttemptState::default();
    loop {
        let outcome = transport.send(candidate);
        let delay = match policy.next_action(&outcome, &state) {
            Action::Stop(status) => return status,
            Action::Wait(d) => d,
        };

        metrics.record_retried();
        match &outcome {
            SendOutcome::RateLimited { .. } => {
                state.rate_limit_waits += 1;
                tracing::warn!(
                    file = %candidate,
                    wait_ms = delay.as_millis() as u64,
                    "rate limited; cooling down"
                );
            }
            SendOutcome::TransientError(detail) => {
                state.attempts_made += 1;
                tracing::warn!(
                    file = %candidate,
                    attempt = state.attempts_made,
                    max_retries = policy.max_retries,
                    wait_ms = delay.as_millis() as u64,
                    "upload failed: {}",
                    detail
                );
            }
            SendOutcome::Sent | SendOutcome::FatalError(_) => {}
        }

        if !cancel.wait(delay) {
            return FinalStatus::Failed(FailureReason::Cancelled);
        }
    }
}
