use std::fmt;
use std::time::Duration;

use crate::transport::SendOutcome;

/// Per-candidate retry bookkeeping, owned by the worker handling it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptState {
    /// Transient failures seen so far.
    pub attempts_made: u32,
    /// Rate-limit waits taken so far. Tracked apart from `attempts_made`.
    pub rate_limit_waits: u32,
}

/// Why a candidate stopped without being sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Transient budget used up; carries the last error detail.
    RetriesExhausted(String),
    /// Too many rate-limit waits for one candidate.
    RateLimitCeiling,
    /// Not retryable at all.
    Fatal(String),
    /// The run was asked to stop while this candidate was waiting.
    Cancelled,
}

impl FailureReason {
    /// Whether the candidate deserves a place in the resubmission pass.
    pub fn is_resubmittable(&self) -> bool {
        matches!(
            self,
            FailureReason::RetriesExhausted(_) | FailureReason::RateLimitCeiling
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::RetriesExhausted(_) => "retries-exhausted",
            FailureReason::RateLimitCeiling => "rate-limit-ceiling",
            FailureReason::Fatal(_) => "fatal",
            FailureReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::RetriesExhausted(last) => write!(f, "retries exhausted (last error: {})", last),
            FailureReason::RateLimitCeiling => write!(f, "rate limited too many times"),
            FailureReason::Fatal(detail) => write!(f, "fatal: {}", detail),
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal status of one retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalStatus {
    Sent,
    Failed(FailureReason),
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Stop with this status.
    Stop(FinalStatus),
    /// Try again after the given delay.
    Wait(Duration),
}

/// Exponential backoff for transient errors, server-dictated waits for rate
/// limits, and separate ceilings for the two.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed after transient errors (not counting the first attempt).
    pub max_retries: u32,
    /// First transient backoff.
    pub base_delay: Duration,
    /// Upper bound on transient backoff.
    pub max_delay: Duration,
    /// Rate-limit waits allowed per candidate before giving up on it.
    pub max_rate_limit_waits: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_rate_limit_waits: 10,
        }
    }
}

impl RetryPolicy {
    /// `min(base_delay * 2^attempt, max_delay)`; `attempt` is 0-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn next_action(&self, outcome: &SendOutcome, state: &AttemptState) -> Action {
        match outcome {
            SendOutcome::Sent => Action::Stop(FinalStatus::Sent),
            SendOutcome::FatalError(detail) => {
                Action::Stop(FinalStatus::Failed(FailureReason::Fatal(detail.clone())))
            }
            SendOutcome::RateLimited { wait } => {
                if state.rate_limit_waits >= self.max_rate_limit_waits {
                    Action::Stop(FinalStatus::Failed(FailureReason::RateLimitCeiling))
                } else {
                    Action::Wait(*wait)
                }
            }
            SendOutcome::TransientError(detail) => {
                if state.attempts_made < self.max_retries {
                    Action::Wait(self.backoff(state.attempts_made))
                } else {
                    Action::Stop(FinalStatus::Failed(FailureReason::RetriesExhausted(
                        detail.clone(),
                    )))
                }
            }
        }
    }
}
