//! Batch dispatcher.
//!
//! Runs every candidate through validate → send → retry on a bounded pool of
//! worker threads, then gives candidates that ran out of retries exactly one
//! more pass. Failures are contained per candidate; the batch always finishes.

mod pool;
mod progress;

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::candidate::Candidate;
use crate::control::CancelToken;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::outcome_log::OutcomeLog;
use crate::retry::{FailureReason, RetryPolicy};
use crate::transport::Transport;
use crate::validate::Validator;

use pool::{run_phase, Phase};

pub use progress::ProgressStats;

/// Batch size per extra worker: `candidate_count / 10` workers, at least one.
const FILES_PER_WORKER: usize = 10;

/// Worker count for a batch: `min(configured_max, candidate_count / 10)`, floor 1.
pub fn concurrency_for(candidate_count: usize, configured_max: usize) -> usize {
    configured_max
        .min(candidate_count / FILES_PER_WORKER)
        .max(1)
}

/// Everything workers read while processing candidates.
pub(crate) struct Shared<T> {
    transport: Arc<T>,
    validator: Validator,
    policy: RetryPolicy,
    metrics: Arc<Metrics>,
    cancel: CancelToken,
    outcome_log: Option<Arc<OutcomeLog>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            validator: self.validator,
            policy: self.policy,
            metrics: Arc::clone(&self.metrics),
            cancel: self.cancel.clone(),
            outcome_log: self.outcome_log.clone(),
        }
    }
}

impl<T> Shared<T> {
    fn log_outcome(&self, candidate: &Candidate, status: &str, reason: Option<String>) {
        if let Some(log) = &self.outcome_log {
            log.record(candidate, status, reason);
        }
    }
}

/// Final account of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub metrics: MetricsSnapshot,
    /// Candidates that ended `failed`, with the reason.
    pub failures: Vec<(Candidate, FailureReason)>,
    /// Candidates that went through the resubmission pass.
    pub resubmitted: usize,
    /// Candidates never picked up because the run was cancelled.
    pub not_started: usize,
    pub elapsed: Duration,
}

pub struct Dispatcher<T> {
    shared: Shared<T>,
    /// Caller-owned counters; when unset each run counts into fresh ones.
    external_metrics: Option<Arc<Metrics>>,
}

impl<T: Transport + 'static> Dispatcher<T> {
    pub fn new(transport: Arc<T>, validator: Validator, policy: RetryPolicy) -> Self {
        Self {
            shared: Shared {
                transport,
                validator,
                policy,
                metrics: Arc::new(Metrics::new()),
                cancel: CancelToken::new(),
                outcome_log: None,
            },
            external_metrics: None,
        }
    }

    /// Count into an externally owned `Metrics` instead of a fresh one per
    /// run. Those counters are never reset, so they accumulate across runs.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.external_metrics = Some(metrics);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.shared.cancel = cancel;
        self
    }

    pub fn with_outcome_log(mut self, log: OutcomeLog) -> Self {
        self.shared.outcome_log = Some(Arc::new(log));
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.shared.cancel.clone()
    }

    /// Uploads `candidates` with at most `concurrency_limit` in flight and
    /// returns the final counters.
    pub fn run(&self, candidates: Vec<Candidate>, concurrency_limit: usize) -> MetricsSnapshot {
        self.run_detailed(candidates, concurrency_limit).metrics
    }

    /// Like [`run`](Self::run), also returning the failure list and timings.
    pub fn run_detailed(&self, candidates: Vec<Candidate>, concurrency_limit: usize) -> RunReport {
        let started = Instant::now();
        let total = candidates.len();
        let mut run = self.shared.clone();
        run.metrics = match &self.external_metrics {
            Some(m) => Arc::clone(m),
            None => Arc::new(Metrics::new()),
        };
        let shared = Arc::new(run);

        let (failed_tx, failed_rx) = mpsc::channel();
        let first = run_phase(
            &shared,
            Phase::Initial,
            candidates,
            concurrency_limit,
            Some(failed_tx),
        );
        // Every sender was dropped inside run_phase: the failed set is sealed.
        let parked: Vec<(Candidate, FailureReason)> = failed_rx.into_iter().collect();

        let mut failures = first.failures;
        let mut not_started = first.not_started;
        let mut resubmitted = 0;

        if shared.cancel.is_cancelled() {
            // No second pass; parked candidates end here.
            for (candidate, reason) in parked {
                tracing::error!(file = %candidate, "upload failed: {}", reason);
                shared.metrics.record_failed();
                shared.log_outcome(&candidate, "failed", Some(reason.to_string()));
                failures.push((candidate, reason));
            }
        } else if !parked.is_empty() {
            tracing::info!(
                "first pass done ({}); resubmitting {} file(s)",
                shared.metrics.snapshot(),
                parked.len()
            );
            resubmitted = parked.len();
            let work = parked.into_iter().map(|(c, _)| c).collect();
            let second = run_phase(
                &shared,
                Phase::Resubmission,
                work,
                concurrency_limit,
                None,
            );
            failures.extend(second.failures);
            not_started += second.not_started;
        }

        let metrics = shared.metrics.snapshot();
        let elapsed = started.elapsed();
        tracing::info!(
            "finished {} file(s) in {:.1}s: {}",
            total,
            elapsed.as_secs_f64(),
            metrics
        );
        RunReport {
            metrics,
            failures,
            resubmitted,
            not_started,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests;
