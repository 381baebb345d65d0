//! Fixed-size worker pool for one dispatch phase.
//!
//! Workers pull candidates from a shared queue until it is empty (or the run
//! is cancelled) and report each result over a channel to the calling thread,
//! which keeps the progress log and collects permanent failures.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::candidate::Candidate;
use crate::retry::{run_with_retry, FailureReason, FinalStatus};
use crate::transport::Transport;
use crate::validate::ValidationOutcome;

use super::progress::ProgressStats;
use super::Shared;

/// Which pass a worker is running; only the first may park failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Phase {
    Initial,
    Resubmission,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Initial => "upload",
            Phase::Resubmission => "resubmission",
        }
    }
}

/// Where one candidate ended up in this phase.
#[derive(Debug)]
enum ItemResult {
    Sent,
    Skipped,
    /// Moved to the failed set; not terminal yet.
    Parked,
    Failed(FailureReason),
}

/// Sender half of the failed set, held by workers during the initial phase.
pub(super) type FailedSender = Sender<(Candidate, FailureReason)>;

/// What a phase leaves behind for the dispatcher.
#[derive(Debug, Default)]
pub(super) struct PhaseOutcome {
    pub failures: Vec<(Candidate, FailureReason)>,
    pub not_started: usize,
}

/// Runs `work` through at most `limit` workers. `failed_tx` is consumed and
/// dropped before returning, so once this returns the failed set is sealed.
pub(super) fn run_phase<T: Transport + 'static>(
    shared: &Arc<Shared<T>>,
    phase: Phase,
    work: Vec<Candidate>,
    limit: usize,
    failed_tx: Option<FailedSender>,
) -> PhaseOutcome {
    let total = work.len();
    if total == 0 {
        return PhaseOutcome::default();
    }

    let num_workers = limit.max(1).min(total);
    tracing::info!(
        "{}: {} file(s) with {} worker(s)",
        phase.label(),
        total,
        num_workers
    );

    let queue: Arc<Mutex<VecDeque<Candidate>>> = Arc::new(Mutex::new(work.into_iter().collect()));
    let (tx, rx) = mpsc::channel::<(Candidate, ItemResult)>();
    let mut handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let queue = Arc::clone(&queue);
        let shared = Arc::clone(shared);
        let tx = tx.clone();
        let failed_tx = failed_tx.clone();
        handles.push(std::thread::spawn(move || {
            while !shared.cancel.is_cancelled() {
                let Some(candidate) = pop(&queue) else {
                    break;
                };
                let result = process(&shared, phase, &candidate, failed_tx.as_ref());
                if tx.send((candidate, result)).is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);
    drop(failed_tx);

    let started = Instant::now();
    let mut outcome = PhaseOutcome::default();
    let mut done = 0usize;
    for (candidate, result) in rx {
        done += 1;
        if let ItemResult::Failed(reason) = result {
            outcome.failures.push((candidate, reason));
        }
        let stats = ProgressStats {
            done,
            total,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        if stats.should_report() {
            tracing::info!(
                "{} progress: {}/{} ({:.0}%, {:.1}/s) | {}",
                phase.label(),
                stats.done,
                stats.total,
                stats.fraction() * 100.0,
                stats.per_sec(),
                shared.metrics.snapshot()
            );
        }
    }

    for h in handles {
        if h.join().is_err() {
            tracing::error!("{} worker panicked", phase.label());
        }
    }

    outcome.not_started = pop_all(&queue);
    outcome
}

fn pop(queue: &Mutex<VecDeque<Candidate>>) -> Option<Candidate> {
    match queue.lock() {
        Ok(mut q) => q.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

fn pop_all(queue: &Mutex<VecDeque<Candidate>>) -> usize {
    match queue.lock() {
        Ok(mut q) => q.drain(..).count(),
        Err(poisoned) => poisoned.into_inner().drain(..).count(),
    }
}

/// validate → send → retry for one candidate, recording its outcome.
fn process<T: Transport>(
    shared: &Shared<T>,
    phase: Phase,
    candidate: &Candidate,
    failed_tx: Option<&FailedSender>,
) -> ItemResult {
    if let ValidationOutcome::Invalid(reason) = shared.validator.validate(candidate) {
        tracing::info!(file = %candidate, "skipping: {}", reason);
        shared.metrics.record_skipped();
        shared.log_outcome(candidate, "skipped", Some(reason.label().to_string()));
        return ItemResult::Skipped;
    }

    let status = run_with_retry(
        shared.transport.as_ref(),
        candidate,
        &shared.policy,
        &shared.metrics,
        &shared.cancel,
    );
    let reason = match status {
        FinalStatus::Sent => {
            tracing::info!(file = %candidate, "sent");
            shared.metrics.record_sent();
            shared.log_outcome(candidate, "sent", None);
            return ItemResult::Sent;
        }
        FinalStatus::Failed(reason) => reason,
    };

    if phase == Phase::Initial && reason.is_resubmittable() {
        if let Some(tx) = failed_tx {
            match tx.send((candidate.clone(), reason)) {
                Ok(()) => {
                    tracing::warn!(file = %candidate, "parked for resubmission");
                    return ItemResult::Parked;
                }
                // Receiver gone: nothing will resubmit, so this failure is final.
                Err(mpsc::SendError((_, reason))) => return fail(shared, candidate, reason),
            }
        }
    }
    fail(shared, candidate, reason)
}

fn fail<T: Transport>(shared: &Shared<T>, candidate: &Candidate, reason: FailureReason) -> ItemResult {
    tracing::error!(file = %candidate, "upload failed: {}", reason);
    shared.metrics.record_failed();
    shared.log_outcome(candidate, "failed", Some(reason.to_string()));
    ItemResult::Failed(reason)
}
