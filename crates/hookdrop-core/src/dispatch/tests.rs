//! Dispatcher tests with a scripted transport and real files on disk.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use super::*;
use crate::transport::SendOutcome;

/// Per-file scripted outcomes; a file with no (remaining) script is `Sent`.
#[derive(Default)]
struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<SendOutcome>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedTransport {
    fn script(self, name: &str, outcomes: Vec<SendOutcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), outcomes.into());
        self
    }

    fn calls(&self, name: &str) -> u32 {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, candidate: &Candidate) -> SendOutcome {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(candidate.name().to_string())
            .or_default() += 1;
        self.scripts
            .lock()
            .unwrap()
            .get_mut(candidate.name())
            .and_then(|q| q.pop_front())
            .unwrap_or(SendOutcome::Sent)
    }
}

fn transient() -> SendOutcome {
    SendOutcome::TransientError("HTTP 502".to_string())
}

fn noisy_png(dir: &Path, name: &str) -> Candidate {
    let mut state: u32 = name.bytes().fold(17u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let img = RgbImage::from_fn(64, 64, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let b = state.to_le_bytes();
        Rgb([b[1], b[2], b[3]])
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    Candidate::from_path(path)
}

fn tiny_file(dir: &Path, name: &str) -> Candidate {
    let path = dir.join(name);
    std::fs::write(&path, vec![7u8; 100]).unwrap();
    Candidate::from_path(path)
}

fn validator() -> Validator {
    Validator {
        min_size: 5000,
        max_size: 20_000_000,
        min_width: 32,
        min_height: 32,
    }
}

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(8),
        max_rate_limit_waits: 5,
    }
}

/// 2 undersized, 6 clean, 2 that fail twice before succeeding.
fn ten_file_batch(dir: &Path) -> (Vec<Candidate>, ScriptedTransport) {
    let mut batch = vec![tiny_file(dir, "tiny-0.png"), tiny_file(dir, "tiny-1.png")];
    for i in 0..6 {
        batch.push(noisy_png(dir, &format!("clean-{}.png", i)));
    }
    batch.push(noisy_png(dir, "flaky-0.png"));
    batch.push(noisy_png(dir, "flaky-1.png"));
    let transport = ScriptedTransport::default()
        .script("flaky-0.png", vec![transient(), transient()])
        .script("flaky-1.png", vec![transient(), transient()]);
    (batch, transport)
}

#[test]
fn ten_file_batch_end_to_end() {
    let dir = TempDir::new().unwrap();
    let (batch, transport) = ten_file_batch(dir.path());
    let transport = Arc::new(transport);
    let d = Dispatcher::new(Arc::clone(&transport), validator(), policy(2));

    let metrics = d.run(batch, 4);

    assert_eq!(
        metrics,
        MetricsSnapshot {
            sent: 8,
            skipped: 2,
            failed: 0,
            retried: 4
        }
    );
    assert_eq!(transport.calls("tiny-0.png"), 0, "skipped files are never sent");
    assert_eq!(transport.calls("tiny-1.png"), 0);
    assert_eq!(transport.calls("flaky-0.png"), 3);
    assert_eq!(transport.calls("clean-3.png"), 1);
}

#[test]
fn concurrency_limit_does_not_change_totals() {
    let dir = TempDir::new().unwrap();
    let mut results = Vec::new();
    for limit in [1, 3, 16] {
        let (batch, transport) = ten_file_batch(dir.path());
        let d = Dispatcher::new(Arc::new(transport), validator(), policy(2));
        results.push(d.run(batch, limit));
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);
}

#[test]
fn exhausted_then_sent_on_resubmission_counts_only_sent() {
    let dir = TempDir::new().unwrap();
    let c = noisy_png(dir.path(), "late.png");
    let transport = Arc::new(
        ScriptedTransport::default().script("late.png", vec![transient(), transient(), transient()]),
    );
    let d = Dispatcher::new(Arc::clone(&transport), validator(), policy(2));

    let report = d.run_detailed(vec![c], 2);

    assert_eq!(
        report.metrics,
        MetricsSnapshot {
            sent: 1,
            skipped: 0,
            failed: 0,
            retried: 2
        }
    );
    assert_eq!(report.resubmitted, 1);
    assert!(report.failures.is_empty());
    assert_eq!(transport.calls("late.png"), 4);
}

#[test]
fn failing_again_on_resubmission_is_permanent() {
    let dir = TempDir::new().unwrap();
    let c = noisy_png(dir.path(), "down.png");
    let transport = Arc::new(
        ScriptedTransport::default().script("down.png", (0..20).map(|_| transient()).collect()),
    );
    let d = Dispatcher::new(Arc::clone(&transport), validator(), policy(2));

    let report = d.run_detailed(vec![c.clone()], 1);

    assert_eq!(report.metrics.failed, 1);
    assert_eq!(report.metrics.sent, 0);
    assert_eq!(report.metrics.retried, 4);
    assert_eq!(transport.calls("down.png"), 6, "two passes of three attempts, no third pass");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, c);
    assert!(matches!(
        report.failures[0].1,
        FailureReason::RetriesExhausted(_)
    ));
}

#[test]
fn fatal_errors_skip_the_resubmission_pass() {
    let dir = TempDir::new().unwrap();
    let c = noisy_png(dir.path(), "broken.png");
    let transport = Arc::new(
        ScriptedTransport::default()
            .script("broken.png", vec![SendOutcome::FatalError("bad form".into())]),
    );
    let d = Dispatcher::new(Arc::clone(&transport), validator(), policy(3));

    let report = d.run_detailed(vec![c], 2);

    assert_eq!(report.metrics.failed, 1);
    assert_eq!(report.metrics.retried, 0);
    assert_eq!(report.resubmitted, 0);
    assert_eq!(transport.calls("broken.png"), 1);
}

#[test]
fn rate_limited_then_sent_counts_one_retry() {
    let dir = TempDir::new().unwrap();
    let c = noisy_png(dir.path(), "busy.png");
    let transport = Arc::new(ScriptedTransport::default().script(
        "busy.png",
        vec![SendOutcome::RateLimited {
            wait: Duration::from_millis(20),
        }],
    ));
    let d = Dispatcher::new(transport, validator(), policy(0));

    let metrics = d.run(vec![c], 1);

    assert_eq!(metrics.sent, 1);
    assert_eq!(metrics.retried, 1);
    assert_eq!(metrics.failed, 0);
}

#[test]
fn empty_batch_is_a_no_op() {
    let d = Dispatcher::new(Arc::new(ScriptedTransport::default()), validator(), policy(2));
    let report = d.run_detailed(Vec::new(), 4);
    assert_eq!(report.metrics, MetricsSnapshot::default());
    assert_eq!(report.resubmitted, 0);
    assert_eq!(report.not_started, 0);
}

#[test]
fn cancelled_run_starts_nothing() {
    let dir = TempDir::new().unwrap();
    let batch: Vec<_> = (0..5)
        .map(|i| noisy_png(dir.path(), &format!("c-{}.png", i)))
        .collect();
    let transport = Arc::new(ScriptedTransport::default());
    let cancel = CancelToken::new();
    cancel.cancel();
    let d = Dispatcher::new(Arc::clone(&transport), validator(), policy(2)).with_cancel(cancel);

    let report = d.run_detailed(batch, 2);

    assert_eq!(report.metrics.terminal(), 0);
    assert_eq!(report.not_started, 5);
    assert_eq!(transport.calls("c-0.png"), 0);
}

#[test]
fn external_metrics_are_shared() {
    let dir = TempDir::new().unwrap();
    let metrics = Arc::new(Metrics::new());
    let d = Dispatcher::new(Arc::new(ScriptedTransport::default()), validator(), policy(1))
        .with_metrics(Arc::clone(&metrics));
    d.run(vec![noisy_png(dir.path(), "one.png")], 1);
    assert_eq!(metrics.snapshot().sent, 1);
    let second = d.run(vec![noisy_png(dir.path(), "two.png")], 1);
    assert_eq!(second.sent, 2, "injected counters span runs");
    assert_eq!(metrics.snapshot().sent, 2);
}

#[test]
fn each_run_counts_from_zero() {
    let dir = TempDir::new().unwrap();
    let d = Dispatcher::new(Arc::new(ScriptedTransport::default()), validator(), policy(1));

    let first = d.run(vec![noisy_png(dir.path(), "one.png")], 1);
    let second = d.run(
        vec![
            noisy_png(dir.path(), "two.png"),
            tiny_file(dir.path(), "tiny.png"),
        ],
        1,
    );

    assert_eq!(first.sent, 1);
    assert_eq!(
        second,
        MetricsSnapshot {
            sent: 1,
            skipped: 1,
            failed: 0,
            retried: 0
        }
    );
}

#[test]
fn unbounded_rate_limit_hint_still_ends_in_one_outcome() {
    let dir = TempDir::new().unwrap();
    let batch = vec![
        noisy_png(dir.path(), "stuck.png"),
        noisy_png(dir.path(), "next.png"),
    ];
    let transport = Arc::new(ScriptedTransport::default().script(
        "stuck.png",
        vec![SendOutcome::RateLimited {
            wait: Duration::from_secs(u64::MAX / 2),
        }],
    ));
    let cancel = CancelToken::new();
    let remote = cancel.clone();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        remote.cancel();
    });
    let d = Dispatcher::new(Arc::clone(&transport), validator(), policy(2)).with_cancel(cancel);

    let report = d.run_detailed(batch, 1);
    stopper.join().unwrap();

    assert_eq!(report.metrics.failed, 1);
    assert_eq!(report.metrics.retried, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].1, FailureReason::Cancelled);
    assert_eq!(report.not_started, 1);
    assert_eq!(transport.calls("next.png"), 0);
}

#[test]
fn concurrency_for_scales_with_batch_size() {
    assert_eq!(concurrency_for(0, 10), 1);
    assert_eq!(concurrency_for(9, 10), 1);
    assert_eq!(concurrency_for(35, 10), 3);
    assert_eq!(concurrency_for(1000, 10), 10);
    assert_eq!(concurrency_for(1000, 0), 1);
}
