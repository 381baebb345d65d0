//! Batch progress (candidates finished, rate) for periodic log lines.

/// Log a progress line every this many finished candidates.
pub(crate) const PROGRESS_EVERY: usize = 10;

/// Snapshot of how far one phase has got.
#[derive(Debug, Clone, Copy)]
pub struct ProgressStats {
    /// Candidates that finished this phase (any outcome).
    pub done: usize,
    /// Candidates in this phase.
    pub total: usize,
    /// Seconds since the phase started.
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.done as f64 / self.total as f64).min(1.0)
    }

    /// Finished candidates per second (0 if elapsed is 0).
    pub fn per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.done as f64 / self.elapsed_secs
    }

    /// True when a progress line is due.
    pub fn should_report(&self) -> bool {
        self.done == self.total || self.done % PROGRESS_EVERY == 0
    }
}
