//! Cooperative cancellation for a running batch.
//!
//! Workers check the token between candidates and while waiting out a backoff
//! or cooldown; a raised token never interrupts an in-flight request, so the
//! file handle for that request is always released normally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep inside a wait.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Shared stop flag. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every worker to stop at its next wait boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Sleeps for `d` unless cancelled first. Returns false if the wait was cut short.
    /// A `d` too large to represent as a deadline waits until cancelled.
    pub fn wait(&self, d: Duration) -> bool {
        let deadline = Instant::now().checked_add(d);
        loop {
            if self.is_cancelled() {
                return false;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    (deadline - now).min(WAIT_SLICE)
                }
                None => WAIT_SLICE,
            };
            std::thread::sleep(slice);
        }
    }
}
