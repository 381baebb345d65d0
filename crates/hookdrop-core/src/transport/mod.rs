//! Sending one validated file to the destination.
//!
//! A transport performs exactly one attempt per call and only classifies the
//! result; retry decisions live in [`crate::retry`].

mod classify;
mod http;
mod hint;

use std::time::Duration;

use crate::candidate::Candidate;

pub use self::classify::{classify_curl_error, classify_response};
pub use self::http::{CurlTransport, TransportOptions};

/// Classified result of a single upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// 2xx from the destination.
    Sent,
    /// 429; wait this long before the next request.
    RateLimited { wait: Duration },
    /// Non-2xx status or network failure; worth retrying.
    TransientError(String),
    /// Configuration or programming error; retrying cannot help.
    FatalError(String),
}

/// One upload attempt over a connection shared by all workers.
pub trait Transport: Send + Sync {
    fn send(&self, candidate: &Candidate) -> SendOutcome;
}
