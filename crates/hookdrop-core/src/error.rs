//! Run-level errors: the only failures surfaced to the caller instead of being
//! contained inside one candidate's worker.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Destination identifier is missing, malformed, or not http(s).
    #[error("invalid destination {url:?}: {reason}")]
    InvalidDestination { url: String, reason: String },

    /// Input list could not be produced (e.g. folder missing).
    #[error("cannot read input list: {0}")]
    Discovery(String),
}

/// Checks that `raw` is an absolute http(s) URL with a host.
pub fn check_destination(raw: &str) -> Result<url::Url, PipelineError> {
    let invalid = |reason: &str| PipelineError::InvalidDestination {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }
    let parsed = url::Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(&format!("unsupported scheme {}", other))),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(parsed)
}
