//! Extract the server's rate-limit hint from a 429 response.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    /// Seconds, fractional values allowed.
    retry_after: Option<f64>,
}

/// Wait hint from the JSON body (`retry_after`), then the `Retry-After` header.
/// Only delay-seconds header values are understood; HTTP-dates are ignored.
pub(crate) fn retry_after(body: &[u8], header_lines: &[String]) -> Option<Duration> {
    body_hint(body).or_else(|| header_hint(header_lines))
}

fn body_hint(body: &[u8]) -> Option<Duration> {
    let parsed: RateLimitBody = serde_json::from_slice(body).ok()?;
    seconds(parsed.retry_after?)
}

fn header_hint(lines: &[String]) -> Option<Duration> {
    lines.iter().find_map(|line| {
        let (name, value) = line.trim().split_once(':')?;
        if !name.trim().eq_ignore_ascii_case("retry-after") {
            return None;
        }
        seconds(value.trim().parse::<f64>().ok()?)
    })
}

/// Longest wait a server hint can impose on one candidate.
pub(crate) const MAX_HINT: Duration = Duration::from_secs(3600);

fn seconds(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_HINT)
            .min(MAX_HINT),
    )
}
