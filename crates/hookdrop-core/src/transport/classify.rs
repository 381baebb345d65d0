//! Map HTTP responses and libcurl errors onto [`SendOutcome`].

use std::time::Duration;

use super::hint;
use super::SendOutcome;

/// Longest slice of a response body quoted in an error detail.
const BODY_SNIPPET: usize = 200;

/// Classify a completed HTTP exchange.
///
/// `default_cooldown` is used for a 429 that carries no usable hint.
pub fn classify_response(
    code: u32,
    header_lines: &[String],
    body: &[u8],
    default_cooldown: Duration,
) -> SendOutcome {
    match code {
        200..=299 => SendOutcome::Sent,
        429 => SendOutcome::RateLimited {
            wait: hint::retry_after(body, header_lines).unwrap_or(default_cooldown),
        },
        _ => {
            let text = String::from_utf8_lossy(body);
            let snippet: String = text.trim().chars().take(BODY_SNIPPET).collect();
            if snippet.is_empty() {
                SendOutcome::TransientError(format!("HTTP {}", code))
            } else {
                SendOutcome::TransientError(format!("HTTP {}: {}", code, snippet))
            }
        }
    }
}

/// Classify a libcurl failure. A destination curl cannot even address is
/// fatal; everything else (DNS, connect, timeouts, resets) is transient.
pub fn classify_curl_error(e: &curl::Error) -> SendOutcome {
    if e.is_url_malformed() || e.is_unsupported_protocol() {
        return SendOutcome::FatalError(e.to_string());
    }
    SendOutcome::TransientError(e.to_string())
}
