//! Multipart upload over libcurl with a small pool of reusable easy handles.
//!
//! Each easy handle keeps its own connection cache, so returning handles to
//! the pool after every call lets later uploads (from any worker) reuse
//! keep-alive connections to the destination.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str;
use std::sync::Mutex;
use std::time::Duration;

use curl::easy::{Easy, Form, List};

use crate::candidate::Candidate;
use crate::error::{check_destination, PipelineError};

use super::classify::{classify_curl_error, classify_response};
use super::{SendOutcome, Transport};

/// Name of the multipart field carrying the file.
const FILE_FIELD: &str = "file";

/// Timeouts and rate-limit fallback for [`CurlTransport`].
#[derive(Debug, Clone, Copy)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    /// Hard limit for one whole request.
    pub request_timeout: Duration,
    /// Wait used for a 429 with no hint.
    pub rate_limit_cooldown: Duration,
    /// Idle handles kept for reuse; extra handles are dropped.
    pub max_idle_handles: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            rate_limit_cooldown: Duration::from_secs(15),
            max_idle_handles: 16,
        }
    }
}

/// Raw response pieces collected during one transfer.
struct Response {
    code: u32,
    headers: Vec<String>,
    body: Vec<u8>,
}

/// Failure before a response existed.
enum AttemptError {
    Curl(curl::Error),
    Form(curl::FormError),
}

impl From<curl::Error> for AttemptError {
    fn from(e: curl::Error) -> Self {
        AttemptError::Curl(e)
    }
}

impl From<curl::FormError> for AttemptError {
    fn from(e: curl::FormError) -> Self {
        AttemptError::Form(e)
    }
}

pub struct CurlTransport {
    url: String,
    opts: TransportOptions,
    idle: Mutex<Vec<Easy>>,
}

impl CurlTransport {
    /// Builds a transport for `destination`. A destination that is not an
    /// absolute http(s) URL is rejected here, before any worker starts.
    pub fn new(destination: &str, opts: TransportOptions) -> Result<Self, PipelineError> {
        let url = check_destination(destination)?;
        Ok(Self {
            url: url.into(),
            opts,
            idle: Mutex::new(Vec::new()),
        })
    }

    pub fn destination(&self) -> &str {
        &self.url
    }

    fn checkout(&self) -> Easy {
        self.idle
            .lock()
            .ok()
            .and_then(|mut idle| idle.pop())
            .unwrap_or_else(Easy::new)
    }

    fn checkin(&self, mut easy: Easy) {
        // reset() clears options but keeps the connection cache.
        easy.reset();
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.opts.max_idle_handles {
                idle.push(easy);
            }
        }
    }

    fn perform(&self, easy: &mut Easy, name: &str, data: Vec<u8>) -> Result<Response, AttemptError> {
        easy.url(&self.url)?;
        easy.useragent(concat!("hookdrop/", env!("CARGO_PKG_VERSION")))?;
        easy.connect_timeout(self.opts.connect_timeout)?;
        easy.timeout(self.opts.request_timeout)?;
        // No 100-continue round trip before the body.
        let mut headers = List::new();
        headers.append("Expect:")?;
        easy.http_headers(headers)?;

        let mut form = Form::new();
        form.part(FILE_FIELD).buffer(name, data).add()?;
        easy.httppost(form)?;

        let mut headers: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|line| {
                if let Ok(s) = str::from_utf8(line) {
                    headers.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.write_function(|chunk| {
                body.extend_from_slice(chunk);
                Ok(chunk.len())
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        Ok(Response {
            code,
            headers,
            body,
        })
    }
}

impl Transport for CurlTransport {
    fn send(&self, candidate: &Candidate) -> SendOutcome {
        let data = match read_payload(candidate.path()) {
            Ok(data) => data,
            Err(e) => {
                return SendOutcome::FatalError(format!(
                    "cannot read {}: {}",
                    candidate.path().display(),
                    e
                ))
            }
        };

        let mut easy = self.checkout();
        let outcome = match self.perform(&mut easy, candidate.name(), data) {
            Ok(resp) => classify_response(
                resp.code,
                &resp.headers,
                &resp.body,
                self.opts.rate_limit_cooldown,
            ),
            Err(AttemptError::Curl(e)) => classify_curl_error(&e),
            Err(AttemptError::Form(e)) => SendOutcome::FatalError(format!("multipart form: {}", e)),
        };
        self.checkin(easy);

        tracing::debug!(file = %candidate.name(), ?outcome, "upload attempt finished");
        outcome
    }
}

/// Reads the whole file; the handle is closed when this returns.
fn read_payload(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_bad_destination() {
        assert!(matches!(
            CurlTransport::new("discord webhook", TransportOptions::default()),
            Err(PipelineError::InvalidDestination { .. })
        ));
    }

    #[test]
    fn missing_file_is_fatal_without_network() {
        let t = CurlTransport::new("http://127.0.0.1:9/hook", TransportOptions::default()).unwrap();
        let c = Candidate::from_path("/definitely/not/here.png");
        assert!(matches!(t.send(&c), SendOutcome::FatalError(_)));
    }

    #[test]
    fn handles_are_pooled_up_to_limit() {
        let opts = TransportOptions {
            max_idle_handles: 1,
            ..TransportOptions::default()
        };
        let t = CurlTransport::new("http://127.0.0.1:9/hook", opts).unwrap();
        let a = t.checkout();
        let b = t.checkout();
        t.checkin(a);
        t.checkin(b);
        assert_eq!(t.idle.lock().unwrap().len(), 1);
    }
}
