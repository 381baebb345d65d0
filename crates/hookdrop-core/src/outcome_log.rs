//! Optional JSON-lines record of every terminal candidate outcome.
//!
//! One object per line: `{"name", "path", "status", "reason"}`. Write failures
//! are logged and otherwise ignored; they never affect the upload itself.

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::candidate::Candidate;

#[derive(Debug, Serialize)]
struct OutcomeRecord<'a> {
    name: &'a str,
    path: String,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Debug)]
pub struct OutcomeLog {
    out: Mutex<BufWriter<File>>,
}

impl OutcomeLog {
    /// Opens `path` for appending, creating parent directories as needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn record(&self, candidate: &Candidate, status: &str, reason: Option<String>) {
        let rec = OutcomeRecord {
            name: candidate.name(),
            path: candidate.path().display().to_string(),
            status,
            reason,
        };
        let res = serde_json::to_string(&rec)
            .map_err(io::Error::from)
            .and_then(|line| {
                let mut out = self
                    .out
                    .lock()
                    .map_err(|_| io::Error::new(io::ErrorKind::Other, "outcome log lock poisoned"))?;
                writeln!(out, "{}", line)?;
                out.flush()
            });
        if let Err(e) = res {
            tracing::warn!("could not write outcome log: {}", e);
        }
    }
}
