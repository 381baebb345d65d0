//! One file queued for upload.

use std::fmt;
use std::path::{Path, PathBuf};

/// A file-system path plus the display name sent with the upload.
///
/// Created by whoever discovers the files; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    path: PathBuf,
    name: String,
}

impl Candidate {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    /// Uses the final path component as the display name (falls back to the whole path).
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
