//! Local checks a file must pass before it is ever sent.
//!
//! Order matters and the first failure wins: existence, byte size, then a
//! header-only image decode for pixel dimensions.

mod reason;

use std::fs;
use std::io;

use crate::candidate::Candidate;

pub use reason::{InvalidReason, ValidationOutcome};

/// Size and dimension limits. `min_size..=max_size` is inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    pub min_size: u64,
    pub max_size: u64,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            min_size: 5000,
            max_size: 20_000_000,
            min_width: 256,
            min_height: 256,
        }
    }
}

impl Validator {
    pub fn validate(&self, candidate: &Candidate) -> ValidationOutcome {
        match self.check(candidate) {
            Ok(()) => ValidationOutcome::Valid,
            Err(reason) => ValidationOutcome::Invalid(reason),
        }
    }

    fn check(&self, candidate: &Candidate) -> Result<(), InvalidReason> {
        let path = candidate.path();
        let meta = fs::metadata(path).map_err(|e| InvalidReason::Unreadable {
            detail: if e.kind() == io::ErrorKind::NotFound {
                "file does not exist".to_string()
            } else {
                e.to_string()
            },
        })?;
        if !meta.is_file() {
            return Err(InvalidReason::Unreadable {
                detail: "not a regular file".to_string(),
            });
        }

        let size = meta.len();
        if size < self.min_size {
            return Err(InvalidReason::TooSmall { size });
        }
        if size > self.max_size {
            return Err(InvalidReason::TooLarge { size });
        }

        // The reader owns the file handle and is consumed here, so the file is
        // closed before we return on every path.
        let (width, height) = image::ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| InvalidReason::Unreadable {
                detail: e.to_string(),
            })?
            .into_dimensions()
            .map_err(|e| InvalidReason::Unreadable {
                detail: e.to_string(),
            })?;

        if width < self.min_width || height < self.min_height {
            return Err(InvalidReason::DimensionsTooSmall { width, height });
        }
        Ok(())
    }
}
