//! Why a candidate was refused before upload.

use thiserror::Error;

/// Mutually exclusive reasons a candidate fails local checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    /// Below the configured minimum byte size.
    #[error("file too small ({size} bytes)")]
    TooSmall { size: u64 },
    /// Above the configured maximum byte size.
    #[error("file too large ({size} bytes)")]
    TooLarge { size: u64 },
    /// Decoded, but narrower or shorter than allowed.
    #[error("dimensions too small ({width}x{height})")]
    DimensionsTooSmall { width: u32, height: u32 },
    /// Missing, not a regular file, or not a decodable image.
    #[error("unreadable: {detail}")]
    Unreadable { detail: String },
}

impl InvalidReason {
    /// Short stable label for logs and the outcome log.
    pub fn label(&self) -> &'static str {
        match self {
            InvalidReason::TooSmall { .. } => "size-too-small",
            InvalidReason::TooLarge { .. } => "size-too-large",
            InvalidReason::DimensionsTooSmall { .. } => "dimensions-too-small",
            InvalidReason::Unreadable { .. } => "unreadable",
        }
    }
}

/// Result of [`super::Validator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(InvalidReason),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}
