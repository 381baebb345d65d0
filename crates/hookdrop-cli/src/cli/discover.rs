//! Turns CLI arguments into the ordered candidate list.

use anyhow::Result;
use hookdrop_core::{Candidate, PipelineError};
use rand::Rng;
use std::path::Path;
use walkdir::WalkDir;

use super::SourceArgs;

/// Extensions picked up when scanning a folder (compared case-insensitively).
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// Explicit paths are taken as given (the validator judges them); otherwise
/// `folder` is walked for image files in file-name order.
pub fn collect(source: &SourceArgs) -> Result<Vec<Candidate>> {
    let mut found: Vec<Candidate> = if source.paths.is_empty() {
        walk_folder(&source.folder)?
    } else {
        source.paths.iter().map(Candidate::from_path).collect()
    };

    if source.random && !found.is_empty() {
        let pick = rand::rng().random_range(0..found.len());
        let chosen = found.swap_remove(pick);
        tracing::info!("random pick: {}", chosen);
        found = vec![chosen];
    }
    Ok(found)
}

fn walk_folder(root: &Path) -> Result<Vec<Candidate>> {
    if !root.is_dir() {
        return Err(PipelineError::Discovery(format!("{} is not a directory", root.display())).into());
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(e) if e.file_type().is_file() && has_image_extension(e.path()) => {
                found.push(Candidate::from_path(e.into_path()));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("skipping unreadable entry: {}", e),
        }
    }
    tracing::debug!("found {} image(s) under {}", found.len(), root.display());
    Ok(found)
}
