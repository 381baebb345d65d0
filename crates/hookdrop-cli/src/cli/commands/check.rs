//! `hookdrop check` – validate only, nothing is sent.

use anyhow::Result;
use hookdrop_core::config::UploadConfig;
use hookdrop_core::validate::ValidationOutcome;

use crate::cli::discover;
use crate::cli::SourceArgs;

pub fn run_check(cfg: &UploadConfig, source: &SourceArgs) -> Result<bool> {
    let candidates = discover::collect(source)?;
    let validator = cfg.validator();
    let mut skipped = 0usize;
    for c in &candidates {
        match validator.validate(c) {
            ValidationOutcome::Valid => println!("ok    {}", c),
            ValidationOutcome::Invalid(reason) => {
                skipped += 1;
                println!("skip  {}  ({})", c, reason);
            }
        }
    }
    println!(
        "{} file(s): {} valid, {} would be skipped",
        candidates.len(),
        candidates.len() - skipped,
        skipped
    );
    Ok(true)
}
