//! `hookdrop config` – show where settings come from and what they resolve to.

use anyhow::Result;
use hookdrop_core::config::UploadConfig;
use std::path::Path;

pub fn run_config(cfg: &UploadConfig, path: &Path) -> Result<()> {
    let mut shown = cfg.clone();
    shown.webhook_url = cfg.webhook_url.as_deref().map(redact_webhook);
    shown.validation = Some(cfg.validation_or_default());
    shown.retry = Some(cfg.retry_or_default());
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

/// Hides the last path segment (the webhook token).
fn redact_webhook(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let host_start = trimmed.find("://").map_or(0, |i| i + 3);
    match trimmed[host_start..].rfind('/') {
        Some(i) => format!("{}/***", &trimmed[..host_start + i]),
        None => url.to_string(),
    }
}
