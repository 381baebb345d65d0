//! `hookdrop upload` – validate and send files to the webhook.

use anyhow::{bail, Context, Result};
use hookdrop_core::config::UploadConfig;
use hookdrop_core::outcome_log::OutcomeLog;
use hookdrop_core::transport::CurlTransport;
use hookdrop_core::{concurrency_for, Candidate, CancelToken, Dispatcher, RunReport};
use std::sync::Arc;
use tempfile::TempDir;

use crate::cli::{compress, discover, SourceArgs};

/// Marker left in sample configs and `.env` templates.
const PLACEHOLDER: &str = "YOUR_WEBHOOK";

fn webhook_url(cfg: &UploadConfig) -> Result<&str> {
    let url = cfg
        .webhook_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .context("no webhook URL: set WEBHOOK_URL, webhook_url in config.toml, or pass --webhook-url")?;
    if url.contains(PLACEHOLDER) {
        bail!("webhook URL is still the placeholder; replace it with a real webhook");
    }
    Ok(url)
}

pub async fn run_upload(cfg: &UploadConfig, source: &SourceArgs, recompress: bool) -> Result<bool> {
    let url = webhook_url(cfg)?;
    let transport = CurlTransport::new(url, cfg.transport_options())?;

    let candidates = discover::collect(source)?;
    if candidates.is_empty() {
        println!("No images to upload.");
        return Ok(true);
    }

    // Held until the run ends; dropping it removes the compressed copies.
    let (_scratch, candidates) = prepare(candidates, recompress).await?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .context("set Ctrl+C handler")?;

    let mut dispatcher = Dispatcher::new(Arc::new(transport), cfg.validator(), cfg.retry_policy())
        .with_cancel(cancel.clone());
    if let Some(path) = &cfg.outcome_log {
        let log = OutcomeLog::open(path)
            .with_context(|| format!("open outcome log {}", path.display()))?;
        dispatcher = dispatcher.with_outcome_log(log);
    }

    let limit = concurrency_for(candidates.len(), cfg.max_workers);
    println!(
        "Uploading {} file(s) with up to {} worker(s)...",
        candidates.len(),
        limit
    );
    let report = tokio::task::spawn_blocking(move || dispatcher.run_detailed(candidates, limit))
        .await
        .context("upload task failed")?;

    print_report(&report, cancel.is_cancelled());
    Ok(report.metrics.failed == 0 && report.not_started == 0)
}

/// Re-encodes on the blocking pool when asked; decoding is CPU-bound.
async fn prepare(
    candidates: Vec<Candidate>,
    recompress: bool,
) -> Result<(Option<TempDir>, Vec<Candidate>)> {
    if !recompress {
        return Ok((None, candidates));
    }
    let (dir, compressed) = tokio::task::spawn_blocking(move || compress::compress_all(candidates))
        .await
        .context("compression task failed")??;
    tracing::info!("compressed copies in {}", dir.path().display());
    Ok((Some(dir), compressed))
}

fn print_report(report: &RunReport, cancelled: bool) {
    if cancelled {
        println!("Interrupted; {} file(s) never started.", report.not_started);
    }
    for (candidate, reason) in &report.failures {
        println!("  failed: {} ({})", candidate, reason);
    }
    if report.resubmitted > 0 {
        println!("Resubmitted {} file(s) after the first pass.", report.resubmitted);
    }
    println!(
        "Done in {:.1}s: {}",
        report.elapsed.as_secs_f64(),
        report.metrics
    );
}
