//! CLI for the hookdrop webhook uploader.

mod commands;
mod compress;
mod discover;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hookdrop_core::config::{self, UploadConfig};
use std::path::{Path, PathBuf};

use commands::{run_check, run_config, run_upload};

/// Top-level CLI for hookdrop.
#[derive(Debug, Parser)]
#[command(name = "hookdrop")]
#[command(about = "hookdrop: validated, rate-limit aware image uploads to a webhook", long_about = None)]
pub struct Cli {
    /// Read configuration from FILE instead of ~/.config/hookdrop/config.toml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Where the files come from.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Files to process. When empty, `--folder` is scanned instead.
    pub paths: Vec<PathBuf>,

    /// Folder scanned recursively for images when no paths are given.
    #[arg(long, default_value = "images", value_name = "DIR")]
    pub folder: PathBuf,

    /// Pick a single random file from the selection.
    #[arg(long)]
    pub random: bool,
}

/// Validation overrides; unset flags keep config/env values.
#[derive(Debug, Clone, Default, Args)]
pub struct LimitArgs {
    /// Smallest accepted file size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub min_size: Option<u64>,
    /// Largest accepted file size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<u64>,
    #[arg(long, value_name = "PX")]
    pub min_width: Option<u32>,
    #[arg(long, value_name = "PX")]
    pub min_height: Option<u32>,
}

impl LimitArgs {
    pub fn apply(&self, cfg: &mut UploadConfig) {
        if self.min_size.is_none()
            && self.max_size.is_none()
            && self.min_width.is_none()
            && self.min_height.is_none()
        {
            return;
        }
        let mut v = cfg.validation_or_default();
        if let Some(n) = self.min_size {
            v.min_size = n;
        }
        if let Some(n) = self.max_size {
            v.max_size = n;
        }
        if let Some(n) = self.min_width {
            v.min_width = n;
        }
        if let Some(n) = self.min_height {
            v.min_height = n;
        }
        cfg.validation = Some(v);
    }
}

#[derive(Debug, Clone, Args)]
pub struct UploadArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub limits: LimitArgs,

    /// Destination webhook URL (overrides WEBHOOK_URL and config).
    #[arg(long, value_name = "URL")]
    pub webhook_url: Option<String>,

    /// Upper bound on concurrent uploads.
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Retries per file after transient errors.
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// First backoff delay in seconds; doubles per retry.
    #[arg(long, value_name = "SECS")]
    pub backoff_delay: Option<f64>,

    /// Re-encode JPEG/PNG files as JPEG (quality 85) before sending. Originals are untouched.
    #[arg(long)]
    pub compress: bool,

    /// Append one JSON line per finished file to FILE.
    #[arg(long, value_name = "FILE")]
    pub outcome_log: Option<PathBuf>,
}

impl UploadArgs {
    pub fn apply(&self, cfg: &mut UploadConfig) {
        self.limits.apply(cfg);
        if let Some(url) = &self.webhook_url {
            cfg.webhook_url = Some(url.trim().to_string());
        }
        if let Some(n) = self.max_workers {
            cfg.max_workers = n;
        }
        if self.max_retries.is_some() || self.backoff_delay.is_some() {
            let mut r = cfg.retry_or_default();
            if let Some(n) = self.max_retries {
                r.max_retries = n;
            }
            if let Some(secs) = self.backoff_delay {
                r.base_delay_secs = secs;
            }
            cfg.retry = Some(r);
        }
        if let Some(path) = &self.outcome_log {
            cfg.outcome_log = Some(path.clone());
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Validate and upload images to the webhook.
    Upload(UploadArgs),

    /// Dry run: validate files and report what would be skipped.
    Check {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Show the config file path and effective settings.
    Config,
}

/// File, then `.env` / environment, on top of defaults.
fn load_config(path: Option<&Path>) -> Result<UploadConfig> {
    config::load_dotenv();
    let mut cfg = match path {
        Some(p) => config::load_from_path(p)?,
        None => config::load_or_init()?,
    };
    cfg.apply_env().context("apply environment overrides")?;
    Ok(cfg)
}

impl CliCommand {
    /// Returns `Ok(false)` when the run finished but some files failed.
    pub async fn run_from_args() -> Result<bool> {
        let cli = Cli::parse();
        let mut cfg = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Upload(args) => {
                args.apply(&mut cfg);
                run_upload(&cfg, &args.source, args.compress).await
            }
            CliCommand::Check { source, limits } => {
                limits.apply(&mut cfg);
                run_check(&cfg, &source)
            }
            CliCommand::Config => {
                let path = match cli.config {
                    Some(p) => p,
                    None => config::config_path()?,
                };
                run_config(&cfg, &path)?;
                Ok(true)
            }
        }
    }
}
