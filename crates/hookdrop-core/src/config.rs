use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::transport::TransportOptions;
use crate::validate::Validator;

/// File size and pixel limits (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Smallest accepted file, in bytes (inclusive).
    pub min_size: u64,
    /// Largest accepted file, in bytes (inclusive).
    pub max_size: u64,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let v = Validator::default();
        Self {
            min_size: v.min_size,
            max_size: v.max_size,
            min_width: v.min_width,
            min_height: v.min_height,
        }
    }
}

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after transient errors (not counting the first attempt).
    pub max_retries: u32,
    /// First backoff in seconds; doubles per retry (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
    /// Wait after a 429 that carries no retry hint.
    pub rate_limit_cooldown_secs: f64,
    /// Rate-limit waits allowed per file before it is set aside.
    pub max_rate_limit_waits: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_secs: 5.0,
            max_delay_secs: 60,
            rate_limit_cooldown_secs: 15.0,
            max_rate_limit_waits: 10,
        }
    }
}

/// Global configuration loaded from `~/.config/hookdrop/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Destination webhook; usually supplied via `WEBHOOK_URL` or `--webhook-url`.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Upper bound on concurrent uploads; the actual count also scales with batch size.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Hard timeout for one upload request, in seconds.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Optional JSON-lines file receiving one record per finished file.
    #[serde(default)]
    pub outcome_log: Option<PathBuf>,
    /// Optional validation limits; if missing, built-in defaults are used.
    #[serde(default)]
    pub validation: Option<ValidationConfig>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_max_workers() -> usize {
    10
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            max_workers: default_max_workers(),
            request_timeout_secs: None,
            outcome_log: None,
            validation: None,
            retry: None,
        }
    }
}

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

fn secs(value: f64, fallback: Duration) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(fallback)
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("invalid value for {}: {:?}", name, raw))
}

impl UploadConfig {
    pub fn validation_or_default(&self) -> ValidationConfig {
        self.validation.clone().unwrap_or_default()
    }

    pub fn retry_or_default(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn validator(&self) -> Validator {
        let v = self.validation_or_default();
        Validator {
            min_size: v.min_size,
            max_size: v.max_size,
            min_width: v.min_width,
            min_height: v.min_height,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let r = self.retry_or_default();
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_retries: r.max_retries,
            base_delay: secs(r.base_delay_secs, defaults.base_delay),
            max_delay: Duration::from_secs(r.max_delay_secs),
            max_rate_limit_waits: r.max_rate_limit_waits,
        }
    }

    pub fn transport_options(&self) -> TransportOptions {
        let defaults = TransportOptions::default();
        TransportOptions {
            request_timeout: Duration::from_secs(
                self.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            rate_limit_cooldown: secs(
                self.retry_or_default().rate_limit_cooldown_secs,
                defaults.rate_limit_cooldown,
            ),
            ..defaults
        }
    }

    /// Overlay environment variables (`WEBHOOK_URL`, `MAX_WORKERS`, `MIN_FILE_SIZE`,
    /// `MAX_FILE_SIZE`, `MIN_WIDTH`, `MIN_HEIGHT`, `MAX_RETRIES`, `RETRY_DELAY`,
    /// `COOLDOWN_TIME`) on top of file values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with an injectable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("WEBHOOK_URL").filter(|s| !s.trim().is_empty()) {
            self.webhook_url = Some(url.trim().to_string());
        }
        if let Some(raw) = lookup("MAX_WORKERS") {
            self.max_workers = parse_var("MAX_WORKERS", &raw)?;
        }

        let mut v = self.validation_or_default();
        let mut v_changed = false;
        if let Some(raw) = lookup("MIN_FILE_SIZE") {
            v.min_size = parse_var("MIN_FILE_SIZE", &raw)?;
            v_changed = true;
        }
        if let Some(raw) = lookup("MAX_FILE_SIZE") {
            v.max_size = parse_var("MAX_FILE_SIZE", &raw)?;
            v_changed = true;
        }
        if let Some(raw) = lookup("MIN_WIDTH") {
            v.min_width = parse_var("MIN_WIDTH", &raw)?;
            v_changed = true;
        }
        if let Some(raw) = lookup("MIN_HEIGHT") {
            v.min_height = parse_var("MIN_HEIGHT", &raw)?;
            v_changed = true;
        }
        if v_changed {
            self.validation = Some(v);
        }

        let mut r = self.retry_or_default();
        let mut r_changed = false;
        if let Some(raw) = lookup("MAX_RETRIES") {
            r.max_retries = parse_var("MAX_RETRIES", &raw)?;
            r_changed = true;
        }
        if let Some(raw) = lookup("RETRY_DELAY") {
            r.base_delay_secs = parse_var("RETRY_DELAY", &raw)?;
            r_changed = true;
        }
        if let Some(raw) = lookup("COOLDOWN_TIME") {
            r.rate_limit_cooldown_secs = parse_var("COOLDOWN_TIME", &raw)?;
            r_changed = true;
        }
        if r_changed {
            self.retry = Some(r);
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hookdrop")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load `.env` from the current directory (or a parent) if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("ignoring unreadable .env: {}", e),
    }
}

/// Load configuration from `path`.
pub fn load_from_path(path: &Path) -> Result<UploadConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: UploadConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<UploadConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = UploadConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}
