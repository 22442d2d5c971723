//! # Bot Configuration Module
//!
//! This module defines the runtime configuration of the bot: platform file
//! limits, workspace location, external tool locations and retry settings.
//! Everything is read from the environment (optionally via a `.env` file).

use anyhow::{Context, Result};
use rand::Rng;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Largest file the Bot API lets a bot download (20 MiB)
pub const MAX_FILESIZE_DOWNLOAD: u64 = 20 * 1024 * 1024;
/// Largest file the Bot API lets a bot upload (50 MiB)
pub const MAX_FILESIZE_UPLOAD: u64 = 50 * 1024 * 1024;

pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;
pub const DEFAULT_MAX_PASSWORD_ATTEMPTS: u32 = 10;
pub const DEFAULT_QPDF_BIN: &str = "qpdf";
pub const DEFAULT_HTML_TO_PDF_BIN: &str = "wkhtmltopdf";

/// Retry settings for calls against the messaging platform
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first failure
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for a single download in seconds
    pub download_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            download_timeout_secs: 45,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff for retry `attempt` (0-based), capped, plus up
    /// to 25% random jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_retry_delay_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.max_retry_delay_ms);
        let jitter = rand::thread_rng().gen_range(0..=exponential / 4);
        Duration::from_millis(exponential + jitter)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Webhook settings, present only when `APP_URL` is configured
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub app_url: String,
    pub port: u16,
}

impl WebhookConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Configuration structure for the bot
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot API token
    pub token: String,
    /// Webhook mode when set, long polling otherwise
    pub webhook: Option<WebhookConfig>,
    /// Root directory for step workspaces, system temp dir when `None`
    pub temp_dir: Option<PathBuf>,
    /// Maximum size of a file the bot accepts
    pub max_download_size: u64,
    /// Maximum size of a file the bot sends back
    pub max_upload_size: u64,
    /// Wrong decryption passwords tolerated before the conversation ends
    pub max_password_attempts: u32,
    /// qpdf binary used for encryption and decryption
    pub qpdf_bin: String,
    /// HTML to PDF converter used for web pages
    pub html_to_pdf_bin: String,
    /// Directory holding `<lang>/main.ftl` files
    pub locales_dir: PathBuf,
    pub retry: RetryConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            webhook: None,
            temp_dir: None,
            max_download_size: MAX_FILESIZE_DOWNLOAD,
            max_upload_size: MAX_FILESIZE_UPLOAD,
            max_password_attempts: DEFAULT_MAX_PASSWORD_ATTEMPTS,
            qpdf_bin: DEFAULT_QPDF_BIN.to_string(),
            html_to_pdf_bin: DEFAULT_HTML_TO_PDF_BIN.to_string(),
            locales_dir: default_locales_dir(),
            retry: RetryConfig::default(),
        }
    }
}

impl BotConfig {
    /// Build the configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;

        let webhook = match env::var("APP_URL") {
            Ok(app_url) if !app_url.trim().is_empty() => {
                let port = match env::var("PORT") {
                    Ok(port) => port.parse().context("PORT must be a valid port number")?,
                    Err(_) => DEFAULT_WEBHOOK_PORT,
                };
                Some(WebhookConfig {
                    app_url: app_url.trim_end_matches('/').to_string(),
                    port,
                })
            }
            _ => None,
        };

        let max_password_attempts = match env::var("MAX_PASSWORD_ATTEMPTS") {
            Ok(value) => value
                .parse()
                .context("MAX_PASSWORD_ATTEMPTS must be a positive integer")?,
            Err(_) => DEFAULT_MAX_PASSWORD_ATTEMPTS,
        };

        let defaults = Self::default();
        Ok(Self {
            token,
            webhook,
            temp_dir: env::var("TEMP_DIR").ok().map(PathBuf::from),
            max_password_attempts,
            qpdf_bin: env::var("QPDF_BIN").unwrap_or(defaults.qpdf_bin),
            html_to_pdf_bin: env::var("HTML_TO_PDF_BIN").unwrap_or(defaults.html_to_pdf_bin),
            locales_dir: env::var("LOCALES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.locales_dir),
            ..defaults
        })
    }
}

fn default_locales_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/locales"))
}
