use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_GENERATION_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_ATTACHMENT_LIMIT_MB: u64 = 20;
const DEFAULT_WORKSPACE_IDLE_MINUTES: u64 = 120;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub generation_api_url: String,
    pub generation_timeout_secs: u64,
    /// Default aggregate attachment ceiling, in bytes. Tool profiles may override it.
    pub attachment_limit_bytes: u64,
    pub roster_path: Option<PathBuf>,
    /// Workspaces untouched for longer than this are evicted.
    pub workspace_idle_minutes: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let attachment_limit_mb: u64 = optional_env("ATTACHMENT_LIMIT_MB")
            .map(|v| v.parse())
            .transpose()
            .context("ATTACHMENT_LIMIT_MB must be a whole number of megabytes")?
            .unwrap_or(DEFAULT_ATTACHMENT_LIMIT_MB);

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            generation_api_url: optional_env("GENERATION_API_URL")
                .unwrap_or_else(|| DEFAULT_GENERATION_API_URL.to_string()),
            generation_timeout_secs: optional_env("GENERATION_TIMEOUT_SECS")
                .map(|v| v.parse())
                .transpose()
                .context("GENERATION_TIMEOUT_SECS must be a number of seconds")?
                .unwrap_or(120),
            attachment_limit_bytes: attachment_limit_mb * 1024 * 1024,
            roster_path: optional_env("ROSTER_PATH").map(PathBuf::from),
            workspace_idle_minutes: optional_env("WORKSPACE_IDLE_MINUTES")
                .map(|v| v.parse())
                .transpose()
                .context("WORKSPACE_IDLE_MINUTES must be a whole number of minutes")?
                .unwrap_or(DEFAULT_WORKSPACE_IDLE_MINUTES),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
