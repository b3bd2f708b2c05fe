use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub session_token: String,
    pub session_cookie_name: String,
    pub user_id: String,
    pub user_email: Option<String>,
    pub rust_log: String,
    pub sync: SyncConfig,
}

/// Timing knobs of the save protocol. All of them are tunable; the defaults
/// keep bullet edits near-immediate and batch everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub immediate_debounce: Duration,
    pub critical_debounce: Duration,
    pub routine_debounce: Duration,
    /// Floor between the end of one successful save and the start of the next.
    pub min_save_interval: Duration,
    /// Total attempts per save, first try included.
    pub max_save_attempts: u32,
    /// Linear backoff unit: retry `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
    pub saved_display: Duration,
    pub error_display: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            immediate_debounce: Duration::ZERO,
            critical_debounce: Duration::from_millis(300),
            routine_debounce: Duration::from_millis(1500),
            min_save_interval: Duration::from_millis(1000),
            max_save_attempts: 3,
            retry_backoff: Duration::from_millis(1000),
            saved_display: Duration::from_millis(2000),
            error_display: Duration::from_millis(5000),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            base_url: require_env("BULLET_BUILDER_URL")?,
            session_token: require_env("SESSION_TOKEN")?,
            session_cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "next-auth.session-token".to_string()),
            user_id: require_env("USER_ID")?,
            user_email: std::env::var("USER_EMAIL").ok(),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            sync: SyncConfig::from_env()?,
        })
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(SyncConfig {
            immediate_debounce: env_millis("SYNC_IMMEDIATE_DEBOUNCE_MS", defaults.immediate_debounce)?,
            critical_debounce: env_millis("SYNC_CRITICAL_DEBOUNCE_MS", defaults.critical_debounce)?,
            routine_debounce: env_millis("SYNC_ROUTINE_DEBOUNCE_MS", defaults.routine_debounce)?,
            min_save_interval: env_millis("SYNC_MIN_SAVE_INTERVAL_MS", defaults.min_save_interval)?,
            max_save_attempts: match std::env::var("SYNC_MAX_SAVE_ATTEMPTS") {
                Ok(v) => v
                    .parse::<u32>()
                    .context("SYNC_MAX_SAVE_ATTEMPTS must be a positive integer")?
                    .max(1),
                Err(_) => defaults.max_save_attempts,
            },
            retry_backoff: env_millis("SYNC_RETRY_BACKOFF_MS", defaults.retry_backoff)?,
            saved_display: env_millis("SYNC_SAVED_DISPLAY_MS", defaults.saved_display)?,
            error_display: env_millis("SYNC_ERROR_DISPLAY_MS", defaults.error_display)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_millis(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<u64>()
            .map(Duration::from_millis)
            .with_context(|| format!("{key} must be a number of milliseconds")),
        Err(_) => Ok(default),
    }
}
