use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Only the Gemini key is a secret; everything else has a default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Read once at startup. Missing is not fatal here: the first evaluation
    /// call degrades with an error message instead.
    pub google_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub evaluation_timeout: Duration,
    pub speech_timeout: Duration,
    pub tts_lang: String,
    pub pdftoppm_path: PathBuf,
    pub max_upload_bytes: usize,
    /// Sessions untouched for this long are dropped with their upload.
    pub session_idle_timeout: Duration,
    pub session_sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            google_api_key: optional_env("GOOGLE_API_KEY"),
            port: parse_env("PORT", 8501)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            evaluation_timeout: Duration::from_secs(parse_env("EVALUATION_TIMEOUT_SECS", 120)?),
            speech_timeout: Duration::from_secs(parse_env("SPEECH_TIMEOUT_SECS", 60)?),
            tts_lang: optional_env("TTS_LANG").unwrap_or_else(|| "en".to_string()),
            pdftoppm_path: optional_env("PDFTOPPM_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("pdftoppm")),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            session_idle_timeout: Duration::from_secs(parse_env("SESSION_IDLE_TIMEOUT_SECS", 3600)?),
            session_sweep_interval: Duration::from_secs(parse_env(
                "SESSION_SWEEP_INTERVAL_SECS",
                60u64,
            )?
            .max(1)),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Defaults without touching the process environment.
    pub fn for_tests() -> Self {
        Config {
            google_api_key: None,
            port: 0,
            rust_log: "debug".to_string(),
            evaluation_timeout: Duration::from_secs(5),
            speech_timeout: Duration::from_secs(5),
            tts_lang: "en".to_string(),
            pdftoppm_path: PathBuf::from("pdftoppm"),
            max_upload_bytes: 1024 * 1024,
            session_idle_timeout: Duration::from_secs(60),
            session_sweep_interval: Duration::from_secs(10),
        }
    }
}
