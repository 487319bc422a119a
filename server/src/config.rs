use std::env;

use anyhow::{Context as _, Result};

/// Process configuration, read once at startup and passed down explicitly.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Deployment region label echoed in chat responses.
    pub region: String,
    pub history_ttl_secs: u64,
    pub document_ttl_secs: u64,
}

const WEEK_SECS: u64 = 7 * 24 * 3600;

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("invalid PORT")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            gemini_api_key: env::var("GEMINI_API_KEY").context("GEMINI_API_KEY not set")?,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            region: env::var("REGION").unwrap_or_else(|_| "unknown".to_string()),
            history_ttl_secs: env::var("HISTORY_TTL_SECS")
                .unwrap_or_else(|_| WEEK_SECS.to_string())
                .parse()
                .context("invalid HISTORY_TTL_SECS")?,
            document_ttl_secs: env::var("DOCUMENT_TTL_SECS")
                .unwrap_or_else(|_| WEEK_SECS.to_string())
                .parse()
                .context("invalid DOCUMENT_TTL_SECS")?,
        })
    }
}
