use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::anthropic::{DEFAULT_FALLBACK_MODEL, DEFAULT_PRIMARY_MODEL};
use crate::pipeline::retry::RetryOptions;
use crate::pipeline::{ModelRoster, ResearchSettings};

/// Application configuration loaded from environment variables.
///
/// Vendor keys are optional at startup; a pipeline that needs a missing key
/// fails with a configuration error on its first call.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub redis_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub llm_timeout: Duration,
    pub retry: RetryOptions,
    pub research_top_n: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| optional(key).unwrap_or_else(|| default.to_string());

        let retry = RetryOptions {
            max_retries: parse(&or_default("RETRY_MAX_RETRIES", "3"), "RETRY_MAX_RETRIES")?,
            base_delay: Duration::from_millis(parse(
                &or_default("RETRY_BASE_DELAY_MS", "1000"),
                "RETRY_BASE_DELAY_MS",
            )?),
            max_delay: Duration::from_millis(parse(
                &or_default("RETRY_MAX_DELAY_MS", "16000"),
                "RETRY_MAX_DELAY_MS",
            )?),
        };

        Ok(Config {
            anthropic_api_key: optional("ANTHROPIC_API_KEY"),
            search_api_key: optional("SEARCH_API_KEY"),
            redis_url: optional("REDIS_URL"),
            port: parse(&or_default("PORT", "8080"), "PORT")?,
            rust_log: or_default("RUST_LOG", "info"),
            primary_model: or_default("PRIMARY_MODEL", DEFAULT_PRIMARY_MODEL),
            fallback_model: or_default("FALLBACK_MODEL", DEFAULT_FALLBACK_MODEL),
            llm_timeout: Duration::from_secs(parse(
                &or_default("LLM_TIMEOUT_SECS", "120"),
                "LLM_TIMEOUT_SECS",
            )?),
            retry,
            research_top_n: parse(&or_default("RESEARCH_TOP_N", "15"), "RESEARCH_TOP_N")?,
        })
    }

    pub fn models(&self) -> ModelRoster {
        ModelRoster {
            primary: self.primary_model.clone(),
            fallback: self.fallback_model.clone(),
        }
    }

    pub fn research(&self) -> ResearchSettings {
        ResearchSettings {
            top_n: self.research_top_n,
            ..ResearchSettings::default()
        }
    }
}

fn parse<T>(value: &str, key: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("{key} must be a valid number, got '{value}'"))
}
