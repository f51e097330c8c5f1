/*!
common/src/lib.rs

Shared configuration types and helpers for newsposter.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default file with an optional override file
- Small helpers to resolve secrets from environment variables and validate schedule times
*/

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// HTTP server section (`[server]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Section scraping / fetch behaviour (`[scraping]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    /// Listing page template; `{category}` is replaced by the request category
    pub section_url_template: String,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub user_agent: Option<String>,
    /// Reduce listing markup to `headline | url` lines before prompting
    pub condense_listing: Option<bool>,
}

impl ScrapingConfig {
    /// Build the listing URL for a category.
    pub fn section_url(&self, category: &str) -> String {
        section_url(&self.section_url_template, category)
    }
}

/// Substitute `{category}` in a listing URL template.
pub fn section_url(template: &str, category: &str) -> String {
    template.replace("{category}", category.trim().trim_matches('/'))
}

/// Completion endpoint config (shared by the gemini and OpenAI-compatible adapters)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// LLM top-level config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "gemini", "remote"
    pub gemini: Option<RemoteLlmConfig>,
    pub remote: Option<RemoteLlmConfig>,
}

/// Single image provider endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageProviderConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    /// Vyro only
    pub style: Option<String>,
    /// Vyro only
    pub aspect_ratio: Option<String>,
    /// Stability only
    pub output_format: Option<String>,
}

/// Image generation section (`[image]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub provider: Option<String>, // "stability", "huggingface", "vyro"
    pub output_dir: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub stability: Option<ImageProviderConfig>,
    pub huggingface: Option<ImageProviderConfig>,
    pub vyro: Option<ImageProviderConfig>,
}

/// LinkedIn publishing section (`[linkedin]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    pub api_base: Option<String>,
    pub access_token_env: Option<String>,
    pub profile_id_env: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Pipeline behaviour switches (`[pipeline]`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub sanitize_post: Option<bool>,
}

/// One daily job (`[[scheduler.jobs]]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub id: String,
    pub name: Option<String>,
    /// Local wall-clock time in "HH:MM" 24h format
    pub time: String,
    pub category: String,
    pub prompt: String,
}

/// Scheduler section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub scraping: ScrapingConfig,
    pub llm: LlmConfig,
    pub image: ImageConfig,
    pub linkedin: LinkedInConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would only fail later at runtime.
    pub fn validate(&self) -> Result<()> {
        if !self.scraping.section_url_template.contains("{category}") {
            anyhow::bail!("scraping.section_url_template must contain a {{category}} placeholder");
        }
        url::Url::parse(&self.scraping.section_url("probe"))
            .context("scraping.section_url_template is not a valid URL")?;
        for job in &self.scheduler.jobs {
            parse_daily_time(&job.time)
                .with_context(|| format!("invalid time for scheduler job '{}'", job.id))?;
        }
        Ok(())
    }
}

/// Arrays are replaced wholesale by the override; tables are merged key by key.
fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Parse a "HH:MM" wall-clock time.
pub fn parse_daily_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("expected HH:MM, got '{}'", s))
}

/// Read a secret from the environment variable named by a config key.
pub fn secret_from_env(env_name: Option<&str>, key: &str) -> Result<String> {
    let env_name = env_name.ok_or_else(|| anyhow::anyhow!("Missing {} in configuration", key))?;
    let value = std::env::var(env_name)
        .with_context(|| format!("environment variable '{}' ({}) not set", env_name, key))?;
    if value.trim().is_empty() {
        anyhow::bail!("environment variable '{}' ({}) is empty", env_name, key);
    }
    Ok(value)
}
