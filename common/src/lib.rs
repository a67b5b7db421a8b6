/*!
common/src/lib.rs

Shared configuration types and helpers for PostGenius.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default file with an optional override
- Secret resolution from environment variables named in the config
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// HTTP server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Origins allowed to call the API from a browser (CORS)
    pub allowed_origins: Option<Vec<String>>,
}

/// Remote LLM endpoint (any OpenAI-compatible chat completion API)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

impl RemoteLlmConfig {
    /// Fill every unset field from `base`.
    pub fn or_from(&self, base: &RemoteLlmConfig) -> RemoteLlmConfig {
        RemoteLlmConfig {
            api_url: self.api_url.clone().or_else(|| base.api_url.clone()),
            api_key_env: self.api_key_env.clone().or_else(|| base.api_key_env.clone()),
            model: self.model.clone().or_else(|| base.model.clone()),
            timeout_seconds: self.timeout_seconds.or(base.timeout_seconds),
            max_tokens: self.max_tokens.or(base.max_tokens),
            temperature: self.temperature.or(base.temperature),
        }
    }
}

/// LLM top-level config: a shared `remote` endpoint plus task-specific overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub remote: Option<RemoteLlmConfig>,
    /// Prompt metadata extraction / translation
    pub enrichment: Option<RemoteLlmConfig>,
    /// Summaries and social posts
    pub content: Option<RemoteLlmConfig>,
    /// Video descriptions
    pub video_prompt: Option<RemoteLlmConfig>,
}

impl LlmConfig {
    pub fn enrichment(&self) -> Option<RemoteLlmConfig> {
        self.resolve(self.enrichment.as_ref())
    }

    pub fn content(&self) -> Option<RemoteLlmConfig> {
        self.resolve(self.content.as_ref())
    }

    pub fn video_prompt(&self) -> Option<RemoteLlmConfig> {
        self.resolve(self.video_prompt.as_ref())
    }

    fn resolve(&self, task: Option<&RemoteLlmConfig>) -> Option<RemoteLlmConfig> {
        match (task, self.remote.as_ref()) {
            (Some(t), Some(base)) => Some(t.or_from(base)),
            (Some(t), None) => Some(t.clone()),
            (None, base) => base.cloned(),
        }
    }
}

/// NewsAPI `/v2/everything` search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsApiConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub page_size: Option<u32>,
    pub language: Option<String>,
    pub sort_by: Option<String>,
    pub lookback_days: Option<i64>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Reddit application-only OAuth search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedditConfig {
    pub token_url: Option<String>,
    pub search_url: Option<String>,
    pub client_id_env: Option<String>,
    pub secret_env: Option<String>,
    pub user_agent: Option<String>,
    pub posts_limit: Option<u32>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Document formatting options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub max_content_chars: Option<usize>,
    pub language: Option<String>,
}

/// Vectara RAG store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectaraConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub corpus_key: Option<String>,
    pub query_limit: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

/// Image generation (OpenAI images API)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub placeholder: Option<String>,
}

/// Meme captioning (Imgflip)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemeConfig {
    pub api_url: Option<String>,
    pub username_env: Option<String>,
    pub password_env: Option<String>,
    pub placeholder: Option<String>,
}

/// Image-to-video generation (RunwayML)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub api_version: Option<String>,
    pub model: Option<String>,
    pub duration: Option<u32>,
    pub ratio: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub max_polls: Option<u32>,
    pub placeholder: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub llm: Option<LlmConfig>,
    pub newsapi: Option<NewsApiConfig>,
    pub reddit: Option<RedditConfig>,
    pub retrieval: Option<RetrievalConfig>,
    pub vectara: Option<VectaraConfig>,
    pub image: Option<ImageConfig>,
    pub meme: Option<MemeConfig>,
    pub video: Option<VideoConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Every configured endpoint must be an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        let llm = self.llm.as_ref();
        let endpoints = [
            ("llm.remote.api_url", llm.and_then(|l| l.remote.as_ref()).and_then(|r| r.api_url.as_deref())),
            ("llm.enrichment.api_url", llm.and_then(|l| l.enrichment.as_ref()).and_then(|r| r.api_url.as_deref())),
            ("llm.content.api_url", llm.and_then(|l| l.content.as_ref()).and_then(|r| r.api_url.as_deref())),
            ("llm.video_prompt.api_url", llm.and_then(|l| l.video_prompt.as_ref()).and_then(|r| r.api_url.as_deref())),
            ("newsapi.api_url", self.newsapi.as_ref().and_then(|n| n.api_url.as_deref())),
            ("reddit.token_url", self.reddit.as_ref().and_then(|r| r.token_url.as_deref())),
            ("reddit.search_url", self.reddit.as_ref().and_then(|r| r.search_url.as_deref())),
            ("vectara.api_url", self.vectara.as_ref().and_then(|v| v.api_url.as_deref())),
            ("image.api_url", self.image.as_ref().and_then(|i| i.api_url.as_deref())),
            ("meme.api_url", self.meme.as_ref().and_then(|m| m.api_url.as_deref())),
            ("video.api_url", self.video.as_ref().and_then(|v| v.api_url.as_deref())),
        ];

        for (key, value) in endpoints {
            if let Some(raw) = value {
                let parsed = url::Url::parse(raw)
                    .with_context(|| format!("Invalid URL for {}: {}", key, raw))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    anyhow::bail!("Unsupported scheme for {}: {}", key, raw);
                }
            }
        }
        Ok(())
    }
}

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

/// Read a secret from the environment variable named in the config.
/// Unset names, unset variables and blank values all yield `None`.
pub fn secret_from_env(var_name: Option<&str>) -> Option<String> {
    let name = var_name?;
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Convenience: sleep helper used by polling loops (kept public for tests)
pub async fn sleep_millis(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
