use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use common::RemoteLlmConfig;

use super::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Remote LLM provider using an OpenAI-compatible HTTP API (OpenAI, Groq, ...)
pub struct RemoteLlmProvider {
    base_url: String,
    api_key: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    default_temperature: f32,
    client: reqwest::Client,
}

impl RemoteLlmProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            default_timeout: Duration::from_secs(30),
            default_max_tokens: 500,
            default_temperature: 0.7,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(
        mut self,
        timeout_secs: u64,
        max_tokens: usize,
        temperature: f32,
    ) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }

    /// Build a provider from config, reading the API key from the named env var.
    pub fn from_config(cfg: &RemoteLlmConfig) -> Result<Self> {
        let api_key_env = cfg
            .api_key_env
            .as_deref()
            .context("Missing api_key_env in LLM config")?;
        let api_key = common::secret_from_env(Some(api_key_env))
            .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

        let provider = Self::new(
            cfg.api_url.clone().unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key,
            cfg.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        )
        .with_defaults(
            cfg.timeout_seconds.unwrap_or(30),
            cfg.max_tokens.unwrap_or(500),
            cfg.temperature.unwrap_or(0.7),
        );
        Ok(provider)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl LlmProvider for RemoteLlmProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let timeout = request.timeout_seconds.map_or(self.default_timeout, Duration::from_secs);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: &request.prompt });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens.unwrap_or(self.default_max_tokens),
            temperature: request.temperature.unwrap_or(self.default_temperature),
            response_format: request.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        // The whole exchange, body included, must fit in the timeout
        let completion = tokio::time::timeout(timeout, self.complete(&body))
            .await
            .context("LLM request timed out")??;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .context("LLM response has no choices")?;

        let usage = completion.usage.unwrap_or_default();
        let usage = UsageMetadata {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        };

        tracing::debug!(
            model = %self.model,
            total_tokens = usage.total_tokens,
            json_mode = request.json_mode,
            "LLM completion received"
        );

        Ok(LlmResponse {
            content: choice.message.content.trim().to_string(),
            usage,
            model: completion.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

impl RemoteLlmProvider {
    async fn complete(&self, body: &ChatRequest<'_>) -> Result<ChatCompletion> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .context("LLM HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error {}: {}", status, text);
        }

        response.json().await.context("Failed to parse LLM response")
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenCounts>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Default, Deserialize)]
struct TokenCounts {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
    #[serde(default)]
    total_tokens: usize,
}
