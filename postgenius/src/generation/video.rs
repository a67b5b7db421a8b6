use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use common::VideoConfig;

use crate::llm::{LlmProvider, LlmRequest};

use super::{truncate_with_ellipsis, PLACEHOLDER_VIDEO};

pub const DEFAULT_API_URL: &str = "https://api.dev.runwayml.com";
pub const DEFAULT_API_VERSION: &str = "2024-11-06";
pub const DEFAULT_VIDEO_PROMPT: &str = "Create a visually engaging video with a professional style.";
pub const MAX_PROMPT_CHARS: usize = 512;

const PROMPT_SYSTEM: &str = "You are an expert in generating creative video descriptions for AI models. \
Your task is to create a highly descriptive and visually engaging prompt \
for a video based on the provided summary and theme. The prompt must not exceed \
512 characters in length. Be concise yet detailed, adhering to this strict character limit.";

/// Task states reported by the RunwayML tasks API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Throttled,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Unknown(String),
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PENDING" => TaskStatus::Pending,
            "THROTTLED" => TaskStatus::Throttled,
            "RUNNING" => TaskStatus::Running,
            "SUCCEEDED" => TaskStatus::Succeeded,
            "FAILED" => TaskStatus::Failed,
            "CANCELLED" => TaskStatus::Cancelled,
            _ => TaskStatus::Unknown(raw.to_string()),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

/// Video description via LLM, then image-to-video via RunwayML.
pub struct VideoGenerator {
    prompt_llm: Option<Arc<dyn LlmProvider>>,
    client: Client,
    api_url: String,
    api_key: Option<String>,
    api_version: String,
    model: String,
    duration: u32,
    ratio: String,
    poll_interval_ms: u64,
    max_polls: u32,
    placeholder: String,
}

impl VideoGenerator {
    pub fn from_config(cfg: &VideoConfig, prompt_llm: Option<Arc<dyn LlmProvider>>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            prompt_llm,
            client,
            api_url: cfg
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: common::secret_from_env(cfg.api_key_env.as_deref()),
            api_version: cfg.api_version.clone().unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            model: cfg.model.clone().unwrap_or_else(|| "gen3a_turbo".to_string()),
            duration: cfg.duration.unwrap_or(10),
            ratio: cfg.ratio.clone().unwrap_or_else(|| "1280:768".to_string()),
            poll_interval_ms: cfg.poll_interval_ms.unwrap_or(5_000),
            max_polls: cfg.max_polls.unwrap_or(120),
            placeholder: cfg.placeholder.clone().unwrap_or_else(|| PLACEHOLDER_VIDEO.to_string()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Ask the LLM for a video description of at most 512 characters.
    pub async fn video_prompt(&self, summary: &str, prompt: &str, tone: &str, platform: &str) -> String {
        if summary.trim().is_empty() {
            warn!("Summary is missing for video prompt generation.");
            return DEFAULT_VIDEO_PROMPT.to_string();
        }
        let Some(llm) = self.prompt_llm.as_ref() else {
            warn!("video prompt: no LLM configured");
            return DEFAULT_VIDEO_PROMPT.to_string();
        };

        let request = LlmRequest {
            system: Some(PROMPT_SYSTEM.to_string()),
            prompt: format!(
                "Summary: {}\nTheme: {}\nTone: {}\nPlatform: {}\n\
                 Generate a video description that is concise, visually detailed, \
                 aligned with the given tone, and strictly under 512 characters.",
                summary, prompt, tone, platform
            ),
            temperature: Some(0.7),
            max_tokens: Some(200),
            ..Default::default()
        };

        match llm.generate(request).await {
            Ok(resp) if !resp.content.is_empty() => {
                let text = truncate_with_ellipsis(&resp.content, MAX_PROMPT_CHARS);
                info!("Generated video prompt: {}", text);
                text
            }
            Ok(_) => {
                warn!("video prompt: LLM returned empty content");
                DEFAULT_VIDEO_PROMPT.to_string()
            }
            Err(e) => {
                warn!("Error generating video prompt: {:#}", e);
                DEFAULT_VIDEO_PROMPT.to_string()
            }
        }
    }

    /// Start an image-to-video task and wait for it. Placeholder on any failure.
    pub async fn generate(&self, prompt_text: &str, image_url: &str) -> String {
        if prompt_text.trim().is_empty() || !is_absolute_url(image_url) {
            warn!("Prompt text or image URL is missing for video generation.");
            return self.placeholder.clone();
        }
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("video: no RunwayML API key configured");
            return self.placeholder.clone();
        };

        match self.run_task(api_key, prompt_text, image_url).await {
            Ok(url) => {
                info!("Video generation completed. Video URL: {}", url);
                url
            }
            Err(e) => {
                error!("Error generating video: {:#}", e);
                self.placeholder.clone()
            }
        }
    }

    async fn run_task(&self, api_key: &str, prompt_text: &str, image_url: &str) -> Result<String> {
        let body = ImageToVideoRequest {
            model: &self.model,
            prompt_image: image_url,
            prompt_text,
            duration: self.duration,
            ratio: &self.ratio,
            watermark: false,
        };

        let response = self
            .client
            .post(format!("{}/v1/image_to_video", self.api_url))
            .bearer_auth(api_key)
            .header("X-Runway-Version", &self.api_version)
            .json(&body)
            .send()
            .await
            .context("RunwayML image_to_video request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("RunwayML error {}: {}", status, text);
        }

        let created: CreatedTask = response.json().await.context("Failed to parse RunwayML task")?;
        info!("Video generation task started. Task ID: {}", created.id);

        let task_url = format!("{}/v1/tasks/{}", self.api_url, created.id);
        for attempt in 1..=self.max_polls {
            let task: Task = self
                .client
                .get(&task_url)
                .bearer_auth(api_key)
                .header("X-Runway-Version", &self.api_version)
                .send()
                .await
                .context("RunwayML task request failed")?
                .error_for_status()
                .context("RunwayML task returned an error status")?
                .json()
                .await
                .context("Failed to parse RunwayML task status")?;

            let status = TaskStatus::parse(&task.status);
            if status.is_terminal() {
                return match status {
                    TaskStatus::Succeeded => task
                        .output
                        .into_iter()
                        .next()
                        .context("RunwayML task succeeded without output"),
                    status => Err(anyhow::anyhow!(
                        "Task {} ended with status {:?}: {}",
                        created.id,
                        status,
                        task.failure.unwrap_or_default()
                    )),
                };
            }

            info!("Task {} is still {:?} (poll {}/{}).", created.id, status, attempt, self.max_polls);
            if attempt < self.max_polls {
                common::sleep_millis(self.poll_interval_ms).await;
            }
        }

        anyhow::bail!("Task {} did not finish after {} polls", created.id, self.max_polls)
    }
}

fn is_absolute_url(s: &str) -> bool {
    url::Url::parse(s)
        .map(|u| u.scheme() == "http" || u.scheme() == "https")
        .unwrap_or(false)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageToVideoRequest<'a> {
    model: &'a str,
    prompt_image: &'a str,
    prompt_text: &'a str,
    duration: u32,
    ratio: &'a str,
    watermark: bool,
}

#[derive(Deserialize)]
struct CreatedTask {
    id: String,
}

#[derive(Deserialize)]
struct Task {
    status: String,
    #[serde(default)]
    output: Vec<String>,
    failure: Option<String>,
}
