use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use common::ImageConfig;

use super::PLACEHOLDER_IMAGE;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/images/generations";

/// Illustrations through the OpenAI images API (DALL·E 3).
pub struct ImageGenerator {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    size: String,
    quality: String,
    placeholder: String,
}

impl ImageGenerator {
    pub fn from_config(cfg: &ImageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            api_url: cfg.api_url.clone().unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: common::secret_from_env(cfg.api_key_env.as_deref()),
            model: cfg.model.clone().unwrap_or_else(|| "dall-e-3".to_string()),
            size: cfg.size.clone().unwrap_or_else(|| "1024x1024".to_string()),
            quality: cfg.quality.clone().unwrap_or_else(|| "standard".to_string()),
            placeholder: cfg.placeholder.clone().unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Generate an image URL, or the placeholder on any failure.
    pub async fn generate(&self, summary: &str, prompt: &str, tone: &str, platform: &str) -> String {
        if summary.trim().is_empty() {
            warn!("Empty summary for image generation.");
            return self.placeholder.clone();
        }
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("image: no API key configured");
            return self.placeholder.clone();
        };

        let detailed_prompt = format!(
            "Create an illustration for a {} post with a {} tone. \
             Base the design on the following summary: '{}'. \
             Ensure the image aligns with the theme: '{}'.",
            platform, tone, summary, prompt
        );

        match self.request(api_key, &detailed_prompt).await {
            Ok(url) => {
                info!("Image successfully generated: {}", url);
                url
            }
            Err(e) => {
                warn!("Error generating image: {:#}", e);
                self.placeholder.clone()
            }
        }
    }

    async fn request(&self, api_key: &str, prompt: &str) -> Result<String> {
        debug!("image: sending prompt: {}", prompt);
        let body = ImageRequest {
            model: &self.model,
            prompt,
            size: &self.size,
            quality: &self.quality,
            n: 1,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("Image HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Image API error {}: {}", status, text);
        }

        let parsed: ImageResponse = response.json().await.context("Failed to parse image response")?;
        parsed
            .data
            .into_iter()
            .find_map(|d| d.url)
            .filter(|u| !u.is_empty())
            .context("Image response has no URL")
    }
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}
