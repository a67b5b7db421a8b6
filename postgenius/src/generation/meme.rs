use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use common::MemeConfig;

use super::PLACEHOLDER_MEME;

pub const DEFAULT_API_URL: &str = "https://api.imgflip.com";

/// Captions the most popular Imgflip template with the summary.
pub struct MemeGenerator {
    client: Client,
    api_url: String,
    credentials: Option<(String, String)>,
    placeholder: String,
}

impl MemeGenerator {
    pub fn from_config(cfg: &MemeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .context("failed to build reqwest client")?;

        let username = common::secret_from_env(cfg.username_env.as_deref());
        let password = common::secret_from_env(cfg.password_env.as_deref());

        Ok(Self {
            client,
            api_url: cfg
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            credentials: username.zip(password),
            placeholder: cfg.placeholder.clone().unwrap_or_else(|| PLACEHOLDER_MEME.to_string()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    pub async fn generate(&self, summary: &str) -> String {
        if summary.trim().is_empty() {
            warn!("Empty summary for meme generation.");
            return self.placeholder.clone();
        }
        let Some((username, password)) = self.credentials.as_ref() else {
            warn!("meme: no Imgflip credentials configured");
            return self.placeholder.clone();
        };

        let template_id = match self.popular_template().await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to retrieve a meme template: {:#}", e);
                return self.placeholder.clone();
            }
        };

        let (text0, text1) = split_summary(summary);
        match self.caption(&template_id, username, password, &text0, &text1).await {
            Ok(url) => {
                info!("Generated meme URL: {}", url);
                url
            }
            Err(e) => {
                error!("Meme generation failed: {:#}", e);
                self.placeholder.clone()
            }
        }
    }

    async fn popular_template(&self) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/get_memes", self.api_url))
            .send()
            .await
            .context("Imgflip get_memes request failed")?
            .error_for_status()
            .context("Imgflip get_memes returned an error status")?;

        let body: GetMemesResponse = response.json().await.context("Failed to parse get_memes response")?;
        let id = body
            .data
            .and_then(|d| d.memes.into_iter().next())
            .map(|m| m.id)
            .context("Imgflip returned no meme templates")?;
        info!("Retrieved popular meme template ID: {}", id);
        Ok(id)
    }

    async fn caption(&self, template_id: &str, username: &str, password: &str, text0: &str, text1: &str) -> Result<String> {
        let form = [
            ("template_id", template_id),
            ("username", username),
            ("password", password),
            ("text0", text0),
            ("text1", text1),
        ];

        let response = self
            .client
            .post(format!("{}/caption_image", self.api_url))
            .form(&form)
            .send()
            .await
            .context("Imgflip caption_image request failed")?
            .error_for_status()
            .context("Imgflip caption_image returned an error status")?;

        let body: CaptionResponse = response.json().await.context("Failed to parse caption_image response")?;
        if !body.success {
            anyhow::bail!(
                "Imgflip API error: {}",
                body.error_message.unwrap_or_else(|| "unknown".to_string())
            );
        }
        body.data.map(|d| d.url).context("Imgflip response has no meme URL")
    }
}

/// Split on '.' into top text (first sentence) and bottom text (second sentence or empty).
pub fn split_summary(summary: &str) -> (String, String) {
    let mut parts = summary.split('.');
    let text0 = parts.next().unwrap_or(summary).trim().to_string();
    let text1 = parts.next().unwrap_or("").trim().to_string();
    debug!("Split summary into: text0='{}', text1='{}'", text0, text1);
    (text0, text1)
}

#[derive(Deserialize)]
struct GetMemesResponse {
    data: Option<MemeList>,
}

#[derive(Deserialize)]
struct MemeList {
    #[serde(default)]
    memes: Vec<MemeTemplate>,
}

#[derive(Deserialize)]
struct MemeTemplate {
    id: String,
}

#[derive(Deserialize)]
struct CaptionResponse {
    #[serde(default)]
    success: bool,
    data: Option<CaptionData>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct CaptionData {
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_first_two_sentences() {
        assert_eq!(
            split_summary("Cats rule. Dogs drool. Birds sing."),
            ("Cats rule".to_string(), "Dogs drool".to_string())
        );
    }

    #[test]
    fn single_sentence_has_empty_bottom() {
        assert_eq!(split_summary("No full stop here"), ("No full stop here".to_string(), String::new()));
        assert_eq!(split_summary("Ends with one."), ("Ends with one".to_string(), String::new()));
    }
}
