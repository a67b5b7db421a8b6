use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use common::NewsApiConfig;

use super::{clean_text, send_with_retry, ArticleSource, PublishedAt, RawArticle};
use crate::enrichment::EnrichedPrompt;

pub const DEFAULT_API_URL: &str = "https://newsapi.org/v2/everything";

/// NewsAPI `/v2/everything` search over the last few days.
pub struct NewsApiSource {
    client: Client,
    api_url: String,
    api_key: String,
    page_size: u32,
    language: String,
    sort_by: String,
    lookback_days: i64,
    max_retries: u32,
}

impl NewsApiSource {
    pub fn new(cfg: &NewsApiConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds.unwrap_or(10)))
            .user_agent("PostGenius/0.1.0")
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            api_url: cfg.api_url.clone().unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: api_key.into(),
            page_size: cfg.page_size.unwrap_or(1),
            language: cfg.language.clone().unwrap_or_else(|| "en".to_string()),
            sort_by: cfg.sort_by.clone().unwrap_or_else(|| "relevancy".to_string()),
            lookback_days: cfg.lookback_days.unwrap_or(7),
            max_retries: cfg.max_retries.unwrap_or(3),
        })
    }

    /// Build from config when the API key env var is set.
    pub fn from_config(cfg: &NewsApiConfig) -> Result<Option<Self>> {
        match common::secret_from_env(cfg.api_key_env.as_deref()) {
            Some(key) => Ok(Some(Self::new(cfg, key)?)),
            None => Ok(None),
        }
    }

    pub async fn fetch(&self, query: &str) -> Result<Vec<RawArticle>> {
        let now = Utc::now();
        let from = now - ChronoDuration::days(self.lookback_days);
        let from = from.to_rfc3339_opts(SecondsFormat::Secs, true);
        let to = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let page_size = self.page_size.to_string();

        debug!(url = %self.api_url, query, from = %from, to = %to, "newsapi: request");

        let response = send_with_retry("NewsAPI search", self.max_retries, || {
            self.client.get(&self.api_url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("q", query),
                ("searchIn", "title,content"),
                ("language", self.language.as_str()),
                ("sortBy", self.sort_by.as_str()),
                ("pageSize", page_size.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ])
        })
        .await?;

        let body: NewsApiResponse = response
            .json()
            .await
            .context("Failed to parse NewsAPI response")?;

        if body.status.as_deref() == Some("error") {
            anyhow::bail!(
                "NewsAPI error {}: {}",
                body.code.unwrap_or_default(),
                body.message.unwrap_or_default()
            );
        }

        if body.articles.is_empty() {
            info!("newsapi: no articles returned for prompt: {}", query);
        }

        Ok(body.articles.into_iter().map(RawArticle::from).collect())
    }
}

#[async_trait::async_trait]
impl ArticleSource for NewsApiSource {
    fn name(&self) -> &str {
        "NewsAPI"
    }

    async fn search(&self, enriched: &EnrichedPrompt) -> Result<Vec<RawArticle>> {
        self.fetch(&enriched.en_prompt).await
    }
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    #[serde(default)]
    source: Option<NewsApiSourceRef>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSourceRef {
    name: Option<String>,
}

impl From<NewsApiArticle> for RawArticle {
    fn from(a: NewsApiArticle) -> Self {
        RawArticle {
            source_name: a.source.and_then(|s| s.name),
            author: a.author,
            title: a.title,
            description: a.description.as_deref().map(clean_text),
            url: a.url,
            image_url: a.url_to_image,
            published_at: a.published_at.map(PublishedAt::Text).unwrap_or(PublishedAt::Unknown),
            content: a.content.as_deref().map(clean_text),
        }
    }
}
