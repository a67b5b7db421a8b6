//! Article sources: news and social search APIs normalised into `RawArticle`.

use anyhow::Result;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::enrichment::EnrichedPrompt;

pub mod newsapi;
pub mod reddit;

pub use newsapi::NewsApiSource;
pub use reddit::RedditSource;

/// Publication time as reported by the source.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishedAt {
    /// ISO-8601 timestamp string (NewsAPI)
    Text(String),
    /// Seconds since the Unix epoch (Reddit `created_utc`)
    Epoch(f64),
    Unknown,
}

/// An article or post as returned by any source, before RAG formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArticle {
    pub source_name: Option<String>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub published_at: PublishedAt,
    pub content: Option<String>,
}

/// A searchable provider of articles.
#[async_trait::async_trait]
pub trait ArticleSource: Send + Sync {
    fn name(&self) -> &str;

    /// Search using whichever query field of the enriched prompt suits this source.
    async fn search(&self, enriched: &EnrichedPrompt) -> Result<Vec<RawArticle>>;
}

/// A non-retryable HTTP status returned by a source API.
#[derive(Debug)]
pub struct StatusError {
    pub label: String,
    pub status: StatusCode,
    pub body: String,
}

impl StatusError {
    pub fn is_auth_failure(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed with status {}: {}", self.label, self.status, self.body)
    }
}

impl std::error::Error for StatusError {}

/// Send a request, retrying network errors, 5xx and 429 with exponential back-off
/// (1s, 2s, 4s...). Other 4xx responses are returned as errors without retrying.
pub(crate) async fn send_with_retry<F>(label: &str, max_attempts: u32, make_request: F) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let backoff = Duration::from_secs(2u64.pow(attempt - 2));
            info!("Retrying {} (attempt {}/{}) after {:?}...", label, attempt, max_attempts, backoff);
            tokio::time::sleep(backoff).await;
        }

        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    last_error = Some(anyhow::anyhow!("{} failed with retryable status: {}", label, status));
                    continue;
                } else {
                    let body = response.text().await.unwrap_or_default();
                    return Err(StatusError {
                        label: label.to_string(),
                        status,
                        body,
                    }
                    .into());
                }
            }
            Err(e) => {
                last_error = Some(anyhow::Error::new(e).context(format!("network error during {}", label)));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("{}: unknown error after retries", label)))
}

/// Normalise a text field from a source: flatten HTML fragments and drop
/// NewsAPI's trailing "[+1234 chars]" truncation marker.
pub fn clean_text(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    if text.contains('<') && text.contains('>') {
        // Plain text only: no markdown emphasis, link references or footnotes
        let decorator = html2text::render::TrivialDecorator::new();
        if let Ok(flat) = html2text::from_read_with_decorator(text.as_bytes(), 10_000, decorator) {
            text = flat.trim().to_string();
        }
    }

    strip_truncation_marker(&text).to_string()
}

fn strip_truncation_marker(text: &str) -> &str {
    if let Some(start) = text.rfind("[+") {
        let tail = &text[start + 2..];
        if let Some(count) = tail.strip_suffix(" chars]") {
            if !count.is_empty() && count.chars().all(|c| c.is_ascii_digit()) {
                return text[..start].trim_end();
            }
        }
    }
    text
}
