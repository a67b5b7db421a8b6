use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use common::RedditConfig;

use super::{clean_text, send_with_retry, ArticleSource, PublishedAt, RawArticle, StatusError};
use crate::enrichment::EnrichedPrompt;

pub const DEFAULT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_SEARCH_URL: &str = "https://oauth.reddit.com/search";
pub const DEFAULT_USER_AGENT: &str = "PostGeniusApp/1.0";

// Refresh the token this long before Reddit says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Reddit search through an application-only OAuth token.
pub struct RedditSource {
    client: Client,
    token_url: String,
    search_url: String,
    client_id: String,
    secret: String,
    posts_limit: u32,
    max_retries: u32,
    token: Mutex<Option<CachedToken>>,
}

impl RedditSource {
    pub fn new(cfg: &RedditConfig, client_id: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds.unwrap_or(10)))
            .user_agent(cfg.user_agent.clone().unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            token_url: cfg.token_url.clone().unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            search_url: cfg.search_url.clone().unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            client_id: client_id.into(),
            secret: secret.into(),
            posts_limit: cfg.posts_limit.unwrap_or(1),
            max_retries: cfg.max_retries.unwrap_or(3),
            token: Mutex::new(None),
        })
    }

    /// Build from config when both credentials are present in the environment.
    pub fn from_config(cfg: &RedditConfig) -> Result<Option<Self>> {
        let id = common::secret_from_env(cfg.client_id_env.as_deref());
        let secret = common::secret_from_env(cfg.secret_env.as_deref());
        match (id, secret) {
            (Some(id), Some(secret)) => Ok(Some(Self::new(cfg, id, secret)?)),
            _ => Ok(None),
        }
    }

    /// Return a cached token or request a fresh one.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let response = send_with_retry("Reddit token", self.max_retries, || {
            self.client
                .post(&self.token_url)
                .basic_auth(&self.client_id, Some(&self.secret))
                .form(&[("grant_type", "client_credentials")])
        })
        .await?;

        let body: TokenResponse = response.json().await.context("Failed to parse Reddit token")?;
        let value = body
            .access_token
            .filter(|t| !t.is_empty())
            .context("Reddit token response has no access_token")?;

        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        debug!("reddit: obtained access token");
        Ok(value)
    }

    pub async fn fetch(&self, query: &str) -> Result<Vec<RawArticle>> {
        let token = match self.access_token().await {
            Ok(t) => t,
            Err(e) => {
                warn!("reddit: failed to authenticate: {:#}", e);
                return Ok(Vec::new());
            }
        };

        let limit = self.posts_limit.to_string();
        let response = send_with_retry("Reddit search", self.max_retries, || {
            self.client
                .get(&self.search_url)
                .header("Authorization", format!("bearer {}", token))
                .query(&[("q", query), ("limit", limit.as_str()), ("sort", "relevance")])
        })
        .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                if e.downcast_ref::<StatusError>().is_some_and(StatusError::is_auth_failure) {
                    warn!("reddit: token rejected, dropping cached token");
                    *self.token.lock().await = None;
                }
                return Err(e);
            }
        };

        let listing: Listing = response
            .json()
            .await
            .context("Failed to parse Reddit search response")?;

        Ok(listing
            .data
            .map(|d| d.children)
            .unwrap_or_default()
            .into_iter()
            .map(|child| RawArticle::from(child.data))
            .collect())
    }
}

#[async_trait::async_trait]
impl ArticleSource for RedditSource {
    fn name(&self) -> &str {
        "Reddit"
    }

    async fn search(&self, enriched: &EnrichedPrompt) -> Result<Vec<RawArticle>> {
        self.fetch(&enriched.improved_prompt).await
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: Option<ListingData>,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    author: Option<String>,
    title: Option<String>,
    #[serde(default)]
    selftext: Option<String>,
    url: Option<String>,
    created_utc: Option<f64>,
}

impl From<Post> for RawArticle {
    fn from(p: Post) -> Self {
        let text = p.selftext.as_deref().map(clean_text).unwrap_or_default();
        RawArticle {
            source_name: Some("Reddit".to_string()),
            author: p.author,
            title: p.title,
            description: Some(text.clone()),
            url: p.url,
            image_url: None,
            published_at: p.created_utc.map(PublishedAt::Epoch).unwrap_or(PublishedAt::Unknown),
            content: Some(text),
        }
    }
}
