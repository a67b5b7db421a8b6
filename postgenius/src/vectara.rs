//! Vectara REST v2 client: index RAG documents into a corpus and query it back
//! for grounding passages.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use common::VectaraConfig;

use crate::rag::{RagDocument, RagMetadata};

pub const DEFAULT_API_URL: &str = "https://api.vectara.io";

pub struct VectaraClient {
    client: Client,
    api_url: String,
    api_key: String,
    corpus_key: String,
    query_limit: u32,
}

impl VectaraClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        corpus_key: impl Into<String>,
        query_limit: u32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            corpus_key: corpus_key.into(),
            query_limit,
        })
    }

    /// Build from config when both the API key and the corpus key are present.
    pub fn from_config(cfg: &VectaraConfig) -> Result<Option<Self>> {
        let api_key = common::secret_from_env(cfg.api_key_env.as_deref());
        let corpus = cfg.corpus_key.clone().filter(|c| !c.trim().is_empty());
        match (api_key, corpus) {
            (Some(key), Some(corpus)) => Ok(Some(Self::new(
                cfg.api_url.clone().unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                key,
                corpus,
                cfg.query_limit.unwrap_or(5),
                cfg.timeout_seconds.unwrap_or(15),
            )?)),
            _ => Ok(None),
        }
    }

    fn corpus_url(&self, suffix: &str) -> String {
        format!("{}/v2/corpora/{}/{}", self.api_url, self.corpus_key, suffix)
    }

    /// Index every document; already-indexed ids are counted as success.
    /// Returns how many documents are now present in the corpus.
    pub async fn index_documents(&self, docs: &[RagDocument]) -> Result<usize> {
        let url = self.corpus_url("documents");
        let mut indexed = 0;

        for doc in docs {
            let body = CoreDocument {
                id: &doc.id,
                kind: "core",
                metadata: &doc.metadata,
                document_parts: vec![DocumentPart { text: &doc.text }],
            };

            let response = match self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(id = %doc.id, "vectara: indexing request failed: {}", e);
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                indexed += 1;
            } else if status == StatusCode::CONFLICT {
                debug!(id = %doc.id, "vectara: document already indexed");
                indexed += 1;
            } else {
                let text = response.text().await.unwrap_or_default();
                warn!(id = %doc.id, "vectara: indexing failed with {}: {}", status, text);
            }
        }

        info!("vectara: {}/{} documents indexed", indexed, docs.len());
        Ok(indexed)
    }

    /// Semantic search over the corpus; returns passage texts in rank order.
    pub async fn query(&self, text: &str) -> Result<Vec<String>> {
        let body = QueryRequest {
            query: text,
            search: SearchParams {
                limit: self.query_limit,
            },
        };

        let response = self
            .client
            .post(self.corpus_url("query"))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Vectara query request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Vectara query error {}: {}", status, text);
        }

        let parsed: QueryResponse = response.json().await.context("Failed to parse Vectara query response")?;
        Ok(parsed
            .search_results
            .into_iter()
            .map(|r| r.text)
            .filter(|t| !t.trim().is_empty())
            .collect())
    }
}

#[derive(Serialize)]
struct CoreDocument<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    metadata: &'a RagMetadata,
    document_parts: Vec<DocumentPart<'a>>,
}

#[derive(Serialize)]
struct DocumentPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    search: SearchParams,
}

#[derive(Serialize)]
struct SearchParams {
    limit: u32,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    search_results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    text: String,
}
