//! Prompt enrichment: turn the raw user prompt into search-ready queries plus
//! category/keyword metadata, using a fast JSON-mode LLM.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::{extract_json_from_text, LlmProvider, LlmRequest};

const SYSTEM_MESSAGE: &str = r#"You are a metadata assistant. Extract relevant metadata from the user's input and return it as a JSON object in the following format:

{
  "metadata": {
    "category": "string",
    "keywords": ["string", "string", ...]
  },
  "en_prompt": "string",
  "improved_prompt": "string",
  "original_input": {
    "tone": "string",
    "prompt": "string",
    "platform": "string"
  }
}

"en_prompt" is the prompt translated to English for news search APIs.
"improved_prompt" is a rewrite of the prompt optimised for searching social media.
"#;

pub const UNKNOWN_CATEGORY: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMetadata {
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalInput {
    pub tone: String,
    pub prompt: String,
    pub platform: String,
}

/// Result of prompt enrichment. Always fully populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPrompt {
    pub metadata: PromptMetadata,
    /// English rendition of the prompt, used for news search
    pub en_prompt: String,
    /// Search-optimised prompt, used for social search and the RAG store
    pub improved_prompt: String,
    pub original_input: OriginalInput,
}

impl EnrichedPrompt {
    /// Enrichment that simply echoes the user's prompt.
    pub fn fallback(prompt: &str, tone: &str, platform: &str) -> Self {
        Self {
            metadata: PromptMetadata {
                category: UNKNOWN_CATEGORY.to_string(),
                keywords: Vec::new(),
            },
            en_prompt: prompt.to_string(),
            improved_prompt: prompt.to_string(),
            original_input: OriginalInput {
                tone: tone.to_string(),
                prompt: prompt.to_string(),
                platform: platform.to_string(),
            },
        }
    }

    pub fn category(&self) -> &str {
        if self.metadata.category.trim().is_empty() {
            UNKNOWN_CATEGORY
        } else {
            &self.metadata.category
        }
    }
}

// Lenient view of what the model returns; any field may be missing.
#[derive(Debug, Default, Deserialize)]
struct EnrichmentJson {
    #[serde(default)]
    metadata: Option<MetadataJson>,
    #[serde(default)]
    en_prompt: Option<String>,
    #[serde(default)]
    improved_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataJson {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

pub struct PromptEnricher {
    provider: Option<Arc<dyn LlmProvider>>,
}

impl PromptEnricher {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { provider }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Enrich the prompt, falling back to the raw prompt on any failure.
    pub async fn enrich(&self, prompt: &str, tone: &str, platform: &str) -> EnrichedPrompt {
        let Some(provider) = self.provider.as_ref() else {
            debug!("enrichment: no LLM configured, using raw prompt");
            return EnrichedPrompt::fallback(prompt, tone, platform);
        };

        match self.request(provider.as_ref(), prompt, tone, platform).await {
            Ok(enriched) => {
                info!(
                    category = %enriched.metadata.category,
                    keywords = enriched.metadata.keywords.len(),
                    "enrichment: prompt processed"
                );
                enriched
            }
            Err(e) => {
                warn!("enrichment: failed to process prompt: {:#}", e);
                EnrichedPrompt::fallback(prompt, tone, platform)
            }
        }
    }

    async fn request(
        &self,
        provider: &dyn LlmProvider,
        prompt: &str,
        tone: &str,
        platform: &str,
    ) -> Result<EnrichedPrompt> {
        let request = LlmRequest {
            system: Some(SYSTEM_MESSAGE.to_string()),
            prompt: format!("Prompt: {}\nTone: {}\nPlatform: {}", prompt, tone, platform),
            json_mode: true,
            ..Default::default()
        };

        let response = provider.generate(request).await?;
        debug!("enrichment: raw response: {}", response.content);

        let cleaned = extract_json_from_text(&response.content)
            .context("No JSON object in enrichment response")?;
        let parsed: EnrichmentJson = serde_json::from_str(&cleaned)
            .with_context(|| format!("Failed to parse enrichment JSON: {}", cleaned))?;

        Ok(merge_with_fallback(parsed, prompt, tone, platform))
    }
}

fn merge_with_fallback(parsed: EnrichmentJson, prompt: &str, tone: &str, platform: &str) -> EnrichedPrompt {
    let mut enriched = EnrichedPrompt::fallback(prompt, tone, platform);

    if let Some(meta) = parsed.metadata {
        if let Some(category) = meta.category.filter(|c| !c.trim().is_empty()) {
            enriched.metadata.category = category;
        }
        enriched.metadata.keywords = meta
            .keywords
            .into_iter()
            .filter(|k| !k.trim().is_empty())
            .collect();
    }
    if let Some(en) = parsed.en_prompt.filter(|p| !p.trim().is_empty()) {
        enriched.en_prompt = en;
    }
    if let Some(improved) = parsed.improved_prompt.filter(|p| !p.trim().is_empty()) {
        enriched.improved_prompt = improved;
    }
    enriched
}
