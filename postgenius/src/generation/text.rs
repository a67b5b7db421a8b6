use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::{LlmProvider, LlmRequest};
use crate::rag::RagDocument;

use super::truncate_with_ellipsis;

const SUMMARIZER_SYSTEM: &str = "You are a helpful assistant that summarizes news articles.";

const CREATOR_SYSTEM: &str = "You are a professional content creator specialized in generating engaging social media posts. \
Your expertise includes creating platform-specific content with a tailored tone and style. \
Ensure that the outputs are concise, creative, and optimized for maximum engagement.";

// Per-document cap on the text sent for summarization.
const MAX_DESC_CHARS: usize = 1500;

/// Summaries and social posts.
pub struct TextGenerator {
    provider: Option<Arc<dyn LlmProvider>>,
}

impl TextGenerator {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { provider }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Summarize the retrieved documents (plus any RAG passages) in the given tone.
    /// Falls back to an extractive summary built from the titles when the LLM fails.
    pub async fn summarize_articles(&self, docs: &[RagDocument], context: &[String], tone: &str) -> String {
        if docs.is_empty() {
            warn!("No articles provided to summarize.");
            return String::new();
        }

        let Some(provider) = self.provider.as_ref() else {
            warn!("summarize: no LLM configured, using extractive summary");
            return extractive_summary(docs);
        };

        let request = LlmRequest {
            system: Some(SUMMARIZER_SYSTEM.to_string()),
            prompt: summary_prompt(docs, context, tone),
            temperature: Some(0.7),
            max_tokens: Some(200),
            ..Default::default()
        };

        match provider.generate(request).await {
            Ok(resp) if !resp.content.is_empty() => {
                info!("summarize: {} tokens", resp.usage.total_tokens);
                resp.content
            }
            Ok(_) => {
                warn!("Summarization returned empty, using extractive summary");
                extractive_summary(docs)
            }
            Err(e) => {
                warn!("Summarization failed: {:#}, using extractive summary", e);
                extractive_summary(docs)
            }
        }
    }

    /// Write the social post. Any failure yields an empty string.
    pub async fn generate_social_post(&self, summary: &str, prompt: &str, platform: &str, tone: &str) -> String {
        if summary.trim().is_empty() {
            warn!("No summary provided to generate social posts.");
            return String::new();
        }
        let Some(provider) = self.provider.as_ref() else {
            warn!("social post: no LLM configured");
            return String::new();
        };

        let request = LlmRequest {
            system: Some(CREATOR_SYSTEM.to_string()),
            prompt: social_post_prompt(summary, prompt, platform, tone),
            temperature: Some(0.7),
            max_tokens: Some(200),
            ..Default::default()
        };

        match provider.generate(request).await {
            Ok(resp) => {
                debug!("Generated social post: {}", resp.content);
                resp.content
            }
            Err(e) => {
                warn!("Error generating social post: {:#}", e);
                String::new()
            }
        }
    }
}

fn summary_prompt(docs: &[RagDocument], context: &[String], tone: &str) -> String {
    let articles = docs
        .iter()
        .map(|d| {
            format!(
                "Title: {}\nDesc: {}",
                d.metadata.title,
                truncate_with_ellipsis(&d.text, MAX_DESC_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut prompt = format!("Summarize the following articles in a {} tone:\n{}", tone, articles);
    if !context.is_empty() {
        prompt.push_str("\n\nRelated context:\n");
        for passage in context {
            prompt.push_str("- ");
            prompt.push_str(&truncate_with_ellipsis(passage, MAX_DESC_CHARS));
            prompt.push('\n');
        }
    }
    prompt
}

fn social_post_prompt(summary: &str, prompt: &str, platform: &str, tone: &str) -> String {
    format!(
        "Generate a social media post for {platform} based on the following information:\n\
         - **Summary**: {summary}\n\
         - **Prompt**: {prompt}\n\
         - **Tone**: {tone} (e.g., humorous, formal, casual, inspiring)\n\
         - **Target Audience**: Social media users who are interested in {platform} trends.\n\n\
         Guidelines:\n\
         1. The post should be concise and engaging.\n\
         2. Include elements like hashtags, emojis, or calls to action relevant to the platform.\n\
         3. Ensure the tone and style match the platform and audience."
    )
}

/// Titles joined as sentences.
fn extractive_summary(docs: &[RagDocument]) -> String {
    docs.iter()
        .map(|d| d.metadata.title.trim().trim_end_matches('.'))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(". ")
}
