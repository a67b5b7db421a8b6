//! End-to-end content generation: retrieval, RAG grounding, then every
//! generator, with fallbacks at each stage.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn, Instrument};

use common::Config;

use crate::enrichment::PromptEnricher;
use crate::generation::{ImageGenerator, MemeGenerator, TextGenerator, VideoGenerator};
use crate::llm::remote::RemoteLlmProvider;
use crate::llm::LlmProvider;
use crate::rag::{FormatOptions, DEFAULT_LANGUAGE, DEFAULT_MAX_CONTENT_CHARS};
use crate::retrieval::{Retrieval, Retriever};
use crate::sources::{ArticleSource, NewsApiSource, RedditSource};
use crate::vectara::VectaraClient;

fn default_tone() -> String {
    "humorous".to_string()
}

fn default_platform() -> String {
    "twitter".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    pub prompt: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_platform")]
    pub platform: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentResponse {
    pub text: String,
    pub image: String,
    pub video: String,
    pub meme: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Which integrations are live; reported by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Integrations {
    pub enrichment: bool,
    pub sources: Vec<String>,
    pub rag_store: bool,
    pub text: bool,
    pub image: bool,
    pub meme: bool,
    pub video: bool,
}

pub struct ContentPipeline {
    retriever: Retriever,
    store: Option<VectaraClient>,
    text: TextGenerator,
    image: ImageGenerator,
    meme: MemeGenerator,
    video: VideoGenerator,
}

impl ContentPipeline {
    pub fn new(
        retriever: Retriever,
        store: Option<VectaraClient>,
        text: TextGenerator,
        image: ImageGenerator,
        meme: MemeGenerator,
        video: VideoGenerator,
    ) -> Self {
        Self {
            retriever,
            store,
            text,
            image,
            meme,
            video,
        }
    }

    /// Wire every component from configuration. Components whose credentials
    /// are missing are disabled with a warning.
    pub fn from_config(config: &Config) -> Result<Self> {
        let llm = config.llm.clone().unwrap_or_default();
        let enrichment_llm = build_llm("enrichment", llm.enrichment());
        let content_llm = build_llm("content", llm.content());
        let video_llm = build_llm("video_prompt", llm.video_prompt());

        let mut sources: Vec<Arc<dyn ArticleSource>> = Vec::new();
        match NewsApiSource::from_config(&config.newsapi.clone().unwrap_or_default())? {
            Some(s) => sources.push(Arc::new(s)),
            None => warn!("NewsAPI key is missing in environment. Skipping NewsAPI."),
        }
        match RedditSource::from_config(&config.reddit.clone().unwrap_or_default())? {
            Some(s) => sources.push(Arc::new(s)),
            None => warn!("Reddit API credentials are missing in environment. Skipping Reddit."),
        }

        let retrieval = config.retrieval.clone().unwrap_or_default();
        let format = FormatOptions {
            max_chars: retrieval.max_content_chars.unwrap_or(DEFAULT_MAX_CONTENT_CHARS),
            language: retrieval.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        };

        let store = VectaraClient::from_config(&config.vectara.clone().unwrap_or_default())?;
        if store.is_none() {
            warn!("Vectara is not configured. Retrieved articles will not be indexed.");
        }

        let image = ImageGenerator::from_config(&config.image.clone().unwrap_or_default())?;
        let meme = MemeGenerator::from_config(&config.meme.clone().unwrap_or_default())?;
        let video = VideoGenerator::from_config(&config.video.clone().unwrap_or_default(), video_llm)?;

        Ok(Self::new(
            Retriever::new(PromptEnricher::new(enrichment_llm), sources, format),
            store,
            TextGenerator::new(content_llm),
            image,
            meme,
            video,
        ))
    }

    pub fn integrations(&self) -> Integrations {
        Integrations {
            enrichment: self.retriever.enrichment_configured(),
            sources: self.retriever.source_names(),
            rag_store: self.store.is_some(),
            text: self.text.is_configured(),
            image: self.image.is_configured(),
            meme: self.meme.is_configured(),
            video: self.video.is_configured(),
        }
    }

    /// Enrichment and retrieval only.
    pub async fn retrieve(&self, prompt: &str, tone: &str, platform: &str) -> Retrieval {
        self.retriever.get_relevant_articles(prompt, tone, platform).await
    }

    pub async fn generate(&self, request: &ContentRequest) -> ContentResponse {
        let span = tracing::info_span!(
            "generate",
            request_id = %uuid::Uuid::new_v4(),
            platform = %request.platform,
            tone = %request.tone
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &ContentRequest) -> ContentResponse {
        let ContentRequest { prompt, tone, platform } = request;

        let retrieval = self.retrieve(prompt, tone, platform).await;
        let docs = retrieval.documents;
        let enriched = retrieval.enriched;

        let context = match self.store.as_ref() {
            Some(store) if !docs.is_empty() => {
                if let Err(e) = store.index_documents(&docs).await {
                    warn!("vectara: indexing failed: {:#}", e);
                }
                store.query(&enriched.improved_prompt).await.unwrap_or_else(|e| {
                    warn!("vectara: query failed: {:#}", e);
                    Vec::new()
                })
            }
            _ => Vec::new(),
        };

        let mut summary = self.text.summarize_articles(&docs, &context, tone).await;
        if summary.trim().is_empty() {
            info!("no article summary, generating from the prompt alone");
            summary = enriched.improved_prompt.clone();
        }

        let (text, image, meme, video_prompt) = tokio::join!(
            self.text.generate_social_post(&summary, prompt, platform, tone),
            self.image.generate(&summary, prompt, tone, platform),
            self.meme.generate(&summary),
            self.video.video_prompt(&summary, prompt, tone, platform),
        );

        let video = self.video.generate(&video_prompt, &image).await;

        let sources = docs.into_iter().map(|d| d.metadata.source).collect();
        info!("content generated");

        ContentResponse {
            text,
            image,
            video,
            meme,
            sources,
        }
    }
}

fn build_llm(task: &str, cfg: Option<common::RemoteLlmConfig>) -> Option<Arc<dyn LlmProvider>> {
    let cfg = cfg?;
    match RemoteLlmProvider::from_config(&cfg) {
        Ok(provider) => {
            info!("LLM provider for {} initialized: {}", task, provider.model());
            Some(Arc::new(provider) as Arc<dyn LlmProvider>)
        }
        Err(e) => {
            warn!("LLM provider for {} disabled: {:#}", task, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let req: ContentRequest = serde_json::from_str(r#"{"prompt": "space cats"}"#).unwrap();
        assert_eq!(req.tone, "humorous");
        assert_eq!(req.platform, "twitter");
    }

    #[tokio::test]
    async fn unconfigured_pipeline_returns_fallbacks() {
        let pipeline = ContentPipeline::from_config(&Config::default()).expect("pipeline");
        let integrations = pipeline.integrations();
        assert!(!integrations.enrichment);
        assert!(integrations.sources.is_empty());

        let resp = pipeline
            .generate(&ContentRequest {
                prompt: "space cats".into(),
                tone: default_tone(),
                platform: default_platform(),
            })
            .await;

        assert_eq!(resp.text, "");
        assert_eq!(resp.image, crate::generation::PLACEHOLDER_IMAGE);
        assert_eq!(resp.meme, crate::generation::PLACEHOLDER_MEME);
        assert_eq!(resp.video, crate::generation::PLACEHOLDER_VIDEO);
        assert!(resp.sources.is_empty());
    }
}
