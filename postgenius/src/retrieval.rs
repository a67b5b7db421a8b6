use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::enrichment::{EnrichedPrompt, PromptEnricher};
use crate::rag::{to_rag_document, DocumentSet, FormatOptions, RagDocument};
use crate::sources::ArticleSource;

/// Outcome of a retrieval run.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub enriched: EnrichedPrompt,
    pub documents: Vec<RagDocument>,
}

/// Enriches a prompt, fans out to every configured source and returns the
/// de-duplicated RAG documents.
pub struct Retriever {
    enricher: PromptEnricher,
    sources: Vec<Arc<dyn ArticleSource>>,
    format: FormatOptions,
}

impl Retriever {
    pub fn new(enricher: PromptEnricher, sources: Vec<Arc<dyn ArticleSource>>, format: FormatOptions) -> Self {
        Self {
            enricher,
            sources,
            format,
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn enrichment_configured(&self) -> bool {
        self.enricher.is_configured()
    }

    pub async fn get_relevant_articles(&self, prompt: &str, tone: &str, platform: &str) -> Retrieval {
        if prompt.trim().is_empty() {
            warn!("retrieval: empty prompt, nothing to search for");
            return Retrieval {
                enriched: EnrichedPrompt::fallback(prompt, tone, platform),
                documents: Vec::new(),
            };
        }

        let enriched = self.enricher.enrich(prompt, tone, platform).await;
        debug!(?enriched, "retrieval: enriched prompt");

        if self.sources.is_empty() {
            warn!("retrieval: no article sources configured");
        }

        let mut unique = DocumentSet::new();
        for source in &self.sources {
            match source.search(&enriched).await {
                Ok(articles) => {
                    info!("retrieval: {} returned {} articles", source.name(), articles.len());
                    for article in &articles {
                        if let Some(doc) = to_rag_document(article, &enriched, &self.format) {
                            if !unique.insert(doc) {
                                debug!("retrieval: duplicate article from {}", source.name());
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("retrieval: {} search failed: {:#}", source.name(), e);
                }
            }
        }

        info!("retrieval: {} unique documents", unique.len());
        Retrieval {
            enriched,
            documents: unique.into_vec(),
        }
    }
}
