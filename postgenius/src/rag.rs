//! RAG document formatting and de-duplication.
//!
//! Articles from every source are converted into a single document schema that
//! the Vectara corpus is indexed with. Documents are keyed by a SHA-256 of
//! title and URL, so the same story seen twice collapses into one entry.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::enrichment::EnrichedPrompt;
use crate::sources::{PublishedAt, RawArticle};

pub const DEFAULT_MAX_CONTENT_CHARS: usize = 16_000;
pub const DEFAULT_LANGUAGE: &str = "eng";
pub const UNKNOWN: &str = "unknown";

/// Metadata attached to each indexed document. Field names are part of the
/// corpus schema and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagMetadata {
    pub title: String,
    pub lang: String,
    #[serde(rename = "categoria")]
    pub category: String,
    /// Publication date, `YYYY-MM-DD` when known
    #[serde(rename = "data")]
    pub date: String,
    #[serde(rename = "autore")]
    pub author: String,
    /// Canonical URL of the article
    #[serde(rename = "fonte")]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagDocument {
    pub id: String,
    pub metadata: RagMetadata,
    pub text: String,
}

/// Formatting knobs for `to_rag_document`.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub max_chars: usize,
    pub language: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CONTENT_CHARS,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Hex SHA-256 of title followed by URL.
pub fn document_id(title: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Convert an article into a RAG document. Returns `None` for articles with
/// no URL or no usable text.
pub fn to_rag_document(article: &RawArticle, enriched: &EnrichedPrompt, opts: &FormatOptions) -> Option<RagDocument> {
    let url = match article.url.as_deref().map(str::trim) {
        Some(u) if !u.is_empty() => u,
        _ => {
            warn!("Article has no source and will be discarded.");
            return None;
        }
    };

    let raw_title = article.title.as_deref().unwrap_or("");
    let id = document_id(raw_title, url);
    let title = article.title.clone().unwrap_or_else(|| "Untitled".to_string());

    let text = format!(
        "{} {}",
        article.description.as_deref().unwrap_or(""),
        article.content.as_deref().unwrap_or("")
    );
    let text = text.trim();
    if text.is_empty() {
        warn!("Article '{}' has no valid content and will be discarded.", title);
        return None;
    }
    let text: String = text.chars().take(opts.max_chars).collect();

    let doc = RagDocument {
        id,
        metadata: RagMetadata {
            title,
            lang: opts.language.clone(),
            category: enriched.category().to_string(),
            date: format_date(&article.published_at),
            author: article
                .author
                .clone()
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            source: url.to_string(),
        },
        text,
    };

    debug!(id = %doc.id, title = %doc.metadata.title, "formatted RAG document");
    Some(doc)
}

fn format_date(published: &PublishedAt) -> String {
    match published {
        PublishedAt::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                UNKNOWN.to_string()
            } else {
                s.split('T').next().unwrap_or(s).to_string()
            }
        }
        PublishedAt::Epoch(secs) if secs.is_finite() => DateTime::from_timestamp(secs.trunc() as i64, 0)
            .map(|dt| dt.date_naive())
            .map(|d: NaiveDate| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        _ => UNKNOWN.to_string(),
    }
}

/// Insertion-ordered set of documents keyed by id. Re-inserting an id keeps
/// its original position and replaces the stored document.
#[derive(Debug, Default, Clone)]
pub struct DocumentSet {
    docs: Vec<RagDocument>,
    index: HashMap<String, usize>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the id was not seen before.
    pub fn insert(&mut self, doc: RagDocument) -> bool {
        match self.index.get(&doc.id) {
            Some(&pos) => {
                self.docs[pos] = doc;
                false
            }
            None => {
                self.index.insert(doc.id.clone(), self.docs.len());
                self.docs.push(doc);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn into_vec(self) -> Vec<RagDocument> {
        self.docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: Option<&str>, url: Option<&str>, desc: &str, content: &str) -> RawArticle {
        RawArticle {
            source_name: Some("Test".into()),
            author: Some("Jane Doe".into()),
            title: title.map(String::from),
            description: Some(desc.into()),
            url: url.map(String::from),
            image_url: None,
            published_at: PublishedAt::Text("2024-03-05T10:20:30Z".into()),
            content: Some(content.into()),
        }
    }

    fn enriched() -> EnrichedPrompt {
        let mut e = EnrichedPrompt::fallback("ai", "humorous", "twitter");
        e.metadata.category = "technology".into();
        e
    }

    #[test]
    fn formats_newsapi_article() {
        let a = article(Some("Big news"), Some("https://example.com/a"), "Short desc.", "Body text.");
        let doc = to_rag_document(&a, &enriched(), &FormatOptions::default()).expect("doc");

        assert_eq!(doc.id, document_id("Big news", "https://example.com/a"));
        assert_eq!(doc.id.len(), 64);
        assert_eq!(doc.text, "Short desc. Body text.");
        assert_eq!(doc.metadata.date, "2024-03-05");
        assert_eq!(doc.metadata.category, "technology");
        assert_eq!(doc.metadata.author, "Jane Doe");
        assert_eq!(doc.metadata.lang, "eng");
        assert_eq!(doc.metadata.source, "https://example.com/a");
    }

    #[test]
    fn known_hash_value() {
        // sha256("abc")
        assert_eq!(
            document_id("a", "bc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn discards_missing_url_and_empty_text() {
        let no_url = article(Some("t"), None, "desc", "content");
        assert!(to_rag_document(&no_url, &enriched(), &FormatOptions::default()).is_none());

        let blank_url = article(Some("t"), Some("  "), "desc", "content");
        assert!(to_rag_document(&blank_url, &enriched(), &FormatOptions::default()).is_none());

        let empty = article(Some("t"), Some("https://example.com"), "  ", "");
        assert!(to_rag_document(&empty, &enriched(), &FormatOptions::default()).is_none());
    }

    #[test]
    fn defaults_for_missing_fields() {
        let mut a = article(None, Some("https://example.com/x"), "", "only content");
        a.author = None;
        a.published_at = PublishedAt::Unknown;

        let doc = to_rag_document(&a, &EnrichedPrompt::fallback("q", "t", "p"), &FormatOptions::default())
            .expect("doc");
        assert_eq!(doc.metadata.title, "Untitled");
        assert_eq!(doc.metadata.author, "unknown");
        assert_eq!(doc.metadata.date, "unknown");
        assert_eq!(doc.metadata.category, "unknown");
        assert_eq!(doc.text, "only content");
        assert_eq!(doc.id, document_id("", "https://example.com/x"));
    }

    #[test]
    fn epoch_dates_become_calendar_days() {
        assert_eq!(format_date(&PublishedAt::Epoch(1_700_000_000.0)), "2023-11-14");
        assert_eq!(format_date(&PublishedAt::Epoch(f64::NAN)), "unknown");
        assert_eq!(format_date(&PublishedAt::Text("2024-01-02".into())), "2024-01-02");
    }

    #[test]
    fn truncates_by_characters() {
        let body = "é".repeat(20);
        let a = article(Some("t"), Some("https://example.com"), "", &body);
        let opts = FormatOptions {
            max_chars: 5,
            ..Default::default()
        };
        let doc = to_rag_document(&a, &enriched(), &opts).expect("doc");
        assert_eq!(doc.text, "ééééé");
    }

    #[test]
    fn serializes_with_corpus_field_names() {
        let a = article(Some("t"), Some("https://example.com"), "d", "c");
        let doc = to_rag_document(&a, &enriched(), &FormatOptions::default()).expect("doc");
        let json = serde_json::to_value(&doc).expect("json");

        let meta = &json["metadata"];
        assert_eq!(meta["categoria"], "technology");
        assert_eq!(meta["data"], "2024-03-05");
        assert_eq!(meta["autore"], "Jane Doe");
        assert_eq!(meta["fonte"], "https://example.com");
        assert_eq!(meta["lang"], "eng");
    }

    #[test]
    fn document_set_dedupes_and_keeps_first_position() {
        let e = enriched();
        let opts = FormatOptions::default();
        let first = to_rag_document(&article(Some("A"), Some("https://a"), "old", ""), &e, &opts).unwrap();
        let second = to_rag_document(&article(Some("B"), Some("https://b"), "b", ""), &e, &opts).unwrap();
        let dup = to_rag_document(&article(Some("A"), Some("https://a"), "new", ""), &e, &opts).unwrap();

        let mut set = DocumentSet::new();
        assert!(set.insert(first));
        assert!(set.insert(second));
        assert!(!set.insert(dup));
        assert_eq!(set.len(), 2);

        let docs = set.into_vec();
        assert_eq!(docs[0].metadata.title, "A");
        assert_eq!(docs[0].text, "new");
        assert_eq!(docs[1].metadata.title, "B");
    }
}
