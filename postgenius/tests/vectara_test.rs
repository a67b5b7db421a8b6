use mockito::Matcher;
use postgenius::enrichment::EnrichedPrompt;
use postgenius::rag::{to_rag_document, FormatOptions, RagDocument};
use postgenius::sources::{PublishedAt, RawArticle};
use postgenius::vectara::VectaraClient;

fn doc(title: &str, url: &str) -> RagDocument {
    let article = RawArticle {
        source_name: Some("NewsAPI".into()),
        author: Some("Reporter".into()),
        title: Some(title.into()),
        description: Some("Description.".into()),
        url: Some(url.into()),
        image_url: None,
        published_at: PublishedAt::Text("2024-06-01T00:00:00Z".into()),
        content: Some("Content.".into()),
    };
    to_rag_document(&article, &EnrichedPrompt::fallback("q", "t", "p"), &FormatOptions::default()).expect("doc")
}

#[tokio::test]
async fn indexes_documents_as_core_documents() {
    let mut server = mockito::Server::new_async().await;
    let first = doc("First", "https://example.com/1");
    let second = doc("Second", "https://example.com/2");

    let created = server
        .mock("POST", "/v2/corpora/news/documents")
        .match_header("x-api-key", "vec-key")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "id": first.id,
            "type": "core",
            "metadata": {
                "title": "First",
                "lang": "eng",
                "categoria": "unknown",
                "data": "2024-06-01",
                "autore": "Reporter",
                "fonte": "https://example.com/1"
            },
            "document_parts": [{"text": "Description. Content."}]
        })))
        .with_status(201)
        .with_body("{}")
        .create_async()
        .await;

    let conflict = server
        .mock("POST", "/v2/corpora/news/documents")
        .match_body(Matcher::PartialJson(serde_json::json!({"id": second.id})))
        .with_status(409)
        .with_body(r#"{"messages": ["document already exists"]}"#)
        .create_async()
        .await;

    let client = VectaraClient::new(server.url(), "vec-key", "news", 3, 5).expect("client");
    let indexed = client.index_documents(&[first, second]).await.expect("index");
    assert_eq!(indexed, 2);

    created.assert_async().await;
    conflict.assert_async().await;
}

#[tokio::test]
async fn indexing_rejections_are_not_counted() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/v2/corpora/news/documents")
        .with_status(400)
        .with_body(r#"{"messages": ["bad request"]}"#)
        .create_async()
        .await;

    let client = VectaraClient::new(server.url(), "vec-key", "news", 3, 5).expect("client");
    let indexed = client
        .index_documents(&[doc("Only", "https://example.com/only")])
        .await
        .expect("index");
    assert_eq!(indexed, 0);
}

#[tokio::test]
async fn transport_failure_keeps_indexed_count() {
    let mut server = mockito::Server::new_async().await;
    let first = doc("Fast", "https://example.com/fast");
    let second = doc("Known", "https://example.com/known");
    let third = doc("Slow", "https://example.com/slow");

    let ok = server
        .mock("POST", "/v2/corpora/news/documents")
        .match_body(Matcher::PartialJson(serde_json::json!({"id": first.id})))
        .with_status(201)
        .with_body("{}")
        .create_async()
        .await;

    let _conflict = server
        .mock("POST", "/v2/corpora/news/documents")
        .match_body(Matcher::PartialJson(serde_json::json!({"id": second.id})))
        .with_status(409)
        .with_body("{}")
        .create_async()
        .await;

    let _slow = server
        .mock("POST", "/v2/corpora/news/documents")
        .match_body(Matcher::PartialJson(serde_json::json!({"id": third.id})))
        .with_status(500)
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_secs(3));
            w.write_all(b"too late")
        })
        .create_async()
        .await;

    // 1 second client timeout
    let client = VectaraClient::new(server.url(), "vec-key", "news", 3, 1).expect("client");
    let indexed = client
        .index_documents(&[first, second, third])
        .await
        .expect("indexing never fails as a whole");
    assert_eq!(indexed, 2);

    ok.assert_async().await;
}

#[tokio::test]
async fn query_returns_passages() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/v2/corpora/news/query")
        .match_header("x-api-key", "vec-key")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "query": "AI news",
            "search": {"limit": 3}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"search_results": [
                {"text": "Passage one", "score": 0.9, "document_id": "a"},
                {"text": "  ", "score": 0.5, "document_id": "b"},
                {"text": "Passage two", "score": 0.4, "document_id": "c"}
            ]}"#,
        )
        .create_async()
        .await;

    let client = VectaraClient::new(server.url(), "vec-key", "news", 3, 5).expect("client");
    let passages = client.query("AI news").await.expect("query");
    assert_eq!(passages, vec!["Passage one".to_string(), "Passage two".to_string()]);

    mock.assert_async().await;
}

#[tokio::test]
async fn query_errors_surface_status() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/v2/corpora/news/query")
        .with_status(403)
        .with_body("forbidden")
        .create_async()
        .await;

    let client = VectaraClient::new(server.url(), "vec-key", "news", 3, 5).expect("client");
    let err = client.query("AI news").await.unwrap_err();
    assert!(err.to_string().contains("403"));
}
