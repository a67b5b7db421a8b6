use std::sync::Arc;

use common::{ImageConfig, MemeConfig, NewsApiConfig, VideoConfig};
use mockito::Matcher;
use postgenius::enrichment::PromptEnricher;
use postgenius::generation::{ImageGenerator, MemeGenerator, TextGenerator, VideoGenerator, PLACEHOLDER_VIDEO};
use postgenius::llm::remote::RemoteLlmProvider;
use postgenius::llm::LlmProvider;
use postgenius::pipeline::{ContentPipeline, ContentRequest};
use postgenius::rag::FormatOptions;
use postgenius::retrieval::Retriever;
use postgenius::sources::{ArticleSource, NewsApiSource};
use postgenius::vectara::VectaraClient;

fn chat_body(content: &str) -> String {
    serde_json::json!({
        "model": "llama3-8b-8192",
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
    })
    .to_string()
}

fn llm(url: String) -> Option<Arc<dyn LlmProvider>> {
    Some(Arc::new(RemoteLlmProvider::new(url, "k", "llama3-8b-8192")) as Arc<dyn LlmProvider>)
}

const NEWS_BODY: &str = r#"{
    "status": "ok",
    "totalResults": 3,
    "articles": [
        {"source": {"name": "Wired"}, "author": "A", "title": "Solar record",
         "description": "Panels broke a record.", "url": "https://example.com/solar",
         "publishedAt": "2024-04-02T10:00:00Z", "content": "Details."},
        {"source": {"name": "Wired"}, "author": "A", "title": "Solar record",
         "description": "Panels broke a record.", "url": "https://example.com/solar",
         "publishedAt": "2024-04-02T10:00:00Z", "content": "Details."},
        {"source": {"name": "BBC"}, "author": null, "title": "Wind farms",
         "description": "More turbines.", "url": "https://example.com/wind",
         "publishedAt": "2024-04-03T10:00:00Z", "content": null}
    ]
}"#;

#[tokio::test]
async fn full_pipeline_with_every_integration() {
    std::env::set_var("POSTGENIUS_PIPE_IMAGE_KEY", "img");
    std::env::set_var("POSTGENIUS_PIPE_IMGFLIP_USER", "u");
    std::env::set_var("POSTGENIUS_PIPE_IMGFLIP_PASS", "p");
    std::env::set_var("POSTGENIUS_PIPE_RUNWAY_KEY", "rw");

    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    let enrich = server
        .mock("POST", "/enrich")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body(
            r#"{"metadata": {"category": "energy", "keywords": ["solar", "wind"]},
                "en_prompt": "renewable energy",
                "improved_prompt": "Latest renewable energy records"}"#,
        ))
        .expect(1)
        .create_async()
        .await;

    let news = server
        .mock("GET", "/v2/everything")
        .match_query(Matcher::UrlEncoded("q".into(), "renewable energy".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(NEWS_BODY)
        .expect(1)
        .create_async()
        .await;

    let index = server
        .mock("POST", "/v2/corpora/news/documents")
        .match_body(Matcher::PartialJson(serde_json::json!({"metadata": {"categoria": "energy"}})))
        .with_status(201)
        .with_body("{}")
        .expect(2)
        .create_async()
        .await;

    let query = server
        .mock("POST", "/v2/corpora/news/query")
        .match_body(Matcher::PartialJson(serde_json::json!({"query": "Latest renewable energy records"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"search_results": [{"text": "Older solar story"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let summarize = server
        .mock("POST", "/content")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("Summarize the following articles in a humorous tone".into()),
            Matcher::Regex("Older solar story".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body("Solar won. Wind followed."))
        .expect(1)
        .create_async()
        .await;

    let post = server
        .mock("POST", "/content")
        .match_body(Matcher::Regex("Generate a social media post for twitter".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body("Sun 1, fossil 0 #solar"))
        .expect(1)
        .create_async()
        .await;

    let video_prompt = server
        .mock("POST", "/video-prompt")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body("Panels glinting at sunrise"))
        .expect(1)
        .create_async()
        .await;

    let image = server
        .mock("POST", "/v1/images/generations")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": [{"url": "https://images.example/solar.png"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let _templates = server
        .mock("GET", "/imgflip/get_memes")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "data": {"memes": [{"id": "42"}]}}"#)
        .create_async()
        .await;

    let caption = server
        .mock("POST", "/imgflip/caption_image")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("text0".into(), "Solar won".into()),
            Matcher::UrlEncoded("text1".into(), "Wind followed".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "data": {"url": "https://i.imgflip.com/solar.jpg"}}"#)
        .expect(1)
        .create_async()
        .await;

    let video_task = server
        .mock("POST", "/v1/image_to_video")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "promptImage": "https://images.example/solar.png",
            "promptText": "Panels glinting at sunrise"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "t1"}"#)
        .expect(1)
        .create_async()
        .await;

    let _video_poll = server
        .mock("GET", "/v1/tasks/t1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "SUCCEEDED", "output": ["https://videos.example/solar.mp4"]}"#)
        .create_async()
        .await;

    let newsapi = NewsApiSource::new(
        &NewsApiConfig {
            api_url: Some(format!("{}/v2/everything", base)),
            max_retries: Some(1),
            ..Default::default()
        },
        "news-key",
    )
    .expect("newsapi");

    let retriever = Retriever::new(
        PromptEnricher::new(llm(format!("{}/enrich", base))),
        vec![Arc::new(newsapi) as Arc<dyn ArticleSource>],
        FormatOptions::default(),
    );

    let pipeline = ContentPipeline::new(
        retriever,
        Some(VectaraClient::new(&base, "vec", "news", 5, 5).expect("vectara")),
        TextGenerator::new(llm(format!("{}/content", base))),
        ImageGenerator::from_config(&ImageConfig {
            api_url: Some(format!("{}/v1/images/generations", base)),
            api_key_env: Some("POSTGENIUS_PIPE_IMAGE_KEY".into()),
            ..Default::default()
        })
        .expect("image"),
        MemeGenerator::from_config(&MemeConfig {
            api_url: Some(format!("{}/imgflip", base)),
            username_env: Some("POSTGENIUS_PIPE_IMGFLIP_USER".into()),
            password_env: Some("POSTGENIUS_PIPE_IMGFLIP_PASS".into()),
            ..Default::default()
        })
        .expect("meme"),
        VideoGenerator::from_config(
            &VideoConfig {
                api_url: Some(base.clone()),
                api_key_env: Some("POSTGENIUS_PIPE_RUNWAY_KEY".into()),
                poll_interval_ms: Some(10),
                max_polls: Some(3),
                ..Default::default()
            },
            llm(format!("{}/video-prompt", base)),
        )
        .expect("video"),
    );

    let integrations = pipeline.integrations();
    assert!(integrations.enrichment);
    assert_eq!(integrations.sources, vec!["NewsAPI".to_string()]);
    assert!(integrations.rag_store && integrations.text && integrations.image && integrations.meme && integrations.video);

    let request: ContentRequest = serde_json::from_str(r#"{"prompt": "energia rinnovabile"}"#).expect("request");
    let response = pipeline.generate(&request).await;

    assert_eq!(response.text, "Sun 1, fossil 0 #solar");
    assert_eq!(response.image, "https://images.example/solar.png");
    assert_eq!(response.meme, "https://i.imgflip.com/solar.jpg");
    assert_eq!(response.video, "https://videos.example/solar.mp4");
    // Duplicate article collapsed, order preserved
    assert_eq!(
        response.sources,
        vec!["https://example.com/solar".to_string(), "https://example.com/wind".to_string()]
    );

    enrich.assert_async().await;
    news.assert_async().await;
    index.assert_async().await;
    query.assert_async().await;
    summarize.assert_async().await;
    post.assert_async().await;
    video_prompt.assert_async().await;
    image.assert_async().await;
    caption.assert_async().await;
    video_task.assert_async().await;
}

#[tokio::test]
async fn pipeline_without_articles_writes_from_the_prompt() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    let post = server
        .mock("POST", "/content")
        .match_body(Matcher::Regex("Summary\\*\\*: quantum cats".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body("Schrodinger says hi"))
        .expect(1)
        .create_async()
        .await;

    let pipeline = ContentPipeline::new(
        Retriever::new(PromptEnricher::new(None), Vec::new(), FormatOptions::default()),
        None,
        TextGenerator::new(llm(format!("{}/content", base))),
        ImageGenerator::from_config(&ImageConfig {
            api_key_env: Some("POSTGENIUS_PIPE_UNSET_IMAGE".into()),
            ..Default::default()
        })
        .expect("image"),
        MemeGenerator::from_config(&MemeConfig::default()).expect("meme"),
        VideoGenerator::from_config(&VideoConfig::default(), None).expect("video"),
    );

    let response = pipeline
        .generate(&ContentRequest {
            prompt: "quantum cats".into(),
            tone: "formal".into(),
            platform: "linkedin".into(),
        })
        .await;

    assert_eq!(response.text, "Schrodinger says hi");
    assert_eq!(response.video, PLACEHOLDER_VIDEO);
    assert!(response.sources.is_empty());

    post.assert_async().await;
}
