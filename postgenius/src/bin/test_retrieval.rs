use std::path::Path;

use common::Config;
use postgenius::pipeline::ContentPipeline;

/// Manual check of enrichment + retrieval against the live APIs.
///
/// Usage: test_retrieval "<prompt>" [tone] [platform]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    dotenv::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let prompt = args
        .next()
        .unwrap_or_else(|| "latest breakthroughs in renewable energy".to_string());
    let tone = args.next().unwrap_or_else(|| "humorous".to_string());
    let platform = args.next().unwrap_or_else(|| "twitter".to_string());

    let config = Config::load_with_defaults(
        Some(Path::new("config.default.toml")),
        Some(Path::new("config.toml")),
    )
    .await?;
    let pipeline = ContentPipeline::from_config(&config)?;

    println!("\n{}", "=".repeat(60));
    println!("Prompt:   {}", prompt);
    println!("Tone:     {}", tone);
    println!("Platform: {}", platform);
    println!("Integrations: {:?}", pipeline.integrations());
    println!("{}", "=".repeat(60));

    let retrieval = pipeline.retrieve(&prompt, &tone, &platform).await;

    println!("\nEnriched prompt:");
    println!("{}", serde_json::to_string_pretty(&retrieval.enriched)?);

    println!("\n{} documents:", retrieval.documents.len());
    for doc in &retrieval.documents {
        println!("{}", serde_json::to_string_pretty(doc)?);
    }

    Ok(())
}
