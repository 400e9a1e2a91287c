//! docscope server binary
//!
//! Run with: cargo run -p docscope --bin docscope-server

use docscope::{config::DocscopeConfig, providers::OllamaClient, server::DocscopeServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docscope=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("DOCSCOPE_CONFIG").ok().map(PathBuf::from);
    let config = DocscopeConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Analysis model: {}", config.llm.analysis_model);
    tracing::info!("  - Vision model: {}", config.llm.vision_model);
    tracing::info!("  - Work dir: {}", config.ingestion.work_dir.display());
    tracing::info!("  - Reports: {}", config.report.output_dir.display());
    tracing::info!("  - Max upload: {} bytes", config.server.max_upload_size);

    // Check Ollama
    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    let ollama = OllamaClient::new(&config.llm)?;
    if ollama.health_check().await? {
        tracing::info!("Ollama is running");
    } else {
        tracing::warn!("Ollama not available at {}", config.llm.base_url);
        tracing::warn!(
            "Jobs will fail at the analysis stage until it is reachable: ollama pull {} && ollama pull {}",
            config.llm.analysis_model,
            config.llm.vision_model
        );
    }

    let server = DocscopeServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/analyze                    - Upload documents for analysis");
    println!("  GET  /api/jobs/:job_id               - Poll job status");
    println!("  GET  /api/documents/:document_id/job - Completed job for a document");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
