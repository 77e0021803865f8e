use std::sync::Arc;

use ctxchat_extract::HttpExtractor;
use ctxchat_llm::{OllamaBackend, OllamaConfig};
use ctxchat_server::ServerConfig;
use ctxchat_store::ContextStore;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting ctxchat server");

    let mut config = ServerConfig::default();
    if let Some(port) = std::env::var("CTXCHAT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
    {
        config.port = port;
    }
    if let Some(max_urls) = std::env::var("CTXCHAT_MAX_URLS")
        .ok()
        .and_then(|m| m.parse().ok())
    {
        config.max_urls = max_urls;
    }

    let mut ollama = OllamaConfig::default();
    if let Ok(base_url) = std::env::var("OLLAMA_URL") {
        ollama.base_url = base_url;
    }
    if let Ok(model) = std::env::var("OLLAMA_MODEL") {
        ollama.model = model;
    }
    tracing::info!(base_url = %ollama.base_url, model = %ollama.model, "Using Ollama backend");

    let store = ContextStore::new();
    let extractor = Arc::new(HttpExtractor::new());
    let backend = Arc::new(OllamaBackend::new(ollama));

    let port = config.port;
    let _handle = ctxchat_server::start(config, store, extractor, backend)
        .await
        .expect("Failed to start server");

    tracing::info!(port = port, "ctxchat server ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
