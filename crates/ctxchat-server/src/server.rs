use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use ctxchat_core::context::DEFAULT_MAX_URLS;
use ctxchat_core::LlmBackend;
use ctxchat_extract::SourceExtractor;
use ctxchat_store::ContextStore;

use crate::handlers;
use crate::orchestrator::ChatOrchestrator;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_urls: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            max_urls: DEFAULT_MAX_URLS,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ChatOrchestrator>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat))
        .route("/chat-stream", post(handlers::chat_stream))
        .route("/add-url", post(handlers::add_url))
        .route("/remove-url", post(handlers::remove_url))
        .route("/add-document", post(handlers::add_document))
        .route("/remove-document", post(handlers::remove_document))
        .route("/get-context-items", get(handlers::get_context_items))
        .route("/get-urls", get(handlers::get_urls))
        .route("/reset-context", post(handlers::reset_context))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle carrying the bound port.
pub async fn start(
    config: ServerConfig,
    store: ContextStore,
    extractor: Arc<dyn SourceExtractor>,
    backend: Arc<dyn LlmBackend>,
) -> Result<ServerHandle, std::io::Error> {
    let orchestrator = Arc::new(ChatOrchestrator::new(
        store,
        extractor,
        backend,
        config.max_urls,
    ));
    let router = build_router(AppState { orchestrator });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "ctxchat server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
    })
}

/// Handle returned by `start()` — keeps the serve task alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxchat_extract::MockExtractor;
    use ctxchat_llm::{MockBackend, MockReply};

    async fn serve(replies: Vec<MockReply>) -> ServerHandle {
        let config = ServerConfig {
            port: 0, // Random port
            ..Default::default()
        };
        start(
            config,
            ContextStore::new(),
            Arc::new(MockExtractor::new()),
            Arc::new(MockBackend::new(replies)),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let handle = serve(vec![]).await;
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn end_to_end_chat_over_http() {
        let handle = serve(vec![MockReply::text("Hi there")]).await;

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("http://127.0.0.1:{}/chat", handle.port))
            .json(&serde_json::json!({"user_id": "u1", "message": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["response"], "Hi there");
    }

    #[tokio::test]
    async fn end_to_end_stream_over_http() {
        let handle = serve(vec![MockReply::fragments(&["He", "llo"])]).await;

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("http://127.0.0.1:{}/chat-stream", handle.port))
            .json(&serde_json::json!({"user_id": "u1", "message": "hi"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "Hello");
    }

    #[test]
    fn build_router_creates_routes() {
        let orchestrator = Arc::new(ChatOrchestrator::new(
            ContextStore::new(),
            Arc::new(MockExtractor::new()),
            Arc::new(MockBackend::new(vec![])),
            DEFAULT_MAX_URLS,
        ));
        let _router = build_router(AppState { orchestrator });
        // If this doesn't panic, the router was built successfully
    }

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_urls, 3);
    }
}
