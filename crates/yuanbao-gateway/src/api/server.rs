//! HTTP server: shared state, routing and lifecycle

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{ollama, openai, responses};
use crate::error::{GatewayError, Result};
use crate::orchestrator::RetryOrchestrator;
use crate::session::SessionStore;

/// Shared application state for all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    /// Sends prompts with session recovery
    pub orchestrator: Arc<RetryOrchestrator>,
    /// Conversation registry behind the orchestrator
    pub store: Arc<SessionStore>,
}

impl AppState {
    pub fn new(orchestrator: Arc<RetryOrchestrator>) -> Self {
        let store = orchestrator.store().clone();
        Self { orchestrator, store }
    }
}

/// The gateway HTTP server
pub struct GatewayServer {
    listen_addr: String,
    state: Arc<AppState>,
}

impl GatewayServer {
    pub fn new(listen_addr: impl Into<String>, state: Arc<AppState>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            state,
        }
    }

    /// Bind and serve until Ctrl+C or SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let addr: SocketAddr = self
            .listen_addr
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid listen address: {e}")))?;

        let app = create_router(self.state.clone());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Server(format!("Failed to bind to {addr}: {e}")))?;

        tracing::info!("Gateway listening on http://{addr}");
        tracing::info!("OpenAI endpoint: http://{addr}/v1/chat/completions");
        tracing::info!("Ollama endpoints: http://{addr}/api/generate, http://{addr}/api/chat");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Server(format!("Server error: {e}")))?;

        tracing::info!("Gateway shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/tags", get(ollama::tags))
        .route("/api/version", get(ollama::version))
        .route("/api/generate", post(ollama::generate))
        .route("/api/chat", post(ollama::chat))
        .route("/api/clear_conversations", get(clear_conversations_handler))
        .route("/v1/models", get(openai::list_models))
        .route("/v1/chat/completions", post(openai::chat_completions))
        .route("/v1/responses", post(responses::responses))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn root_handler() -> Json<Value> {
    Json(serde_json::json!({"message": "Yuanbao API is running"}))
}

/// Health check endpoint - returns JSON status
async fn health_handler() -> Json<Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Forget all cached conversations so the next request starts fresh
async fn clear_conversations_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.store.clear_all();
    Json(serde_json::json!({"status": "ok", "message": "所有对话缓存已清除"}))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubBackend;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let stub = Arc::new(StubBackend::new());
        let store = Arc::new(SessionStore::new(stub.clone()));
        let orchestrator = Arc::new(RetryOrchestrator::new(store, stub, 1));
        Arc::new(AppState::new(orchestrator))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, json) = get_json(create_router(test_state()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let (_, json) = get_json(create_router(test_state()), "/").await;
        assert_eq!(json["message"], "Yuanbao API is running");
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let (_, json) = get_json(create_router(test_state()), "/api/version").await;
        assert_eq!(json["version"], "1.0.0");
    }

    #[tokio::test]
    async fn test_clear_conversations() {
        let state = test_state();
        state.store.get_or_create("deepseek_v3", false).await.unwrap();

        let (status, json) = get_json(create_router(state.clone()), "/api/clear_conversations").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["message"], "所有对话缓存已清除");
        assert!(state.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = create_router(test_state())
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
