//! HTTP API gateway for gavel.
//!
//! Exposes the chat endpoints (synchronous and SSE), per-conversation
//! WebSocket channels, history management, and the embedded front end.
//!
//! Built on Axum for async HTTP.

pub mod frontend;
pub mod http;
pub mod ws;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::info;

use gavel_actions::LocalActionRunner;
use gavel_agent::{ConversationRegistry, SessionSettings};
use gavel_config::AppConfig;
use gavel_core::action::ActionRunner;
use gavel_core::provider::Provider;
use gavel_datastore::{RelationalStore, import_dir};
use gavel_history::ConversationStore;
use gavel_providers::OpenAiCompatProvider;

/// Shared application state for the gateway.
pub struct AppState {
    pub registry: ConversationRegistry,
    pub history: ConversationStore,
}

pub type SharedState = Arc<AppState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    // The front end may be served from a dev server on another port.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(http::chat_handler))
        .route("/api/chat/stream", post(http::chat_stream_handler))
        .route("/api/reset", post(http::reset_handler))
        .route(
            "/api/conversations",
            get(http::list_conversations_handler).post(http::create_conversation_handler),
        )
        .route("/ws/{conversation_id}", get(ws::ws_handler))
        .with_state(state)
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Build the gateway state from configuration: open the relational store,
/// import the tabular files, and wire provider, actions, and history into
/// the conversation registry.
pub async fn build_state(config: &AppConfig) -> Result<SharedState, Box<dyn std::error::Error>> {
    config.ensure_dirs()?;

    let store = RelationalStore::new(&config.data.db_path().display().to_string()).await?;
    let imported = import_dir(&store, &config.data.files_dir).await?;
    info!(tables = imported.len(), "Tabular import complete");

    let provider: Arc<dyn Provider> =
        Arc::new(OpenAiCompatProvider::from_config(&config.provider)?);
    let actions: Arc<dyn ActionRunner> =
        Arc::new(LocalActionRunner::new(store, &config.data.files_dir));
    let history = ConversationStore::new(&config.history.dir, &config.history.combined_file);

    let registry = ConversationRegistry::new(
        provider,
        actions,
        history.clone(),
        SessionSettings::from_config(config),
        Duration::from_secs(config.agent.idle_timeout_secs),
    );

    Ok(Arc::new(AppState { registry, history }))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = build_state(&config).await?;
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
