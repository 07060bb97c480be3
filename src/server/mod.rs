//! HTTP server: router assembly and startup

pub mod routes;
pub mod state;

pub use state::AppState;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::Result;

/// The emissions RAG HTTP server
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Assemble the full router with middleware
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .nest(
                "/api",
                routes::api_routes(self.state.config().server.max_upload_size),
            )
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.state.config().server.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.with_state(self.state.clone())
    }

    /// Bind and serve until shutdown
    pub async fn start(self) -> Result<()> {
        let addr = format!(
            "{}:{}",
            self.state.config().server.host,
            self.state.config().server.port
        );
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("listening on {}", addr);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}

/// Liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe, reporting the wired providers and queue state
async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ready": true,
        "queue_drained": state.queue().is_drained(),
        "embedding_provider": state.embedder().name(),
        "completion_provider": state.completion().name(),
        "vector_index": state.index().name(),
    }))
}
