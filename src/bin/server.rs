//! Server binary for the emissions RAG pipeline

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emissions_rag::{AppConfig, AppState, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emissions_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::from_file(&path)?,
        None => AppConfig::default(),
    };

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        database = %config.database.path,
        "starting emissions-rag server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let state = AppState::new(config).await?;

    // Provider connectivity is advisory at startup; uploads surface hard
    // failures per job.
    if let Err(e) = state.embedder().health_check().await {
        tracing::warn!("embedding provider unreachable: {}", e);
    }
    if let Err(e) = state.completion().health_check().await {
        tracing::warn!("completion provider unreachable: {}", e);
    }

    Server::new(state).start().await?;
    Ok(())
}
