//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::Result;
use crate::extraction::ExtractionEngines;
use crate::fields::StructuredFieldExtractor;
use crate::ingestion::StagingArea;
use crate::processing::{JobQueue, RestartHandle, Supervisor, Worker};
use crate::providers::{
    CompletionProvider, EmbeddingProvider, MemoryVectorIndex, OpenAiClient, OpenAiCompletion,
    OpenAiEmbedder, RetryPolicy, VectorIndexProvider,
};
use crate::storage::Database;
use crate::transfer::ImportManager;

struct AppStateInner {
    config: AppConfig,
    db: Arc<Database>,
    queue: Arc<JobQueue>,
    staging: StagingArea,
    extractor: Arc<StructuredFieldExtractor>,
    imports: Arc<ImportManager>,
    index: Arc<dyn VectorIndexProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionProvider>,
}

/// Cloneable handle to everything the routes need
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

impl AppState {
    /// Production wiring: SQLite on disk, OpenAI-compatible providers, the
    /// in-memory vector index, and a supervised worker consuming the queue.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let db = Arc::new(Database::new(&config.database.path)?);

        // Separate clients so each concern keeps its own request timeout.
        let embed_client = Arc::new(OpenAiClient::new(
            config.embedding.base_url.clone(),
            api_key.clone(),
            Duration::from_secs(config.embedding.timeout_secs),
        )?);
        let completion_client = Arc::new(OpenAiClient::new(
            config.completion.base_url.clone(),
            api_key,
            Duration::from_secs(config.completion.timeout_secs),
        )?);
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(OpenAiEmbedder::new(embed_client, &config.embedding));
        let completion: Arc<dyn CompletionProvider> =
            Arc::new(OpenAiCompletion::new(completion_client, &config.completion));
        let index: Arc<dyn VectorIndexProvider> = Arc::new(MemoryVectorIndex::new());
        let engines = Arc::new(ExtractionEngines::from_config(&config.extraction)?);

        Self::from_parts(config, db, embedder, completion, index, engines).await
    }

    /// Wire the state from pre-built components (tests swap in doubles here)
    pub async fn from_parts(
        config: AppConfig,
        db: Arc<Database>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        index: Arc<dyn VectorIndexProvider>,
        engines: Arc<ExtractionEngines>,
    ) -> Result<Self> {
        let staging = StagingArea::new(
            config.staging.dir.clone(),
            config.staging.compress_threshold_bytes,
        );
        staging.reset().await?;

        let (queue, receiver) = JobQueue::new(db.clone(), &config.queue);
        queue.spawn_watchdog();

        let restart = RestartHandle::new();
        let worker = Arc::new(Worker::new(
            db.clone(),
            queue.clone(),
            engines,
            embedder.clone(),
            index.clone(),
            staging.clone(),
            restart.clone(),
            &config,
        ));
        Supervisor::new(worker, receiver, restart, &config.supervisor).spawn();

        let extractor = Arc::new(StructuredFieldExtractor::new(
            db.clone(),
            embedder.clone(),
            completion.clone(),
            index.clone(),
            RetryPolicy::from_config(&config.embedding),
            config.index.top_k,
        ));
        let imports = Arc::new(ImportManager::new(db.clone()));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                queue,
                staging,
                extractor,
                imports,
                index,
                embedder,
                completion,
            }),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.inner.db
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.inner.queue
    }

    pub fn staging(&self) -> &StagingArea {
        &self.inner.staging
    }

    pub fn extractor(&self) -> &Arc<StructuredFieldExtractor> {
        &self.inner.extractor
    }

    pub fn imports(&self) -> &Arc<ImportManager> {
        &self.inner.imports
    }

    pub fn index(&self) -> &Arc<dyn VectorIndexProvider> {
        &self.inner.index
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    pub fn completion(&self) -> &Arc<dyn CompletionProvider> {
        &self.inner.completion
    }
}
