//! The processing worker
//!
//! Consumes tasks from the queue one at a time and drives each document
//! through extraction, chunking, embedding, indexing, and language tagging,
//! reporting stage percentages along the way. Terminal transitions release
//! the processing slot; failures flush the vector query cache and request a
//! worker restart.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::extraction::ExtractionEngines;
use crate::ingestion::language::detect_language;
use crate::ingestion::{StagingArea, TextChunker};
use crate::processing::job_queue::JobQueue;
use crate::processing::supervisor::RestartHandle;
use crate::providers::{embed_with_retry, EmbeddingProvider, RetryPolicy, VectorIndexProvider};
use crate::storage::Database;
use crate::types::{ContentKind, EngineVariant, ProcessingTask, VectorRecord};

pub struct Worker {
    db: Arc<Database>,
    queue: Arc<JobQueue>,
    engines: Arc<ExtractionEngines>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndexProvider>,
    chunker: TextChunker,
    staging: StagingArea,
    retry: RetryPolicy,
    upsert_batch_size: usize,
    heartbeat_interval: Duration,
    restart: RestartHandle,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<Database>,
        queue: Arc<JobQueue>,
        engines: Arc<ExtractionEngines>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndexProvider>,
        staging: StagingArea,
        restart: RestartHandle,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            queue,
            engines,
            embedder,
            index,
            chunker: TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap),
            staging,
            retry: RetryPolicy::from_config(&config.embedding),
            upsert_batch_size: config.index.upsert_batch_size,
            heartbeat_interval: Duration::from_secs(
                (config.queue.liveness_window_secs / 2).max(1),
            ),
            restart,
        }
    }

    /// Consume tasks until the queue closes. The receiver is shared so a
    /// supervisor can restart the worker without losing queued tasks.
    pub async fn run(self: Arc<Self>, receiver: Arc<Mutex<mpsc::Receiver<ProcessingTask>>>) {
        tracing::info!("processing worker started");
        loop {
            let task = {
                let mut receiver = receiver.lock().await;
                receiver.recv().await
            };
            let Some(task) = task else {
                tracing::info!("queue closed, worker stopping");
                break;
            };
            self.handle(task).await;
        }
    }

    /// Process one task end to end, including terminal status transitions
    pub async fn handle(&self, task: ProcessingTask) {
        let job_id = task.job_id;
        let document_id = task.document_id;
        tracing::info!(%job_id, engine = %task.engine, file = %task.filename, "processing document");

        match self.process(&task).await {
            Ok(()) => {
                if let Err(e) = self.queue.status().complete(job_id, document_id) {
                    tracing::error!(%job_id, "failed to persist completion: {}", e);
                }
                if let Err(e) = self.queue.finish(job_id) {
                    tracing::error!(%job_id, "failed to release slot: {}", e);
                }
                if self.queue.is_drained() {
                    if let Err(e) = self.index.flush_cache().await {
                        tracing::error!("cache flush failed: {}", e);
                    }
                    self.restart.request();
                }
                tracing::info!(%job_id, "document processed");
            }
            Err(e) => {
                tracing::error!(%job_id, "processing failed: {}", e);
                if let Err(persist) =
                    self.queue
                        .status()
                        .error(job_id, document_id, &e.to_string(), e.code())
                {
                    tracing::error!(%job_id, "failed to persist error status: {}", persist);
                }
                if let Err(flush) = self.index.flush_cache().await {
                    tracing::error!("cache flush failed: {}", flush);
                }
                if let Err(release) = self.queue.finish(job_id) {
                    tracing::error!(%job_id, "failed to release slot: {}", release);
                }
                self.restart.request();
                // Scratch contents are job-owned, clear them where safe.
                if let Err(cleanup) = self.staging.reset().await {
                    tracing::warn!("staging cleanup after failure failed: {}", cleanup);
                }
            }
        }
    }

    async fn progress(&self, job_id: Uuid, document_id: i64, percent: u8) -> Result<()> {
        self.queue.heartbeat(job_id);
        self.queue.status().progress(job_id, document_id, percent)
    }

    /// Report the next stage percentage from the engine's sequence
    async fn next_stage(
        &self,
        stages: &mut impl Iterator<Item = u8>,
        job_id: Uuid,
        document_id: i64,
    ) -> Result<()> {
        if let Some(percent) = stages.next() {
            self.progress(job_id, document_id, percent).await?;
        }
        Ok(())
    }

    /// Feed the stall watchdog while a stage runs with no natural
    /// progress points, like a remote extraction that takes minutes.
    fn keep_alive(&self, job_id: Uuid) -> tokio::task::JoinHandle<()> {
        let queue = self.queue.clone();
        let interval = self.heartbeat_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                queue.heartbeat(job_id);
            }
        })
    }

    async fn process(&self, task: &ProcessingTask) -> Result<()> {
        let job_id = task.job_id;
        let document_id = task.document_id;
        let layout = task.engine == EngineVariant::Layout;
        // The final 100% belongs to the COMPLETE transition.
        let mut stages = task
            .engine
            .stage_percentages()
            .iter()
            .copied()
            .filter(|p| *p < 100);

        self.next_stage(&mut stages, job_id, document_id).await?;

        let staged = self.staging.path_for(&task.filename);
        let backend = self.engines.select(task.engine);
        let keepalive = self.keep_alive(job_id);
        let extracted = backend.extract(&staged).await;
        keepalive.abort();
        let output = extracted?;
        self.next_stage(&mut stages, job_id, document_id).await?;

        // A reprocessed company replaces its previous corpus.
        self.index.delete_company(&task.company_name).await?;

        let chunks = self.chunker.split(&output.text);
        tracing::info!(%job_id, chunks = chunks.len(), tables = output.tables.len(), "content chunked");

        let mut records = Vec::with_capacity(chunks.len() + output.tables.len());
        for chunk in &chunks {
            let vector = embed_with_retry(self.embedder.as_ref(), &self.retry, chunk).await?;
            records.push(VectorRecord::new(
                &task.company_name,
                ContentKind::Text,
                chunk.clone(),
                vector,
            ));
            self.queue.heartbeat(job_id);
        }
        self.next_stage(&mut stages, job_id, document_id).await?;

        for table in &output.tables {
            let vector = embed_with_retry(self.embedder.as_ref(), &self.retry, table).await?;
            records.push(VectorRecord::new(
                &task.company_name,
                ContentKind::Table,
                table.clone(),
                vector,
            ));
            self.queue.heartbeat(job_id);
        }
        if layout {
            self.next_stage(&mut stages, job_id, document_id).await?;
        }

        for batch in records.chunks(self.upsert_batch_size) {
            self.index.upsert(batch.to_vec()).await?;
            self.queue.heartbeat(job_id);
        }
        self.next_stage(&mut stages, job_id, document_id).await?;

        let language = detect_language(&output.text);
        self.db.update_report_language(document_id, &language)?;
        self.staging.reset().await?;
        if layout {
            self.next_stage(&mut stages, job_id, document_id).await?;
        }

        Ok(())
    }
}

/// Convenience check used by the upload route: PDFs only
pub fn validate_pdf(filename: &str, content_type: Option<&str>) -> Result<()> {
    let is_pdf_mime = content_type
        .map(|c| c == "application/pdf")
        .unwrap_or(false);
    let guessed_pdf = mime_guess::from_path(filename)
        .first()
        .map(|m| m.essence_str() == "application/pdf")
        .unwrap_or(false);
    if is_pdf_mime || guessed_pdf {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "only PDF uploads are accepted, got {:?}",
            content_type
        )))
    }
}
