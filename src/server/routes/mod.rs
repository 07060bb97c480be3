//! API routes for the emissions RAG server

pub mod jobs;
pub mod reports;
pub mod transfer;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Upload and job lifecycle - larger body limit for file uploads
        .route(
            "/reports/upload",
            post(upload::upload_report).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/jobs/status", get(jobs::job_status))
        // Reports and structured extraction
        .route("/reports", get(reports::search_reports))
        .route("/reports/:id/extract", post(reports::extract_fields))
        .route("/schema/columns", post(reports::add_column))
        // Bulk transfer
        .route(
            "/transfer/import",
            post(transfer::import_workbook).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/transfer/import/:session/resolve",
            post(transfer::resolve_import),
        )
        .route("/transfer/export", get(transfer::export_reports))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "emissions-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Sustainability report ingestion with retrieval-augmented emissions extraction",
        "endpoints": {
            "POST /api/reports/upload": "Upload a PDF report for processing",
            "GET /api/jobs/status": "Current job's log row",
            "GET /api/reports": "Search report records",
            "POST /api/reports/:id/extract": "Run structured emissions extraction",
            "POST /api/schema/columns": "Add an allow-listed emissions column",
            "POST /api/transfer/import": "Import an xlsx workbook",
            "POST /api/transfer/import/:session/resolve": "Resolve an import conflict",
            "GET /api/transfer/export": "Export every report as CSV"
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::{Json, Query, State};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::error::{Error, Result};
    use crate::extraction::{ExtractionBackend, ExtractionEngines, ExtractionOutput};
    use crate::providers::{CompletionProvider, EmbeddingProvider, MemoryVectorIndex};
    use crate::storage::Database;
    use crate::types::EngineVariant;

    struct NullBackend;

    #[async_trait]
    impl ExtractionBackend for NullBackend {
        async fn extract(&self, _staged_file: &Path) -> Result<ExtractionOutput> {
            Ok(ExtractionOutput {
                text: String::new(),
                tables: Vec::new(),
            })
        }

        fn variant(&self) -> EngineVariant {
            EngineVariant::Partition
        }
    }

    /// Extraction that never finishes, so the job keeps the slot
    struct PendingBackend;

    #[async_trait]
    impl ExtractionBackend for PendingBackend {
        async fn extract(&self, _staged_file: &Path) -> Result<ExtractionOutput> {
            std::future::pending().await
        }

        fn variant(&self) -> EngineVariant {
            EngineVariant::Layout
        }
    }

    struct NullEmbedder;

    #[async_trait]
    impl EmbeddingProvider for NullEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "null"
        }
    }

    struct NullCompletion;

    #[async_trait]
    impl CompletionProvider for NullCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("{}".to_string())
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "null"
        }

        fn model(&self) -> &str {
            "null"
        }
    }

    async fn test_state() -> (AppState, tempfile::TempDir) {
        test_state_with(Arc::new(NullBackend)).await
    }

    async fn test_state_with(
        backend: Arc<dyn ExtractionBackend>,
    ) -> (AppState, tempfile::TempDir) {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.staging.dir = scratch
            .path()
            .join("scratch")
            .to_string_lossy()
            .into_owned();

        let engines = Arc::new(ExtractionEngines::with_backends(
            backend.clone(),
            backend.clone(),
            backend,
        ));
        let state = AppState::from_parts(
            config,
            Arc::new(Database::in_memory().unwrap()),
            Arc::new(NullEmbedder),
            Arc::new(NullCompletion),
            Arc::new(MemoryVectorIndex::new()),
            engines,
        )
        .await
        .unwrap();
        (state, scratch)
    }

    fn pdf_upload_request() -> Request<Body> {
        let boundary = "upload-test-boundary";
        let body = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"company_name\"\r\n\r\n\
             Acme\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"report.pdf\"\r\n\
             Content-Type: application/pdf\r\n\r\n\
             %PDF-1.4 test document\r\n\
             --{b}--\r\n",
            b = boundary
        );
        Request::builder()
            .method("POST")
            .uri("/api/reports/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn upload_is_accepted_then_conflicts_while_the_job_runs() {
        let (state, _scratch) = test_state_with(Arc::new(PendingBackend)).await;
        let router = crate::server::Server::new(state).build_router();

        let first = router.clone().oneshot(pdf_upload_request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);
        let body = json_body(first).await;
        assert_eq!(body["status"], "processing");
        assert_eq!(body["msg"], "Job is still processing.");

        // The slot is still held, so a second upload is turned away with
        // the in-flight job's log row.
        let second = router.oneshot(pdf_upload_request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let body = json_body(second).await;
        assert_eq!(body["status"], false);
        assert_eq!(body["msg"], "A document is already being processed");
        assert_eq!(body["log"]["status"], "ONGOING");
        assert_eq!(body["log"]["msg"], "Job is still processing.");
    }

    #[tokio::test]
    async fn idle_status_answers_with_the_placeholder() {
        let (state, _scratch) = test_state().await;
        let response = jobs::job_status(State(state)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn search_on_an_empty_database_is_empty() {
        let (state, _scratch) = test_state().await;
        let Json(body) = reports::search_reports(
            State(state),
            Query(reports::SearchParams {
                company: None,
                country: None,
                max_revenue: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(body.total, 0);
    }

    #[tokio::test]
    async fn allowed_column_is_added_and_unknown_is_rejected() {
        let (state, _scratch) = test_state().await;

        reports::add_column(
            State(state.clone()),
            Json(reports::AddColumnRequest {
                column: "biogenic_total".to_string(),
            }),
        )
        .await
        .unwrap();

        let err = reports::add_column(
            State(state),
            Json(reports::AddColumnRequest {
                column: "emissions; DROP TABLE reports".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::ColumnNotAllowed(_)));
    }
}
