//! Bulk import and export endpoints

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::transfer::{export_csv, ConflictAction, ImportOutcome};

/// POST /api/transfer/import - Import an xlsx workbook of report rows
///
/// A conflict pauses the session and answers 409; the body carries the
/// session id for the resolve endpoint.
pub async fn import_workbook(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut workbook: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("unreadable multipart field: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Error::InvalidInput(format!("failed to read workbook: {}", e)))?;
            workbook = Some(bytes.to_vec());
        }
    }
    let workbook = workbook.ok_or_else(|| Error::InvalidInput("no file provided".to_string()))?;

    let outcome = state.imports().start(&workbook)?;
    Ok(outcome_response(outcome))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub action: ConflictAction,
}

/// POST /api/transfer/import/:session/resolve - Resolve a paused conflict
pub async fn resolve_import(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ResolveRequest>,
) -> Result<Response> {
    let outcome = state.imports().resolve(session_id, request.action)?;
    Ok(outcome_response(outcome))
}

fn outcome_response(outcome: ImportOutcome) -> Response {
    let status = match &outcome {
        ImportOutcome::Completed { .. } => StatusCode::OK,
        ImportOutcome::Paused { .. } => StatusCode::CONFLICT,
    };
    (status, Json(outcome)).into_response()
}

/// GET /api/transfer/export - Download every report as CSV
pub async fn export_reports(State(state): State<AppState>) -> Result<Response> {
    let csv = export_csv(state.db())?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"reports.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}
