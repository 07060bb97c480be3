//! Document upload endpoint

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::processing::worker::validate_pdf;
use crate::server::state::AppState;
use crate::types::{EngineVariant, ProcessingTask};

/// Response for an accepted upload
#[derive(Debug, Serialize)]
pub struct UploadAccepted {
    pub job_id: Uuid,
    pub document_id: i64,
    pub status: &'static str,
    pub msg: String,
}

struct UploadForm {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
    company_name: String,
    source_link: Option<String>,
    engine: EngineVariant,
}

/// POST /api/reports/upload - Accept one PDF and start processing it
///
/// The single processing slot is claimed before anything touches the staging
/// area; a busy slot returns 409 together with the in-flight job's log row.
pub async fn upload_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response> {
    let form = read_form(multipart).await?;
    validate_pdf(&form.filename, form.content_type.as_deref())?;

    let job_id = Uuid::new_v4();
    match state.queue().try_acquire(job_id) {
        Ok(()) => {}
        Err(Error::JobInFlight) => {
            let log = state.queue().status().current()?;
            return Ok((
                StatusCode::CONFLICT,
                Json(json!({
                    "status": false,
                    "msg": "A document is already being processed",
                    "log": log,
                })),
            )
                .into_response());
        }
        Err(e) => return Err(e),
    }

    match accept(&state, job_id, form).await {
        Ok(accepted) => Ok((StatusCode::ACCEPTED, Json(accepted)).into_response()),
        Err(e) => {
            // Free the slot so the failed upload does not wedge the queue.
            if let Err(release) = state.queue().finish(job_id) {
                tracing::error!(%job_id, "failed to release slot after upload error: {}", release);
            }
            Err(e)
        }
    }
}

async fn accept(state: &AppState, job_id: Uuid, form: UploadForm) -> Result<UploadAccepted> {
    let document_id = state
        .db()
        .insert_report(&form.company_name, form.source_link.as_deref())?;

    let staged = state.staging().stage(&form.filename, &form.bytes).await?;
    let filename = staged
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .unwrap_or(form.filename);

    tracing::info!(
        %job_id,
        document_id,
        company = %form.company_name,
        engine = %form.engine,
        size = form.bytes.len(),
        "upload accepted"
    );

    state
        .queue()
        .submit(ProcessingTask {
            job_id,
            document_id,
            company_name: form.company_name,
            filename,
            engine: form.engine,
        })
        .await?;

    Ok(UploadAccepted {
        job_id,
        document_id,
        status: "processing",
        msg: "Job is still processing.".to_string(),
    })
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut company_name: Option<String> = None;
    let mut source_link: Option<String> = None;
    let mut engine = EngineVariant::Layout;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("unreadable multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| Error::InvalidInput("file field has no filename".to_string()))?;
                let content_type = field.content_type().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::InvalidInput(format!("failed to read file: {}", e)))?
                    .to_vec();
                file = Some((filename, content_type, bytes));
            }
            "company_name" => company_name = Some(text_field(field).await?),
            "source_link" => source_link = Some(text_field(field).await?),
            "engine" => engine = EngineVariant::parse(&text_field(field).await?)?,
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| Error::InvalidInput("no file provided".to_string()))?;
    if bytes.is_empty() {
        return Err(Error::InvalidInput("uploaded file is empty".to_string()));
    }
    let company_name = company_name
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| Error::InvalidInput("company_name is required".to_string()))?;

    Ok(UploadForm {
        filename,
        content_type,
        bytes,
        company_name,
        source_link,
        engine,
    })
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| Error::InvalidInput(format!("unreadable multipart field: {}", e)))
}
