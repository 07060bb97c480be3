//! Job status endpoint

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::Result;
use crate::server::state::AppState;

/// GET /api/jobs/status - Current job's log row
///
/// The logs table is a single-row mailbox; when it is empty (fresh database,
/// or a log swap in progress) the response is a synthetic ONGOING placeholder
/// with a 202 so pollers keep polling.
pub async fn job_status(State(state): State<AppState>) -> Result<Response> {
    match state.queue().status().current()? {
        Some(log) => Ok((StatusCode::OK, Json(log)).into_response()),
        None => Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "ONGOING",
                "msg": "Job is still processing.",
            })),
        )
            .into_response()),
    }
}
