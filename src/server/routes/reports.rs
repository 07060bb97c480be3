//! Report search, structured extraction, and schema endpoints

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::Report;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub company: Option<String>,
    pub country: Option<String>,
    pub max_revenue: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub total: usize,
    pub reports: Vec<Report>,
}

/// GET /api/reports - Filtered report search
pub async fn search_reports(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let reports = state.db().search_reports(
        params.company.as_deref(),
        params.country.as_deref(),
        params.max_revenue,
    )?;
    Ok(Json(SearchResponse {
        total: reports.len(),
        reports,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ExtractParams {
    pub year: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub report_id: i64,
    pub year: String,
    pub fields: BTreeMap<String, String>,
}

/// POST /api/reports/:id/extract - Run the structured field extraction
pub async fn extract_fields(
    State(state): State<AppState>,
    Path(report_id): Path<i64>,
    Query(params): Query<ExtractParams>,
) -> Result<Json<ExtractResponse>> {
    let fields = state.extractor().extract(report_id, &params.year).await?;
    Ok(Json(ExtractResponse {
        report_id,
        year: params.year,
        fields,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AddColumnRequest {
    pub column: String,
}

/// POST /api/schema/columns - Add an allow-listed emissions column
pub async fn add_column(
    State(state): State<AppState>,
    Json(request): Json<AddColumnRequest>,
) -> Result<Json<serde_json::Value>> {
    state.db().add_emissions_column(&request.column)?;
    tracing::info!(column = %request.column, "emissions column added");
    Ok(Json(json!({
        "status": true,
        "column": request.column,
    })))
}
