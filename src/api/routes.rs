use crate::api::state::AppState;
use crate::core::etl::EtlEngine;
use crate::core::pipeline::{parse_records, JsonLoadPipeline};
use crate::core::Storage;
use crate::domain::model::{LoadOutcome, RevenueReport, Sundae, SundaeWithMetrics, TableSchema};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_identifier;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub const DEFAULT_ROW_LIMIT: i64 = 100;
pub const MAX_ROW_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct RowsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "Welcome to the Ice Cream Parlor API!" }))
}

pub async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    state.db.ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn list_sundaes_handler(State(state): State<AppState>) -> Result<Json<Vec<Sundae>>> {
    Ok(Json(state.db.list_sundaes().await?))
}

pub async fn sundae_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SundaeWithMetrics>> {
    state
        .db
        .sundae_with_metrics(&id)
        .await?
        .map(Json)
        .ok_or_else(|| EtlError::not_found("Sundae"))
}

pub async fn revenue_report_handler(State(state): State<AppState>) -> Result<Json<RevenueReport>> {
    Ok(Json(state.db.revenue_report().await?))
}

pub async fn list_tables_handler(State(state): State<AppState>) -> Result<Json<Vec<TableSchema>>> {
    Ok(Json(state.db.list_tables().await?))
}

pub async fn table_rows_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
    query: std::result::Result<Query<RowsQuery>, QueryRejection>,
) -> Result<Json<Vec<Map<String, Value>>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_ROW_LIMIT).clamp(0, MAX_ROW_LIMIT);
    Ok(Json(state.db.fetch_rows(&table, limit).await?))
}

/// Stores the uploaded array under the upload directory, then runs it through
/// the JSON loader like any other file.
pub async fn upload_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
    query: std::result::Result<Query<UploadQuery>, QueryRejection>,
    body: Bytes,
) -> Result<(StatusCode, Json<LoadOutcome>)> {
    let Query(query) = query?;
    validate_identifier(&table)?;
    let records = parse_records(&body)?;
    tracing::info!("🔼 Received {} records for '{}'", records.len(), table);

    let file_name = format!("{}-{}.json", table, Utc::now().format("%Y%m%dT%H%M%S%.6f"));
    state.uploads.write_file(&file_name, &body).await?;

    let pipeline = JsonLoadPipeline::new(
        state.uploads.clone(),
        state.db.clone(),
        file_name,
        Some(table),
    )?
    .dry_run(query.dry_run);
    let outcome = EtlEngine::new(pipeline).run().await?;

    let status = if outcome.applied {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}
