use crate::db::{DataExport, StoreStatistics};
use crate::domain::aggregation::{location_summary, LocationSummary};
use crate::domain::models::AnalysisRecord;
use crate::error::AppError;
use crate::state::SharedState;
use crate::web::require_location;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DEFAULT_HISTORY_LIMIT: usize = 10;
const MAX_HISTORY_LIMIT: usize = 100;
const DEFAULT_DAYS_BACK: u32 = 30;
const MAX_DAYS_BACK: u32 = 365;
/// Records considered for per-location statistics.
const STATISTICS_WINDOW: usize = 500;

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPayload {
    pub location: String,
    #[serde(default)]
    pub days_back: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub location: String,
    pub count: usize,
    pub history: Vec<AnalysisRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalResponse {
    pub location: String,
    pub days_back: u32,
    pub records: Vec<AnalysisRecord>,
    pub summary: LocationSummary,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/history", get(history))
        .route("/historical-data", post(historical_data))
        .route("/location-statistics", get(location_statistics))
        .route("/statistics", get(statistics))
        .route("/cleanup-cache", post(cleanup_cache))
        .route("/export", get(export))
        .with_state(state)
}

async fn history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let location = require_location(&query.location)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let history = state
        .store
        .get_emotional_analysis_history(&location, limit)
        .await?;
    Ok(Json(HistoryResponse {
        location,
        count: history.len(),
        history,
    }))
}

async fn historical_data(
    State(state): State<SharedState>,
    Json(payload): Json<HistoricalPayload>,
) -> Result<Json<HistoricalResponse>, AppError> {
    let location = require_location(&payload.location)?;
    let days_back = payload
        .days_back
        .unwrap_or(DEFAULT_DAYS_BACK)
        .clamp(1, MAX_DAYS_BACK);

    let records = state.store.history_since(&location, days_back).await?;
    let summary = location_summary(&location, &records);
    Ok(Json(HistoricalResponse {
        location,
        days_back,
        records,
        summary,
    }))
}

async fn location_statistics(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<LocationSummary>, AppError> {
    let location = require_location(&query.location)?;
    let history = state
        .store
        .get_emotional_analysis_history(&location, STATISTICS_WINDOW)
        .await?;
    Ok(Json(location_summary(&location, &history)))
}

async fn statistics(State(state): State<SharedState>) -> Result<Json<StoreStatistics>, AppError> {
    Ok(Json(state.store.get_statistics().await?))
}

async fn cleanup_cache(State(state): State<SharedState>) -> Result<Json<Value>, AppError> {
    let cleaned = state.store.clean_old_cache().await?;
    Ok(Json(json!({ "success": true, "cleaned": cleaned })))
}

async fn export(State(state): State<SharedState>) -> Result<Json<DataExport>, AppError> {
    Ok(Json(state.store.export_all_data().await?))
}
