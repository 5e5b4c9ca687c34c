use crate::error::AppError;
use crate::services::geocoding::GeoPlace;
use crate::state::SharedState;
use crate::web::MAX_LOCATION_LEN;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct GeoQuery {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct GeoResponse {
    pub results: Vec<GeoPlace>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/geocode", get(geocode))
        .route("/autocomplete", get(autocomplete))
        .with_state(state)
}

fn query_text(query: &GeoQuery) -> Result<&str, AppError> {
    let text = query.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("text query parameter is required".into()));
    }
    if text.chars().count() > MAX_LOCATION_LEN {
        return Err(AppError::BadRequest(format!(
            "text must be at most {MAX_LOCATION_LEN} characters"
        )));
    }
    Ok(text)
}

async fn geocode(
    State(state): State<SharedState>,
    Query(query): Query<GeoQuery>,
) -> Result<Json<GeoResponse>, AppError> {
    let text = query_text(&query)?;
    let results = state.geo.search(text).await?;
    Ok(Json(GeoResponse { results }))
}

async fn autocomplete(
    State(state): State<SharedState>,
    Query(query): Query<GeoQuery>,
) -> Result<Json<GeoResponse>, AppError> {
    let text = query_text(&query)?;
    let results = state.geo.autocomplete(text, query.limit.unwrap_or(5)).await?;
    Ok(Json(GeoResponse { results }))
}
