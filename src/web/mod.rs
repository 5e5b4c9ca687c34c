pub mod ai_status;
pub mod analysis;
pub mod data;
pub mod feedback;
pub mod geo;
pub mod news;

use crate::error::AppError;
use crate::middleware::rate_limit_middleware;
use crate::state::SharedState;
use axum::{middleware, routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

pub const MAX_LOCATION_LEN: usize = 200;

async fn health() -> Json<Value> {
    Json(json!({ "status": "OK", "timestamp": Utc::now() }))
}

pub fn routes(state: SharedState) -> Router {
    let api = Router::new()
        .merge(analysis::router(state.clone()))
        .merge(ai_status::router(state.clone()))
        .merge(news::router(state.clone()))
        .merge(geo::router(state.clone()))
        .merge(feedback::router(state.clone()))
        .merge(data::router(state.clone()))
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new().route("/health", get(health)).nest("/api", api)
}

/// Trimmed location name; empty or over-long names are rejected.
pub(crate) fn require_location(raw: &str) -> Result<String, AppError> {
    let location = raw.trim();
    if location.is_empty() {
        return Err(AppError::BadRequest("location is required".into()));
    }
    if location.chars().count() > MAX_LOCATION_LEN {
        return Err(AppError::BadRequest(format!(
            "location must be at most {MAX_LOCATION_LEN} characters"
        )));
    }
    Ok(location.to_string())
}
