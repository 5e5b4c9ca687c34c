use crate::services::ai_manager::ManagerStatus;
use crate::state::SharedState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct FallbackPayload {
    pub enabled: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackResponse {
    pub fallback_enabled: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/ai/status", get(status))
        .route("/ai/reset", post(reset))
        .route("/ai/fallback", post(set_fallback))
        .with_state(state)
}

async fn status(State(state): State<SharedState>) -> Json<ManagerStatus> {
    Json(state.ai.status().await)
}

async fn reset(State(state): State<SharedState>) -> Json<ManagerStatus> {
    state.ai.reset_status().await;
    Json(state.ai.status().await)
}

async fn set_fallback(
    State(state): State<SharedState>,
    Json(payload): Json<FallbackPayload>,
) -> Json<FallbackResponse> {
    state.ai.set_fallback_enabled(payload.enabled);
    Json(FallbackResponse {
        fallback_enabled: state.ai.fallback_enabled(),
    })
}
