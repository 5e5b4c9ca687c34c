use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_MESSAGE_CHARS: usize = 5000;
const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Deserialize)]
pub struct FeedbackQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/user-feedback", post(submit_feedback))
        .route("/feedback", get(list_feedback))
        .with_state(state)
}

async fn submit_feedback(
    State(state): State<SharedState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Value::Object(feedback) = payload else {
        return Err(AppError::BadRequest("feedback must be a JSON object".into()));
    };
    if feedback.is_empty() {
        return Err(AppError::BadRequest("feedback is empty".into()));
    }

    if let Some(message) = feedback.get("message") {
        let message = message
            .as_str()
            .ok_or_else(|| AppError::BadRequest("message must be a string".into()))?;
        if message.trim().is_empty() {
            return Err(AppError::BadRequest("message is empty".into()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::PayloadTooLarge(format!(
                "message must be at most {MAX_MESSAGE_CHARS} characters"
            )));
        }
    }

    let record = state.store.save_user_feedback(feedback).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "feedback": record }))))
}

async fn list_feedback(
    State(state): State<SharedState>,
    Query(query): Query<FeedbackQuery>,
) -> Result<Json<Value>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let feedback = state.store.get_all_feedback(limit).await?;
    Ok(Json(json!({ "count": feedback.len(), "feedback": feedback })))
}
