use crate::domain::models::Article;
use crate::error::AppError;
use crate::state::SharedState;
use crate::web::require_location;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct NewsPayload {
    pub location: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct NewsResponse {
    pub location: String,
    pub count: usize,
    pub articles: Vec<Article>,
}

pub fn router(state: SharedState) -> Router {
    Router::new().route("/news", post(fetch_news)).with_state(state)
}

async fn fetch_news(
    State(state): State<SharedState>,
    Json(payload): Json<NewsPayload>,
) -> Result<Json<NewsResponse>, AppError> {
    let location = require_location(&payload.location)?;
    let limit = payload.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let articles = state.news.fetch_articles(&location, limit).await;
    Ok(Json(NewsResponse {
        location,
        count: articles.len(),
        articles,
    }))
}
