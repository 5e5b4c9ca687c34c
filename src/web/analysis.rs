use crate::domain::aggregation::AggregatedAnalysis;
use crate::domain::models::{
    Article, CrimeTimeline, ImageAnalysis, Insights, LocationVerification, SentimentAnalysis,
};
use crate::error::AppError;
use crate::services::prompts::articles_digest;
use crate::services::providers::InlineImage;
use crate::state::SharedState;
use crate::web::require_location;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ARTICLE_LIMIT: usize = 20;
const DEFAULT_TIMELINE_MONTHS: u32 = 6;
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
/// Base64 inflates by 4/3; the rest leaves room for the JSON envelope.
const MAX_IMAGE_BODY_BYTES: usize = MAX_IMAGE_BYTES / 3 * 4 + 64 * 1024;
const NO_PROVIDER_RESULT: &str = "All AI providers are currently unavailable";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionalAnalysisPayload {
    pub location: String,
    #[serde(default)]
    pub articles: Option<Vec<Article>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub persist: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionalAnalysisResponse {
    #[serde(flatten)]
    pub analysis: SentimentAnalysis,
    pub articles_analyzed: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePayload {
    pub location: String,
    #[serde(default)]
    pub months: Option<u32>,
    #[serde(default)]
    pub articles: Option<Vec<Article>>,
}

#[derive(Deserialize)]
pub struct LocationPayload {
    pub location: String,
}

#[derive(Deserialize)]
pub struct InsightsPayload {
    pub location: String,
    pub analysis: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub location: String,
    pub image_base64: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Deserialize)]
pub struct ComparePayload {
    pub location: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub articles: Option<Vec<Article>>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/emotional-analysis", post(emotional_analysis))
        .route("/crime-timeline", post(crime_timeline))
        .route("/verify-location", post(verify_location))
        .route("/insights", post(insights))
        .route(
            "/image-analysis",
            post(image_analysis).layer(DefaultBodyLimit::max(MAX_IMAGE_BODY_BYTES)),
        )
        .route("/compare-providers", post(compare_providers))
        .with_state(state)
}

/// Supplied articles win; otherwise ask the news service.
async fn resolve_articles(
    state: &SharedState,
    location: &str,
    supplied: Option<Vec<Article>>,
) -> Vec<Article> {
    match supplied {
        Some(articles) => articles,
        None if !state.news.has_sources() => {
            tracing::debug!("No news sources configured; analysing {} without articles", location);
            Vec::new()
        }
        None => state.news.fetch_articles(location, ARTICLE_LIMIT).await,
    }
}

fn analysis_text(text: Option<String>, articles: &[Article]) -> String {
    text.filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| articles_digest(articles))
}

async fn emotional_analysis(
    State(state): State<SharedState>,
    Json(payload): Json<EmotionalAnalysisPayload>,
) -> Result<Json<EmotionalAnalysisResponse>, AppError> {
    let location = require_location(&payload.location)?;
    let articles = resolve_articles(&state, &location, payload.articles).await;
    let text = analysis_text(payload.text, &articles);

    let analysis = state
        .ai
        .analyze_text_sentiment(&text, &location, &articles)
        .await?;

    if payload.persist != Some(false) {
        if let Err(e) = state.store.save_emotional_analysis(&location, &analysis).await {
            tracing::error!("Failed to persist analysis for {}: {}", location, e);
        }
    }

    Ok(Json(EmotionalAnalysisResponse {
        analysis,
        articles_analyzed: articles.len(),
    }))
}

async fn crime_timeline(
    State(state): State<SharedState>,
    Json(payload): Json<TimelinePayload>,
) -> Result<Json<CrimeTimeline>, AppError> {
    let location = require_location(&payload.location)?;
    let months = payload.months.unwrap_or(DEFAULT_TIMELINE_MONTHS);
    let articles = resolve_articles(&state, &location, payload.articles).await;

    let timeline = state.ai.get_crime_timeline(&location, &articles, months).await?;
    Ok(Json(timeline))
}

async fn verify_location(
    State(state): State<SharedState>,
    Json(payload): Json<LocationPayload>,
) -> Result<Json<LocationVerification>, AppError> {
    let location = require_location(&payload.location)?;
    Ok(Json(state.ai.verify_location(&location).await?))
}

async fn insights(
    State(state): State<SharedState>,
    Json(payload): Json<InsightsPayload>,
) -> Result<Json<Insights>, AppError> {
    let location = require_location(&payload.location)?;
    state
        .ai
        .generate_insights(&payload.analysis, &location)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Unavailable(NO_PROVIDER_RESULT.into()))
}

/// Accepts raw base64 or a `data:<mime>;base64,` URL.
fn decode_image(payload: &ImagePayload) -> Result<InlineImage, AppError> {
    let raw = payload.image_base64.trim();
    let (data_url_mime, data) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| AppError::BadRequest("malformed data URL".into()))?;
            (meta.strip_suffix(";base64").map(str::to_string), data)
        }
        None => (None, raw),
    };

    if data.is_empty() {
        return Err(AppError::BadRequest("imageBase64 is required".into()));
    }
    let decoded = general_purpose::STANDARD
        .decode(data)
        .map_err(|_| AppError::BadRequest("imageBase64 is not valid base64".into()))?;
    if decoded.len() > MAX_IMAGE_BYTES {
        return Err(AppError::PayloadTooLarge(format!(
            "image exceeds {} bytes",
            MAX_IMAGE_BYTES
        )));
    }

    let mime_type = payload
        .mime_type
        .clone()
        .or(data_url_mime)
        .unwrap_or_else(|| "image/jpeg".to_string());
    if !mime_type.starts_with("image/") {
        return Err(AppError::BadRequest(format!("unsupported mime type '{mime_type}'")));
    }

    Ok(InlineImage {
        mime_type,
        data_base64: data.to_string(),
    })
}

async fn image_analysis(
    State(state): State<SharedState>,
    payload: Result<Json<ImagePayload>, JsonRejection>,
) -> Result<Json<ImageAnalysis>, AppError> {
    let Json(payload) = payload.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge(format!(
            "request body exceeds {} bytes",
            MAX_IMAGE_BODY_BYTES
        )),
        _ => AppError::BadRequest(rejection.body_text()),
    })?;
    let location = require_location(&payload.location)?;
    let image = decode_image(&payload)?;

    state
        .ai
        .analyze_image(image, &location)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Unavailable(NO_PROVIDER_RESULT.into()))
}

async fn compare_providers(
    State(state): State<SharedState>,
    Json(payload): Json<ComparePayload>,
) -> Result<Json<AggregatedAnalysis>, AppError> {
    let location = require_location(&payload.location)?;
    let articles = match (&payload.text, payload.articles) {
        (Some(text), None) if !text.trim().is_empty() => Vec::new(),
        (_, supplied) => resolve_articles(&state, &location, supplied).await,
    };
    let text = analysis_text(payload.text, &articles);

    state
        .ai
        .compare_providers(&text, &location)
        .await
        .map(Json)
        .ok_or_else(|| AppError::Unavailable(NO_PROVIDER_RESULT.into()))
}
