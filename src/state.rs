use crate::config::AppConfig;
use crate::db::JsonStore;
use crate::middleware::RateLimiter;
use crate::services::ai_manager::AiApiManager;
use crate::services::geocoding::GeocodingService;
use crate::services::news::{NewsService, NewsSource, NewsSourceKind};
use std::sync::Arc;
use std::time::Duration;

const DATA_API_TIMEOUT: Duration = Duration::from_secs(15);

pub struct AppState {
    pub ai: AiApiManager,
    pub news: NewsService,
    pub geo: GeocodingService,
    pub store: Arc<JsonStore>,
    pub limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store = Arc::new(JsonStore::open(&config.data_dir).await?);

        let keys = &config.news;
        let sources = [
            (NewsSourceKind::NewsData, &keys.newsdata),
            (NewsSourceKind::GNews, &keys.gnews),
            (NewsSourceKind::MediaStack, &keys.mediastack),
            (NewsSourceKind::Currents, &keys.currents),
            (NewsSourceKind::Newscatcher, &keys.newscatcher),
        ]
        .into_iter()
        .filter_map(|(kind, key)| NewsSource::new(kind, key.as_deref()))
        .collect();

        Ok(Self {
            ai: AiApiManager::from_config(&config.ai),
            news: NewsService::new(sources, store.clone(), config.news_cache_ttl, DATA_API_TIMEOUT)?,
            geo: GeocodingService::new(config.geoapify_api_key.clone(), DATA_API_TIMEOUT)?,
            store,
            limiter: RateLimiter::new(
                config.rate_limit_max_requests,
                config.rate_limit_window_secs,
            ),
        })
    }
}
