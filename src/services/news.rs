//! News aggregation across the keyed news APIs, with a file-backed cache.

use crate::db::JsonStore;
use crate::domain::models::Article;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("{source_name} returned status {status}")]
    Status { source_name: &'static str, status: u16 },
}

impl From<reqwest::Error> for NewsError {
    fn from(err: reqwest::Error) -> Self {
        NewsError::Http(err.without_url())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsSourceKind {
    NewsData,
    GNews,
    MediaStack,
    Currents,
    Newscatcher,
}

/// Where each API keeps its article list and fields, as JSON pointers.
struct Layout {
    list: &'static str,
    title: &'static str,
    description: &'static str,
    url: &'static str,
    published: &'static str,
    source: &'static str,
}

impl NewsSourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            NewsSourceKind::NewsData => "NewsData.io",
            NewsSourceKind::GNews => "GNews",
            NewsSourceKind::MediaStack => "MediaStack",
            NewsSourceKind::Currents => "Currents API",
            NewsSourceKind::Newscatcher => "Newscatcher",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            NewsSourceKind::NewsData => "https://newsdata.io/api/1/news",
            NewsSourceKind::GNews => "https://gnews.io/api/v4/search",
            NewsSourceKind::MediaStack => "http://api.mediastack.com/v1/news",
            NewsSourceKind::Currents => "https://api.currentsapi.services/v1/search",
            NewsSourceKind::Newscatcher => "https://api.newscatcherapi.com/v2/search",
        }
    }

    fn layout(&self) -> Layout {
        match self {
            NewsSourceKind::NewsData => Layout {
                list: "/results",
                title: "/title",
                description: "/description",
                url: "/link",
                published: "/pubDate",
                source: "/source_id",
            },
            NewsSourceKind::GNews => Layout {
                list: "/articles",
                title: "/title",
                description: "/description",
                url: "/url",
                published: "/publishedAt",
                source: "/source/name",
            },
            NewsSourceKind::MediaStack => Layout {
                list: "/data",
                title: "/title",
                description: "/description",
                url: "/url",
                published: "/published_at",
                source: "/source",
            },
            NewsSourceKind::Currents => Layout {
                list: "/news",
                title: "/title",
                description: "/description",
                url: "/url",
                published: "/published",
                source: "/author",
            },
            NewsSourceKind::Newscatcher => Layout {
                list: "/articles",
                title: "/title",
                description: "/summary",
                url: "/link",
                published: "/published_date",
                source: "/clean_url",
            },
        }
    }

    fn query(&self, api_key: &str, location: &str) -> Vec<(&'static str, String)> {
        let loc = location.to_string();
        let key = api_key.to_string();
        match self {
            NewsSourceKind::NewsData => vec![
                ("apikey", key),
                ("q", loc),
                ("country", "in".into()),
                ("language", "en".into()),
            ],
            NewsSourceKind::GNews => vec![
                ("q", loc),
                ("token", key),
                ("lang", "en".into()),
                ("country", "in".into()),
                ("max", "10".into()),
            ],
            NewsSourceKind::MediaStack => vec![
                ("access_key", key),
                ("keywords", loc),
                ("countries", "in".into()),
                ("limit", "10".into()),
            ],
            NewsSourceKind::Currents => vec![
                ("apiKey", key),
                ("keywords", loc),
                ("language", "en".into()),
            ],
            // Newscatcher takes its key in a header.
            NewsSourceKind::Newscatcher => vec![
                ("q", loc),
                ("lang", "en".into()),
                ("countries", "IN".into()),
                ("page_size", "10".into()),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewsSource {
    pub kind: NewsSourceKind,
    api_key: String,
    base_url: String,
}

impl NewsSource {
    /// `None` when the key is absent or blank.
    pub fn new(kind: NewsSourceKind, api_key: Option<&str>) -> Option<Self> {
        let key = api_key.map(str::trim).filter(|k| !k.is_empty())?;
        Some(Self {
            kind,
            api_key: key.to_string(),
            base_url: kind.default_base_url().to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch(&self, client: &reqwest::Client, location: &str) -> Result<Vec<Article>, NewsError> {
        let mut request = client
            .get(&self.base_url)
            .query(&self.kind.query(&self.api_key, location));
        if self.kind == NewsSourceKind::Newscatcher {
            request = request.header("x-api-key", &self.api_key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(NewsError::Status {
                source_name: self.kind.name(),
                status: status.as_u16(),
            });
        }

        let body: Value = resp.json().await?;
        Ok(map_articles(self.kind, &body))
    }
}

fn text_at(item: &Value, pointer: &str) -> Option<String> {
    item.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn map_articles(kind: NewsSourceKind, body: &Value) -> Vec<Article> {
    let layout = kind.layout();
    let Some(items) = body.pointer(layout.list).and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let title = text_at(item, layout.title)?;
            Some(Article {
                title,
                description: text_at(item, layout.description).unwrap_or_default(),
                url: text_at(item, layout.url).unwrap_or_default(),
                source: text_at(item, layout.source).unwrap_or_else(|| kind.name().to_string()),
                published_at: text_at(item, layout.published),
            })
        })
        .collect()
}

/// Keeps the first article for each trimmed, lowercased title.
pub fn dedupe_by_title(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.title.trim().to_lowercase()))
        .collect()
}

pub struct NewsService {
    client: reqwest::Client,
    sources: Vec<NewsSource>,
    store: Arc<JsonStore>,
    cache_ttl: Duration,
}

impl NewsService {
    pub fn new(
        sources: Vec<NewsSource>,
        store: Arc<JsonStore>,
        cache_ttl: Duration,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        if sources.is_empty() {
            tracing::warn!("No news API keys configured; article lookups will come back empty");
        } else {
            tracing::info!(
                "News sources enabled: {}",
                sources.iter().map(|s| s.kind.name()).collect::<Vec<_>>().join(", ")
            );
        }
        Ok(Self {
            client,
            sources,
            store,
            cache_ttl,
        })
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Cached articles when fresh, otherwise every enabled source at once.
    /// Failing sources are skipped. An empty result is not cached.
    pub async fn fetch_articles(&self, location: &str, limit: usize) -> Vec<Article> {
        match self.store.get_cached_news(location).await {
            Ok(Some(cached)) => {
                tracing::debug!("Serving {} cached articles for {}", cached.len(), location);
                return cached.into_iter().take(limit).collect();
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("News cache read failed for {}: {}", location, e),
        }

        let calls = self.sources.iter().map(|source| async move {
            (source.kind, source.fetch(&self.client, location).await)
        });

        let mut articles = Vec::new();
        for (kind, result) in join_all(calls).await {
            match result {
                Ok(found) => {
                    tracing::debug!("{} returned {} articles for {}", kind.name(), found.len(), location);
                    articles.extend(found);
                }
                Err(e) => tracing::warn!("{} failed for {}: {}", kind.name(), location, e),
            }
        }

        let mut articles = dedupe_by_title(articles);
        articles.truncate(limit);

        if !articles.is_empty() {
            if let Err(e) = self.store.cache_news(location, &articles, self.cache_ttl).await {
                tracing::error!("Failed to cache news for {}: {}", location, e);
            }
        }
        tracing::info!("Fetched {} articles for {}", articles.len(), location);
        articles
    }
}
