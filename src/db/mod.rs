//! JSON-file persistence under `DATA_DIR`.
//!
//! ```text
//! DATA_DIR/
//!   emotional-analysis/<slug>__<millis>_<id>.json
//!   news-cache/<slug>.json
//!   user-feedback/feedback_<millis>_<id>.json
//! ```
//!
//! Millisecond stamps are zero-padded so that file names sort
//! chronologically.

use crate::domain::models::{AnalysisRecord, Article};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

const ANALYSIS_DIR: &str = "emotional-analysis";
const NEWS_CACHE_DIR: &str = "news-cache";
const FEEDBACK_DIR: &str = "user-feedback";

const SLUG_SEPARATOR: &str = "__";
const MAX_SLUG_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatistics {
    pub total_analyses: usize,
    pub total_feedback: usize,
    pub cached_locations: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExport {
    pub export_date: DateTime<Utc>,
    pub statistics: StoreStatistics,
    pub feedback: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsCacheEntry {
    location: String,
    timestamp: i64,
    expires_at: i64,
    articles: Vec<Article>,
}

/// Lowercase slug used for file names: anything outside `[a-z0-9]` becomes
/// `_`, runs collapse, edges are trimmed.
pub fn sanitize_filename(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }

    let trimmed: String = slug.trim_matches('_').chars().take(MAX_SLUG_LEN).collect();
    let trimmed = trimmed.trim_end_matches('_');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

fn stamp(now: DateTime<Utc>) -> String {
    format!("{:013}", now.timestamp_millis().max(0))
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Creates the directory layout if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { root: root.into() };
        for dir in [ANALYSIS_DIR, NEWS_CACHE_DIR, FEEDBACK_DIR] {
            fs::create_dir_all(store.root.join(dir)).await?;
        }
        tracing::info!("JSON store ready at {}", store.root.display());
        Ok(store)
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Write to a sibling temp file and rename, so readers never see a
    /// half-written document.
    async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StoreError> {
        let bytes = fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// JSON file names in `dir`, sorted ascending.
    async fn list(&self, dir: &str) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(self.dir(dir)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_json(&path) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn save_emotional_analysis<T: Serialize>(
        &self,
        location: &str,
        data: &T,
    ) -> Result<String, StoreError> {
        let now = Utc::now();
        let filename = format!(
            "{}{}{}_{}.json",
            sanitize_filename(location),
            SLUG_SEPARATOR,
            stamp(now),
            short_id()
        );
        let record = AnalysisRecord {
            location: location.to_string(),
            timestamp: now,
            data: serde_json::to_value(data)?,
        };

        Self::write_json(&self.dir(ANALYSIS_DIR).join(&filename), &record).await?;
        tracing::debug!("Saved emotional analysis {}", filename);
        Ok(filename)
    }

    /// Newest first. Only files whose slug matches exactly are considered,
    /// so "goa" never picks up "goa_velha".
    pub async fn get_emotional_analysis_history(
        &self,
        location: &str,
        limit: usize,
    ) -> Result<Vec<AnalysisRecord>, StoreError> {
        let slug = sanitize_filename(location);
        let dir = self.dir(ANALYSIS_DIR);

        let mut history = Vec::new();
        for name in self.list(ANALYSIS_DIR).await?.into_iter().rev() {
            if history.len() >= limit {
                break;
            }
            let matches = name
                .split_once(SLUG_SEPARATOR)
                .map(|(prefix, _)| prefix == slug)
                .unwrap_or(false);
            if !matches {
                continue;
            }
            match Self::read_json::<AnalysisRecord>(&dir.join(&name)).await {
                Ok(record) => history.push(record),
                Err(e) => tracing::warn!("Skipping unreadable analysis file {}: {}", name, e),
            }
        }
        Ok(history)
    }

    /// Records for `location` saved within the last `days_back` days.
    pub async fn history_since(
        &self,
        location: &str,
        days_back: u32,
    ) -> Result<Vec<AnalysisRecord>, StoreError> {
        let cutoff = Utc::now() - ChronoDuration::days(days_back as i64);
        let history = self
            .get_emotional_analysis_history(location, usize::MAX)
            .await?;
        Ok(history
            .into_iter()
            .filter(|record| record.timestamp >= cutoff)
            .collect())
    }

    pub async fn cache_news(
        &self,
        location: &str,
        articles: &[Article],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let entry = NewsCacheEntry {
            location: location.to_string(),
            timestamp: now,
            expires_at: now.saturating_add(ttl_ms),
            articles: articles.to_vec(),
        };
        let path = self
            .dir(NEWS_CACHE_DIR)
            .join(format!("{}.json", sanitize_filename(location)));
        Self::write_json(&path, &entry).await
    }

    /// Cached articles when present and not expired. A corrupt cache file is
    /// treated as a miss.
    pub async fn get_cached_news(&self, location: &str) -> Result<Option<Vec<Article>>, StoreError> {
        let path = self
            .dir(NEWS_CACHE_DIR)
            .join(format!("{}.json", sanitize_filename(location)));

        match Self::read_json::<NewsCacheEntry>(&path).await {
            Ok(entry) if entry.expires_at > Utc::now().timestamp_millis() => Ok(Some(entry.articles)),
            Ok(_) => Ok(None),
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(StoreError::Json(e)) => {
                tracing::warn!("Ignoring corrupt news cache {}: {}", path.display(), e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Stores any JSON object, stamped with an id and timestamp.
    pub async fn save_user_feedback(&self, feedback: Map<String, Value>) -> Result<Value, StoreError> {
        let now = Utc::now();
        let id = short_id();

        let mut record = Map::new();
        record.insert("id".into(), Value::String(id.clone()));
        record.insert("timestamp".into(), serde_json::to_value(now)?);
        for (key, value) in feedback {
            if key != "id" && key != "timestamp" {
                record.insert(key, value);
            }
        }
        let record = Value::Object(record);

        let filename = format!("feedback_{}_{}.json", stamp(now), id);
        Self::write_json(&self.dir(FEEDBACK_DIR).join(&filename), &record).await?;
        tracing::info!("Saved user feedback {}", id);
        Ok(record)
    }

    /// Newest first.
    pub async fn get_all_feedback(&self, limit: usize) -> Result<Vec<Value>, StoreError> {
        let dir = self.dir(FEEDBACK_DIR);
        let mut feedback = Vec::new();
        for name in self.list(FEEDBACK_DIR).await?.into_iter().rev().take(limit) {
            match Self::read_json::<Value>(&dir.join(&name)).await {
                Ok(value) => feedback.push(value),
                Err(e) => tracing::warn!("Skipping unreadable feedback file {}: {}", name, e),
            }
        }
        Ok(feedback)
    }

    pub async fn get_statistics(&self) -> Result<StoreStatistics, StoreError> {
        let (analyses, feedback, cached) = tokio::try_join!(
            self.list(ANALYSIS_DIR),
            self.list(FEEDBACK_DIR),
            self.list(NEWS_CACHE_DIR)
        )?;
        Ok(StoreStatistics {
            total_analyses: analyses.len(),
            total_feedback: feedback.len(),
            cached_locations: cached.len(),
            last_updated: Utc::now(),
        })
    }

    /// Removes expired and unreadable cache files; returns how many went.
    pub async fn clean_old_cache(&self) -> Result<usize, StoreError> {
        let dir = self.dir(NEWS_CACHE_DIR);
        let now = Utc::now().timestamp_millis();
        let mut cleaned = 0;

        for name in self.list(NEWS_CACHE_DIR).await? {
            let path = dir.join(&name);
            let expired = match Self::read_json::<NewsCacheEntry>(&path).await {
                Ok(entry) => entry.expires_at <= now,
                Err(e) => {
                    tracing::warn!("Removing unreadable cache file {}: {}", name, e);
                    true
                }
            };
            if expired {
                match fs::remove_file(&path).await {
                    Ok(()) => cleaned += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if cleaned > 0 {
            tracing::info!("Cleaned {} expired news cache files", cleaned);
        }
        Ok(cleaned)
    }

    pub async fn export_all_data(&self) -> Result<DataExport, StoreError> {
        Ok(DataExport {
            export_date: Utc::now(),
            statistics: self.get_statistics().await?,
            feedback: self.get_all_feedback(50).await?,
        })
    }
}
