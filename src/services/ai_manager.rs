//! Ordered AI provider chain with per-provider health tracking and a
//! deterministic degrade path: providers in order, then the keyword
//! analyzer, then static placeholder data.

use crate::config::AiConfig;
use crate::domain::aggregation::{self, AggregatedAnalysis};
use crate::domain::calendar;
use crate::domain::models::{
    ApiUsed, Article, CrimeStats, CrimeTimeline, CurrentPeriod, EmotionBreakdown, ImageAnalysis,
    Insights, LocationVerification, MonthlyTrend, OverallTrend, ProviderKind, SentimentAnalysis,
};
use crate::services::json_extract::extract_as;
use crate::services::prompts;
use crate::services::providers::chat_completions::ChatCompletionsConfig;
use crate::services::providers::gemini::GeminiConfig;
use crate::services::providers::{
    AiProvider, ChatCompletionsProvider, CompletionRequest, GeminiProvider, InlineImage,
    ProviderError, RetryPolicy,
};
use crate::services::simple_analyzer;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

pub const UNAVAILABLE_WARNING: &str =
    "All AI providers are currently unavailable. Showing default data.";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("{} failed: {source}", provider.label())]
    Provider {
        provider: ProviderKind,
        #[source]
        source: ProviderError,
    },
    #[error("{} is cooling down after a rate limit until {until}", provider.label())]
    CoolingDown {
        provider: ProviderKind,
        until: DateTime<Utc>,
    },
    #[error("no AI provider is configured")]
    NoProviders,
    #[error("could not encode prompt input: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub available: bool,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub rate_limited_until: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl Default for ProviderStatus {
    fn default() -> Self {
        Self {
            available: true,
            error_count: 0,
            last_error: None,
            last_error_at: None,
            rate_limited_until: None,
            last_success_at: None,
        }
    }
}

impl ProviderStatus {
    fn cooling_down(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.rate_limited_until.filter(|until| *until > now)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatusEntry {
    pub provider: ProviderKind,
    #[serde(flatten)]
    pub status: ProviderStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStatus {
    pub providers: Vec<ProviderStatusEntry>,
    pub fallback_enabled: bool,
}

pub struct AiApiManager {
    providers: Vec<Arc<dyn AiProvider>>,
    status: RwLock<HashMap<ProviderKind, ProviderStatus>>,
    fallback_enabled: AtomicBool,
    cooldown: chrono::Duration,
}

impl AiApiManager {
    pub fn new(
        providers: Vec<Arc<dyn AiProvider>>,
        cooldown: Duration,
        fallback_enabled: bool,
    ) -> Self {
        let status = providers
            .iter()
            .map(|p| (p.kind(), ProviderStatus::default()))
            .collect();
        let cooldown = chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::zero());

        Self {
            providers,
            status: RwLock::new(status),
            fallback_enabled: AtomicBool::new(fallback_enabled),
            cooldown,
        }
    }

    /// Builds the chain in configured order, skipping providers without a key.
    pub fn from_config(config: &AiConfig) -> Self {
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            delay: config.retry_delay,
        };
        let mut providers: Vec<Arc<dyn AiProvider>> = Vec::new();

        for kind in &config.provider_order {
            let built: Result<Arc<dyn AiProvider>, ProviderError> = match kind {
                ProviderKind::Gemini => GeminiProvider::new(GeminiConfig {
                    api_base: config.gemini.api_base.clone(),
                    api_key: config.gemini.api_key.clone().unwrap_or_default(),
                    model: config.gemini.model.clone(),
                    timeout: config.request_timeout,
                    retry,
                })
                .map(|p| Arc::new(p) as Arc<dyn AiProvider>),
                ProviderKind::Mistral | ProviderKind::Cerebras => {
                    let settings = if *kind == ProviderKind::Mistral {
                        &config.mistral
                    } else {
                        &config.cerebras
                    };
                    ChatCompletionsProvider::new(ChatCompletionsConfig {
                        kind: *kind,
                        api_base: settings.api_base.clone(),
                        api_key: settings.api_key.clone().unwrap_or_default(),
                        model: settings.model.clone(),
                        timeout: config.request_timeout,
                        retry,
                    })
                    .map(|p| Arc::new(p) as Arc<dyn AiProvider>)
                }
            };

            match built {
                Ok(provider) => providers.push(provider),
                Err(ProviderError::MissingApiKey) => {
                    tracing::warn!("{} disabled: no API key configured", kind.label());
                }
                Err(e) => {
                    tracing::error!("Failed to initialise {}: {}", kind.label(), e);
                }
            }
        }

        let order = providers
            .iter()
            .map(|p| p.kind().label())
            .collect::<Vec<_>>()
            .join(" -> ");
        tracing::info!(
            "AI API manager initialised: {} -> keyword analyzer -> static data",
            if order.is_empty() { "(no providers)" } else { order.as_str() }
        );

        Self::new(providers, config.rate_limit_cooldown, config.fallback_enabled)
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback_enabled.load(Ordering::SeqCst)
    }

    pub fn set_fallback_enabled(&self, enabled: bool) {
        self.fallback_enabled.store(enabled, Ordering::SeqCst);
        tracing::info!("Fallback {}", if enabled { "enabled" } else { "disabled" });
    }

    pub async fn status(&self) -> ManagerStatus {
        let status = self.status.read().await;
        ManagerStatus {
            providers: self
                .providers
                .iter()
                .map(|p| ProviderStatusEntry {
                    provider: p.kind(),
                    status: status.get(&p.kind()).cloned().unwrap_or_default(),
                })
                .collect(),
            fallback_enabled: self.fallback_enabled(),
        }
    }

    /// Marks every provider healthy again, e.g. after a quota reset.
    pub async fn reset_status(&self) {
        let mut status = self.status.write().await;
        for entry in status.values_mut() {
            *entry = ProviderStatus::default();
        }
        tracing::info!("AI provider status reset - all providers marked available");
    }

    async fn record_success(&self, kind: ProviderKind) {
        let mut status = self.status.write().await;
        let entry = status.entry(kind).or_default();
        entry.available = true;
        entry.error_count = 0;
        entry.rate_limited_until = None;
        entry.last_success_at = Some(Utc::now());
    }

    async fn record_failure(&self, kind: ProviderKind, err: &ProviderError) {
        let now = Utc::now();
        let mut status = self.status.write().await;
        let entry = status.entry(kind).or_default();
        entry.error_count += 1;
        entry.last_error = Some(err.to_string());
        entry.last_error_at = Some(now);
        if err.is_rate_limit() {
            entry.available = false;
            entry.rate_limited_until = Some(now + self.cooldown);
            tracing::warn!(
                "{} rate limit hit - switching to next provider for {}s",
                kind.label(),
                self.cooldown.num_seconds()
            );
        }
    }

    async fn cooling_down(&self, kind: ProviderKind) -> Option<DateTime<Utc>> {
        let status = self.status.read().await;
        status.get(&kind).and_then(|s| s.cooling_down(Utc::now()))
    }

    /// Calls one provider and parses its reply; a reply without usable JSON
    /// counts as a failure of that provider.
    async fn attempt<T, P>(
        &self,
        provider: &dyn AiProvider,
        operation: &str,
        request: &CompletionRequest,
        parse: &P,
    ) -> Result<T, ProviderError>
    where
        P: Fn(&str) -> Option<T>,
    {
        let kind = provider.kind();
        tracing::debug!("Attempting {} with {}", operation, kind.label());

        let outcome = match provider.complete(request).await {
            Ok(reply) => parse(&reply).ok_or_else(|| {
                ProviderError::InvalidResponse(format!("no usable JSON in {} reply", kind.label()))
            }),
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(_) => {
                self.record_success(kind).await;
                tracing::info!("{} {} successful", kind.label(), operation);
            }
            Err(e) => {
                self.record_failure(kind, e).await;
                tracing::warn!("{} {} failed: {}", kind.label(), operation, e);
            }
        }
        outcome
    }

    /// Walks the chain. `Ok(None)` means every eligible provider failed and
    /// the caller should degrade locally; `Err` is only returned when
    /// fallback is disabled.
    async fn run_chain<T, P>(
        &self,
        operation: &str,
        request: &CompletionRequest,
        eligible: impl Fn(&dyn AiProvider) -> bool,
        parse: P,
    ) -> Result<Option<(T, ProviderKind)>, AiError>
    where
        P: Fn(&str) -> Option<T>,
    {
        let candidates: Vec<&Arc<dyn AiProvider>> =
            self.providers.iter().filter(|p| eligible(p.as_ref())).collect();

        if !self.fallback_enabled() {
            let provider = *candidates.first().ok_or(AiError::NoProviders)?;
            let kind = provider.kind();
            if let Some(until) = self.cooling_down(kind).await {
                return Err(AiError::CoolingDown { provider: kind, until });
            }
            return self
                .attempt(provider.as_ref(), operation, request, &parse)
                .await
                .map(|value| Some((value, kind)))
                .map_err(|source| AiError::Provider { provider: kind, source });
        }

        for provider in candidates {
            let kind = provider.kind();
            if let Some(until) = self.cooling_down(kind).await {
                tracing::debug!(
                    "Skipping {} for {}: rate limited until {}",
                    kind.label(),
                    operation,
                    until
                );
                continue;
            }

            if let Ok(value) = self.attempt(provider.as_ref(), operation, request, &parse).await {
                return Ok(Some((value, kind)));
            }
        }

        tracing::warn!("All AI providers failed for {}", operation);
        Ok(None)
    }

    pub async fn analyze_text_sentiment(
        &self,
        text: &str,
        location: &str,
        articles: &[Article],
    ) -> Result<SentimentAnalysis, AiError> {
        let request = CompletionRequest::new(prompts::sentiment(text, location)).max_tokens(2000);
        let chained = self
            .run_chain("sentiment analysis", &request, |_| true, parse_json::<SentimentAnalysis>)
            .await?;

        if let Some((mut analysis, kind)) = chained {
            analysis.location = location.to_string();
            analysis.aggregated_emotions = aggregation::normalize(analysis.aggregated_emotions);
            analysis.api_used = kind.into();
            return Ok(analysis);
        }

        if !articles.is_empty() {
            tracing::warn!("All AI providers failed - using keyword analyzer");
            return Ok(simple_analyzer::analyze(articles, location));
        }

        tracing::warn!("Using static fallback analysis for {}", location);
        Ok(fallback_analysis(location, Utc::now()))
    }

    pub async fn get_crime_timeline(
        &self,
        location: &str,
        articles: &[Article],
        months: u32,
    ) -> Result<CrimeTimeline, AiError> {
        let months = months.clamp(1, 12);
        let request = CompletionRequest::new(prompts::crime_timeline(location, articles, months))
            .max_tokens(3000);
        let chained = self
            .run_chain("crime timeline", &request, |_| true, parse_json::<CrimeTimeline>)
            .await?;

        if let Some((mut timeline, kind)) = chained {
            timeline.location = location.to_string();
            if timeline.timeframe.is_empty() {
                timeline.timeframe = format!("{months} month(s)");
            }
            timeline.api_used = kind.into();
            return Ok(timeline);
        }

        if !articles.is_empty() {
            tracing::warn!("All AI providers failed - using keyword analyzer for timeline");
            return Ok(simple_analyzer::timeline(articles, location, months));
        }

        tracing::warn!("Using static fallback timeline for {}", location);
        Ok(fallback_timeline(location, months, Utc::now()))
    }

    pub async fn verify_location(&self, location_name: &str) -> Result<LocationVerification, AiError> {
        let request = CompletionRequest::new(prompts::verify_location(location_name))
            .temperature(0.2)
            .max_tokens(512);
        let chained = self
            .run_chain(
                "location verification",
                &request,
                |_| true,
                parse_json::<LocationVerification>,
            )
            .await?;

        Ok(match chained {
            Some((mut verification, kind)) => {
                if verification.location_name.trim().is_empty() {
                    verification.location_name = location_name.to_string();
                }
                verification.api_used = kind.into();
                verification
            }
            None => LocationVerification::invalid(location_name, "Error verifying location"),
        })
    }

    pub async fn generate_insights<A: Serialize>(
        &self,
        analysis: &A,
        location: &str,
    ) -> Result<Option<Insights>, AiError> {
        let analysis_json = serde_json::to_string_pretty(analysis)?;
        let request = CompletionRequest::new(prompts::insights(&analysis_json, location));
        let chained = self
            .run_chain("insights", &request, |_| true, parse_json::<Insights>)
            .await?;

        Ok(chained.map(|(mut insights, kind)| {
            insights.api_used = kind.into();
            insights
        }))
    }

    /// Only providers with vision support take part.
    pub async fn analyze_image(
        &self,
        image: InlineImage,
        location: &str,
    ) -> Result<Option<ImageAnalysis>, AiError> {
        let request = CompletionRequest::new(prompts::image(location))
            .max_tokens(1024)
            .image(image);
        let chained = self
            .run_chain(
                "image analysis",
                &request,
                |p| p.supports_images(),
                parse_json::<ImageAnalysis>,
            )
            .await?;

        Ok(chained.map(|(mut analysis, kind)| {
            analysis.api_used = kind.into();
            analysis
        }))
    }

    /// Asks every provider that is not cooling down at once and averages the
    /// successful answers.
    pub async fn compare_providers(&self, text: &str, location: &str) -> Option<AggregatedAnalysis> {
        let request = CompletionRequest::new(prompts::sentiment(text, location)).max_tokens(2000);

        let mut eligible = Vec::new();
        for provider in &self.providers {
            if self.cooling_down(provider.kind()).await.is_none() {
                eligible.push(provider.clone());
            }
        }

        let calls = eligible.iter().map(|provider| {
            let request = &request;
            async move {
                self.attempt(
                    provider.as_ref(),
                    "provider comparison",
                    request,
                    &parse_json::<SentimentAnalysis>,
                )
                .await
                .ok()
                .map(|mut analysis| {
                    analysis.location = location.to_string();
                    analysis.aggregated_emotions =
                        aggregation::normalize(analysis.aggregated_emotions);
                    analysis.api_used = provider.kind().into();
                    analysis
                })
            }
        });

        let results: Vec<SentimentAnalysis> = join_all(calls).await.into_iter().flatten().collect();
        aggregation::average_analyses(&results)
    }
}

fn parse_json<T: DeserializeOwned>(reply: &str) -> Option<T> {
    extract_as::<T>(reply)
}

/// Placeholder analysis when neither AI nor articles are available.
pub fn fallback_analysis(location: &str, now: DateTime<Utc>) -> SentimentAnalysis {
    SentimentAnalysis {
        location: location.to_string(),
        safety_index: 50,
        aggregated_emotions: EmotionBreakdown::uniform(),
        crime_stats: CrimeStats::default(),
        monthly_trends: Vec::new(),
        current_period: CurrentPeriod {
            name: calendar::month_label(now),
            total_crimes: 0,
            compared_to_last_month: 0.0,
            status: "unknown".to_string(),
        },
        summary: None,
        safety_concerns: None,
        method: None,
        api_used: ApiUsed::Fallback,
        warning: Some(UNAVAILABLE_WARNING.to_string()),
    }
}

/// Zeroed timeline, oldest month first.
pub fn fallback_timeline(location: &str, months: u32, now: DateTime<Utc>) -> CrimeTimeline {
    let monthly_data = calendar::recent_month_labels(now, months)
        .into_iter()
        .map(|month| MonthlyTrend {
            month,
            total_crimes: 0,
            crime_breakdown: CrimeStats::default(),
            safety_index: 50,
            trend: "stable".to_string(),
            peak_hours: vec!["Unknown".to_string()],
            safest_hours: vec!["Unknown".to_string()],
        })
        .collect();

    CrimeTimeline {
        location: location.to_string(),
        timeframe: format!("{months} month(s)"),
        monthly_data,
        overall_trend: OverallTrend {
            direction: "stable".to_string(),
            percentage_change: 0.0,
            most_common_crime: "Unknown".to_string(),
            least_common_crime: "Unknown".to_string(),
        },
        current_month: CurrentPeriod {
            name: calendar::month_label(now),
            total_crimes: 0,
            compared_to_last_month: 0.0,
            status: "unknown".to_string(),
        },
        recommendations: vec![
            "Data unavailable - all AI providers are currently unavailable".to_string(),
        ],
        api_used: ApiUsed::Fallback,
        warning: Some(UNAVAILABLE_WARNING.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    /// Provider that replays scripted replies; the last one repeats.
    struct ScriptedProvider {
        kind: ProviderKind,
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: AtomicU32,
        images: bool,
    }

    impl ScriptedProvider {
        fn new(kind: ProviderKind, replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
                images: false,
            })
        }

        fn with_images(kind: ProviderKind, replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
                images: true,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn clone_reply(reply: &Result<String, ProviderError>) -> Result<String, ProviderError> {
        match reply {
            Ok(text) => Ok(text.clone()),
            Err(ProviderError::RateLimited { body }) => {
                Err(ProviderError::RateLimited { body: body.clone() })
            }
            Err(e) => Err(ProviderError::InvalidResponse(e.to_string())),
        }
    }

    #[async_trait]
    impl AiProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                clone_reply(replies.front().unwrap())
            }
        }

        fn supports_images(&self) -> bool {
            self.images
        }
    }

    fn rate_limited() -> Result<String, ProviderError> {
        Err(ProviderError::RateLimited { body: "quota".into() })
    }

    fn server_error() -> Result<String, ProviderError> {
        Err(ProviderError::HttpStatus { status: 500, body: "boom".into() })
    }

    fn manager(providers: Vec<Arc<ScriptedProvider>>) -> AiApiManager {
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn AiProvider>)
            .collect();
        AiApiManager::new(providers, Duration::from_secs(60), true)
    }

    fn articles() -> Vec<Article> {
        vec![Article {
            title: "Theft reported near Charminar".into(),
            description: "Police worried about rising theft".into(),
            ..Default::default()
        }]
    }

    const SENTIMENT_REPLY: &str = r#"```json
{"safetyIndex": 64, "aggregatedEmotions": {"calm": 30, "angry": 20, "depressed": 10, "fear": 20, "happy": 20}, "crimeStats": {"theft": 2}}
```"#;

    #[tokio::test]
    async fn test_first_provider_wins() {
        let cerebras = ScriptedProvider::new(ProviderKind::Cerebras, vec![Ok(SENTIMENT_REPLY.into())]);
        let mistral = ScriptedProvider::new(ProviderKind::Mistral, vec![Ok(SENTIMENT_REPLY.into())]);
        let mgr = manager(vec![cerebras.clone(), mistral.clone()]);

        let result = mgr.analyze_text_sentiment("text", "Hyderabad", &[]).await.unwrap();
        assert_eq!(result.api_used, ApiUsed::Cerebras);
        assert_eq!(result.location, "Hyderabad");
        assert_eq!(result.safety_index, 64);
        assert_eq!(cerebras.calls(), 1);
        assert_eq!(mistral.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_through_in_order_and_tracks_errors() {
        let cerebras = ScriptedProvider::new(ProviderKind::Cerebras, vec![server_error()]);
        let mistral = ScriptedProvider::new(ProviderKind::Mistral, vec![Ok("not json at all".into())]);
        let gemini = ScriptedProvider::new(ProviderKind::Gemini, vec![Ok(SENTIMENT_REPLY.into())]);
        let mgr = manager(vec![cerebras.clone(), mistral.clone(), gemini.clone()]);

        let result = mgr.analyze_text_sentiment("text", "Hyderabad", &[]).await.unwrap();
        assert_eq!(result.api_used, ApiUsed::Gemini);

        let status = mgr.status().await;
        assert_eq!(status.providers[0].provider, ProviderKind::Cerebras);
        assert_eq!(status.providers[0].status.error_count, 1);
        assert!(status.providers[0].status.available);
        assert!(status.providers[1]
            .status
            .last_error
            .as_deref()
            .unwrap()
            .contains("no usable JSON"));
        assert_eq!(status.providers[2].status.error_count, 0);
        assert!(status.providers[2].status.last_success_at.is_some());
    }

    #[tokio::test]
    async fn test_success_resets_error_count() {
        let cerebras = ScriptedProvider::new(
            ProviderKind::Cerebras,
            vec![server_error(), Ok(SENTIMENT_REPLY.into())],
        );
        let mgr = manager(vec![cerebras.clone()]);

        let first = mgr.analyze_text_sentiment("text", "Goa", &[]).await.unwrap();
        assert_eq!(first.api_used, ApiUsed::Fallback);
        assert_eq!(mgr.status().await.providers[0].status.error_count, 1);

        let second = mgr.analyze_text_sentiment("text", "Goa", &[]).await.unwrap();
        assert_eq!(second.api_used, ApiUsed::Cerebras);
        assert_eq!(mgr.status().await.providers[0].status.error_count, 0);
    }

    #[tokio::test]
    async fn test_rate_limited_provider_is_skipped_until_reset() {
        let cerebras = ScriptedProvider::new(ProviderKind::Cerebras, vec![rate_limited()]);
        let mistral = ScriptedProvider::new(ProviderKind::Mistral, vec![Ok(SENTIMENT_REPLY.into())]);
        let mgr = manager(vec![cerebras.clone(), mistral.clone()]);

        let first = mgr.analyze_text_sentiment("text", "Delhi", &[]).await.unwrap();
        assert_eq!(first.api_used, ApiUsed::Mistral);

        let status = mgr.status().await;
        assert!(!status.providers[0].status.available);
        assert!(status.providers[0].status.rate_limited_until.is_some());

        let second = mgr.analyze_text_sentiment("text", "Delhi", &[]).await.unwrap();
        assert_eq!(second.api_used, ApiUsed::Mistral);
        assert_eq!(cerebras.calls(), 1);

        mgr.reset_status().await;
        assert!(mgr.status().await.providers[0].status.available);
        mgr.analyze_text_sentiment("text", "Delhi", &[]).await.unwrap();
        assert_eq!(cerebras.calls(), 2);
    }

    #[tokio::test]
    async fn test_provider_retried_after_cooldown_expires() {
        let cerebras = ScriptedProvider::new(
            ProviderKind::Cerebras,
            vec![rate_limited(), server_error(), Ok(SENTIMENT_REPLY.into())],
        );
        let mistral = ScriptedProvider::new(ProviderKind::Mistral, vec![Ok(SENTIMENT_REPLY.into())]);
        let providers = vec![
            cerebras.clone() as Arc<dyn AiProvider>,
            mistral.clone() as Arc<dyn AiProvider>,
        ];
        let mgr = AiApiManager::new(providers, Duration::from_millis(50), true);

        let first = mgr.analyze_text_sentiment("text", "Pune", &[]).await.unwrap();
        assert_eq!(first.api_used, ApiUsed::Mistral);
        assert_eq!(cerebras.calls(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;

        // Retried once the window has passed, but a plain failure keeps it unavailable.
        let second = mgr.analyze_text_sentiment("text", "Pune", &[]).await.unwrap();
        assert_eq!(second.api_used, ApiUsed::Mistral);
        assert_eq!(cerebras.calls(), 2);
        let status = mgr.status().await;
        assert!(!status.providers[0].status.available);
        assert_eq!(status.providers[0].status.error_count, 2);

        let third = mgr.analyze_text_sentiment("text", "Pune", &[]).await.unwrap();
        assert_eq!(third.api_used, ApiUsed::Cerebras);
        let status = mgr.status().await;
        assert!(status.providers[0].status.available);
        assert!(status.providers[0].status.rate_limited_until.is_none());
    }

    #[tokio::test]
    async fn test_disabled_fallback_reports_cooling_down_provider() {
        let cerebras = ScriptedProvider::new(ProviderKind::Cerebras, vec![rate_limited()]);
        let mistral = ScriptedProvider::new(ProviderKind::Mistral, vec![Ok(SENTIMENT_REPLY.into())]);
        let mgr = manager(vec![cerebras.clone(), mistral.clone()]);

        mgr.analyze_text_sentiment("text", "Kochi", &[]).await.unwrap();
        mgr.set_fallback_enabled(false);

        let err = mgr
            .analyze_text_sentiment("text", "Kochi", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::CoolingDown { provider: ProviderKind::Cerebras, .. }));
        assert_eq!(cerebras.calls(), 1);
        assert_eq!(mistral.calls(), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_hides_key_and_is_not_rate_limit() {
        let gemini = GeminiProvider::new(GeminiConfig {
            api_base: "http://127.0.0.1:1/models".to_string(),
            api_key: "SECRET-KEY-4291".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            timeout: Duration::from_secs(2),
            retry: RetryPolicy { max_retries: 0, delay: Duration::ZERO },
        })
        .unwrap();
        let mgr = AiApiManager::new(vec![Arc::new(gemini)], Duration::from_secs(60), true);

        let verification = mgr.verify_location("Mysuru").await.unwrap();
        assert!(!verification.valid);

        let status = mgr.status().await;
        let entry = &status.providers[0].status;
        assert!(entry.available);
        assert!(entry.rate_limited_until.is_none());
        assert_eq!(entry.error_count, 1);
        let rendered = serde_json::to_string(&status).unwrap();
        assert!(!rendered.contains("SECRET-KEY-4291"));
    }

    #[tokio::test]
    async fn test_keyword_analyzer_when_chain_exhausted() {
        let cerebras = ScriptedProvider::new(ProviderKind::Cerebras, vec![server_error()]);
        let mgr = manager(vec![cerebras]);

        let result = mgr
            .analyze_text_sentiment("text", "Hyderabad", &articles())
            .await
            .unwrap();
        assert_eq!(result.api_used, ApiUsed::SimpleAnalyzer);
        assert_eq!(result.crime_stats.theft, 2);
        assert_eq!(result.method.as_deref(), Some("keyword-based"));
    }

    #[tokio::test]
    async fn test_static_fallback_without_articles_or_providers() {
        let mgr = manager(vec![]);
        let result = mgr.analyze_text_sentiment("", "Shimla", &[]).await.unwrap();
        assert_eq!(result.api_used, ApiUsed::Fallback);
        assert_eq!(result.safety_index, 50);
        assert_eq!(result.aggregated_emotions, EmotionBreakdown::uniform());
        assert_eq!(result.current_period.status, "unknown");
        assert_eq!(result.warning.as_deref(), Some(UNAVAILABLE_WARNING));
    }

    #[tokio::test]
    async fn test_disabled_fallback_surfaces_first_error() {
        let cerebras = ScriptedProvider::new(ProviderKind::Cerebras, vec![server_error()]);
        let mistral = ScriptedProvider::new(ProviderKind::Mistral, vec![Ok(SENTIMENT_REPLY.into())]);
        let mgr = manager(vec![cerebras, mistral.clone()]);
        mgr.set_fallback_enabled(false);

        let err = mgr
            .analyze_text_sentiment("text", "Agra", &articles())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Provider { provider: ProviderKind::Cerebras, .. }));
        assert_eq!(mistral.calls(), 0);
        assert!(!mgr.status().await.fallback_enabled);

        let empty = manager(vec![]);
        empty.set_fallback_enabled(false);
        assert!(matches!(
            empty.verify_location("Agra").await.unwrap_err(),
            AiError::NoProviders
        ));
    }

    #[tokio::test]
    async fn test_timeline_fallbacks() {
        let mgr = manager(vec![ScriptedProvider::new(ProviderKind::Gemini, vec![server_error()])]);

        let keyword = mgr.get_crime_timeline("Surat", &articles(), 2).await.unwrap();
        assert_eq!(keyword.api_used, ApiUsed::SimpleAnalyzer);
        assert_eq!(keyword.timeframe, "2 month(s)");

        let fallback = mgr.get_crime_timeline("Surat", &[], 40).await.unwrap();
        assert_eq!(fallback.api_used, ApiUsed::Fallback);
        assert_eq!(fallback.monthly_data.len(), 12);
    }

    #[tokio::test]
    async fn test_timeline_from_provider() {
        let reply = r#"{"timeframe": "1 month(s)", "monthlyData": [{"month": "May 2025", "totalCrimes": 4}], "recommendations": ["Stay alert"]}"#;
        let mgr = manager(vec![ScriptedProvider::new(ProviderKind::Mistral, vec![Ok(reply.into())])]);

        let timeline = mgr.get_crime_timeline("Surat", &[], 1).await.unwrap();
        assert_eq!(timeline.api_used, ApiUsed::Mistral);
        assert_eq!(timeline.location, "Surat");
        assert_eq!(timeline.monthly_data[0].total_crimes, 4);
        assert_eq!(timeline.recommendations, vec!["Stay alert"]);
    }

    #[test]
    fn test_fallback_timeline_shape() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let timeline = fallback_timeline("Leh", 3, now);
        let months: Vec<&str> = timeline.monthly_data.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["January 2025", "February 2025", "March 2025"]);
        assert!(timeline.monthly_data.iter().all(|m| m.safety_index == 50));
        assert_eq!(timeline.monthly_data[0].peak_hours, vec!["Unknown"]);
        assert_eq!(timeline.current_month.name, "March 2025");
    }

    #[tokio::test]
    async fn test_location_verification() {
        let reply = r#"{"valid": true, "locationType": "city", "locationName": "Mumbai", "state": "Maharashtra", "confidence": 98}"#;
        let mgr = manager(vec![ScriptedProvider::new(ProviderKind::Cerebras, vec![Ok(reply.into())])]);
        let verified = mgr.verify_location("mumbai").await.unwrap();
        assert!(verified.valid);
        assert_eq!(verified.state.as_deref(), Some("Maharashtra"));
        assert_eq!(verified.api_used, ApiUsed::Cerebras);

        let failing = manager(vec![ScriptedProvider::new(ProviderKind::Cerebras, vec![server_error()])]);
        let invalid = failing.verify_location("Atlantis").await.unwrap();
        assert!(!invalid.valid);
        assert_eq!(invalid.confidence, 0);
        assert_eq!(invalid.location_name, "Atlantis");
        assert_eq!(invalid.note.as_deref(), Some("Error verifying location"));
    }

    #[tokio::test]
    async fn test_image_analysis_uses_vision_providers_only() {
        let text_only = ScriptedProvider::new(ProviderKind::Cerebras, vec![Ok("{}".into())]);
        let vision = ScriptedProvider::with_images(
            ProviderKind::Gemini,
            vec![Ok(r#"{"crowdDensity": "high", "overallMood": "tense"}"#.into())],
        );
        let mgr = manager(vec![text_only.clone(), vision]);

        let image = InlineImage {
            mime_type: "image/png".into(),
            data_base64: "aGk=".into(),
        };
        let analysis = mgr.analyze_image(image, "Chennai").await.unwrap().unwrap();
        assert_eq!(analysis.crowd_density, "high");
        assert_eq!(analysis.api_used, ApiUsed::Gemini);
        assert_eq!(text_only.calls(), 0);
    }

    #[tokio::test]
    async fn test_compare_providers_averages_successes() {
        let a = ScriptedProvider::new(
            ProviderKind::Cerebras,
            vec![Ok(r#"{"safetyIndex": 60, "aggregatedEmotions": {"calm": 60, "fear": 40}}"#.into())],
        );
        let b = ScriptedProvider::new(
            ProviderKind::Mistral,
            vec![Ok(r#"{"safetyIndex": 80, "aggregatedEmotions": {"calm": 20, "fear": 80}}"#.into())],
        );
        let c = ScriptedProvider::new(ProviderKind::Gemini, vec![server_error()]);
        let mgr = manager(vec![a, b, c]);

        let merged = mgr.compare_providers("text", "Bhopal").await.unwrap();
        assert_eq!(merged.safety_index, 70);
        assert_eq!(merged.aggregated_emotions.calm, 40);
        assert_eq!(merged.aggregated_emotions.fear, 60);
        assert_eq!(merged.ai_providers, vec![ApiUsed::Cerebras, ApiUsed::Mistral]);
        assert_eq!(mgr.status().await.providers[2].status.error_count, 1);
    }

    #[tokio::test]
    async fn test_insights_none_when_exhausted() {
        let mgr = manager(vec![ScriptedProvider::new(ProviderKind::Gemini, vec![server_error()])]);
        let insights = mgr
            .generate_insights(&serde_json::json!({ "safetyIndex": 40 }), "Patna")
            .await
            .unwrap();
        assert!(insights.is_none());
    }
}
