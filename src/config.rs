use crate::domain::models::ProviderKind;
use crate::services::providers::chat_completions::{CEREBRAS_API_BASE, MISTRAL_API_BASE};
use crate::services::providers::gemini::GEMINI_API_BASE;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be true or false, got '{value}'")]
    InvalidBool { name: &'static str, value: String },
    #[error("AI_PROVIDER_ORDER: {0}")]
    InvalidProviderOrder(String),
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub cerebras: ProviderSettings,
    pub mistral: ProviderSettings,
    pub gemini: ProviderSettings,
    pub provider_order: Vec<ProviderKind>,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub rate_limit_cooldown: Duration,
    pub fallback_enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewsKeys {
    pub newsdata: Option<String>,
    pub gnews: Option<String>,
    pub mediastack: Option<String>,
    pub currents: Option<String>,
    pub newscatcher: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub static_dir: PathBuf,
    pub news_cache_ttl: Duration,
    pub geoapify_api_key: Option<String>,
    pub news: NewsKeys,
    pub ai: AiConfig,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let text = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| format!("0.0.0.0:{}", text("PORT", "3000")));

        let ai = AiConfig {
            cerebras: ProviderSettings {
                api_key: get("CEREBRAS_API_KEY"),
                model: text("CEREBRAS_MODEL", "llama3.1-8b"),
                api_base: text("CEREBRAS_API_BASE", CEREBRAS_API_BASE),
            },
            mistral: ProviderSettings {
                api_key: get("MISTRAL_API_KEY"),
                model: text("MISTRAL_MODEL", "mistral-large-latest"),
                api_base: text("MISTRAL_API_BASE", MISTRAL_API_BASE),
            },
            gemini: ProviderSettings {
                api_key: get("GEMINI_API_KEY"),
                model: text("GEMINI_MODEL", "gemini-2.0-flash-exp"),
                api_base: text("GEMINI_API_BASE", GEMINI_API_BASE),
            },
            provider_order: parse_order(&text("AI_PROVIDER_ORDER", "cerebras,mistral,gemini"))?,
            max_retries: number(&get, "AI_MAX_RETRIES", 3)?,
            retry_delay: Duration::from_millis(number(&get, "AI_RETRY_DELAY_MS", 0)?),
            request_timeout: Duration::from_secs(number(&get, "AI_REQUEST_TIMEOUT_SECS", 30)?),
            rate_limit_cooldown: Duration::from_secs(number(
                &get,
                "AI_RATE_LIMIT_COOLDOWN_SECS",
                60,
            )?),
            fallback_enabled: boolean(&get, "AI_FALLBACK_ENABLED", true)?,
        };

        Ok(Self {
            bind_addr,
            data_dir: PathBuf::from(text("DATA_DIR", "./data")),
            static_dir: PathBuf::from(text("STATIC_DIR", "static")),
            news_cache_ttl: Duration::from_secs(number(&get, "NEWS_CACHE_TTL_SECS", 3600)?),
            geoapify_api_key: get("GEOAPIFY_API_KEY"),
            news: NewsKeys {
                newsdata: get("NEWS_DATA_API_KEY"),
                gnews: get("GNEWS_API_KEY"),
                mediastack: get("MEDIASTACK_API_KEY"),
                currents: get("CURRENTS_API_KEY"),
                newscatcher: get("NEWSCATCHER_API_KEY"),
            },
            ai,
            rate_limit_max_requests: number(&get, "RATE_LIMIT_MAX_REQUESTS", 60)?,
            rate_limit_window_secs: number(&get, "RATE_LIMIT_WINDOW_SECS", 60)?,
        })
    }
}

fn number<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}

fn boolean<G>(get: &G, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { name, value }),
        },
    }
}

/// Comma-separated provider names; duplicates keep their first position.
fn parse_order(raw: &str) -> Result<Vec<ProviderKind>, ConfigError> {
    let mut order = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let kind = ProviderKind::try_from(part).map_err(ConfigError::InvalidProviderOrder)?;
        if !order.contains(&kind) {
            order.push(kind);
        }
    }
    if order.is_empty() {
        return Err(ConfigError::InvalidProviderOrder("no providers listed".into()));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
        assert_eq!(cfg.data_dir, PathBuf::from("./data"));
        assert_eq!(
            cfg.ai.provider_order,
            vec![ProviderKind::Cerebras, ProviderKind::Mistral, ProviderKind::Gemini]
        );
        assert_eq!(cfg.ai.max_retries, 3);
        assert_eq!(cfg.ai.retry_delay, Duration::ZERO);
        assert_eq!(cfg.ai.rate_limit_cooldown, Duration::from_secs(60));
        assert!(cfg.ai.fallback_enabled);
        assert!(cfg.ai.gemini.api_key.is_none());
        assert_eq!(cfg.news_cache_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.rate_limit_max_requests, 60);
    }

    #[test]
    fn test_overrides_and_blank_keys() {
        let cfg = config(&[
            ("PORT", "8080"),
            ("GEMINI_API_KEY", "  "),
            ("MISTRAL_API_KEY", "m-key"),
            ("AI_PROVIDER_ORDER", "gemini, mistral, gemini"),
            ("AI_FALLBACK_ENABLED", "off"),
            ("AI_RETRY_DELAY_MS", "250"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert!(cfg.ai.gemini.api_key.is_none());
        assert_eq!(cfg.ai.mistral.api_key.as_deref(), Some("m-key"));
        assert_eq!(cfg.ai.provider_order, vec![ProviderKind::Gemini, ProviderKind::Mistral]);
        assert!(!cfg.ai.fallback_enabled);
        assert_eq!(cfg.ai.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            config(&[("AI_MAX_RETRIES", "three")]),
            Err(ConfigError::InvalidNumber { name: "AI_MAX_RETRIES", .. })
        ));
        assert!(matches!(
            config(&[("AI_FALLBACK_ENABLED", "maybe")]),
            Err(ConfigError::InvalidBool { .. })
        ));
        assert!(matches!(
            config(&[("AI_PROVIDER_ORDER", "openai")]),
            Err(ConfigError::InvalidProviderOrder(_))
        ));
    }
}
