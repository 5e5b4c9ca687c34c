pub mod chat_completions;
pub mod gemini;

use crate::domain::models::ProviderKind;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

pub use chat_completions::ChatCompletionsProvider;
pub use gemini::GeminiProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("rate limited (429): {body}")]
    RateLimited { body: String },
    #[error("provider returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("images are not supported by this provider")]
    ImagesUnsupported,
}

impl ProviderError {
    /// 429s, however they surface.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::HttpStatus { status, .. } => *status == 429,
            ProviderError::Http(err) => err.status().map(|s| s.as_u16() == 429).unwrap_or(false),
            other => other.to_string().contains("429"),
        }
    }

    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status.as_u16() == 429 {
            ProviderError::RateLimited { body }
        } else {
            ProviderError::HttpStatus {
                status: status.as_u16(),
                body,
            }
        }
    }
}

/// Request URLs may carry API keys, so they never reach the error text.
impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.without_url())
    }
}

#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data_base64: String,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub image: Option<InlineImage>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.3,
            max_tokens: 2048,
            image: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn image(mut self, image: InlineImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// One link of the fallback chain.
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Returns the raw text reply of the model.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;

    fn supports_images(&self) -> bool {
        false
    }
}

/// Retry policy for rate-limited calls. Only 429s are retried; every other
/// failure goes straight back to the caller.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub async fn run<F, Fut>(&self, label: &str, mut call: F) -> Result<String, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<String, ProviderError>>,
    {
        let mut retries = 0;
        loop {
            match call().await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_rate_limit() && retries < self.max_retries => {
                    retries += 1;
                    tracing::info!(
                        "{} rate limited, retrying (attempt {}/{})",
                        label,
                        retries,
                        self.max_retries
                    );
                    if !self.delay.is_zero() {
                        sleep(self.delay * retries).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}
