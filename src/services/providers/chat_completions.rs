use super::{http_client, AiProvider, CompletionRequest, ProviderError, RetryPolicy};
use crate::domain::models::ProviderKind;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const CEREBRAS_API_BASE: &str = "https://api.cerebras.ai/v1";
pub const MISTRAL_API_BASE: &str = "https://api.mistral.ai/v1";

#[derive(Debug, Clone)]
pub struct ChatCompletionsConfig {
    pub kind: ProviderKind,
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// OpenAI-compatible `/chat/completions` backend (Cerebras, Mistral).
#[derive(Debug, Clone)]
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    config: ChatCompletionsConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsProvider {
    pub fn new(config: ChatCompletionsConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        let client = http_client(config.timeout)?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{base}/chat/completions")
        }
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let resp = self
            .client
            .post(self.url())
            .bearer_auth(self.config.api_key.trim())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, text));
        }

        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!(
                    "{} returned no message content",
                    self.config.kind.label()
                ))
            })
    }
}

#[async_trait]
impl AiProvider for ChatCompletionsProvider {
    fn kind(&self) -> ProviderKind {
        self.config.kind
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        if request.image.is_some() {
            return Err(ProviderError::ImagesUnsupported);
        }
        self.config
            .retry
            .run(self.config.kind.label(), || self.send_once(request))
            .await
    }
}
