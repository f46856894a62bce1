use crate::api_types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::llm::{CompletionParams, LlmClient};
use crate::retry::{with_retry, RetryPolicy};
use anyhow::{Context, Result};
use reqwest::Client;
use sage_core::config::LlmConfig;
use std::env;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions client for OpenAI and compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Reads the key from `OPENAI_API_KEY`.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY must be set to use the openai provider")?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()?,
            api_key: api_key.into(),
            base_url,
            model: config.model.clone(),
            retry: RetryPolicy::default().with_max_attempts(config.max_attempts),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage], params: &CompletionParams) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stop: &params.stop,
        };
        let url = format!("{}/chat/completions", self.base_url);

        let response = with_retry(&self.retry, "OpenAI", || {
            let request = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body);
            async move { request.send().await.map_err(anyhow::Error::from) }
        })
        .await?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to decode OpenAI response")?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("OpenAI response contained no choices")?;
        tracing::debug!("OpenAI finish_reason: {:?}", choice.finish_reason);

        Ok(choice.message.content.unwrap_or_default())
    }
}
