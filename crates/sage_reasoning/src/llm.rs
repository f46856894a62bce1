use crate::api_types::ChatMessage;
use anyhow::Result;
use async_trait::async_trait;
use sage_core::config::LlmConfig;

/// Sampling parameters for one completion.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Sequences at which generation halts.
    pub stop: Vec<String>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.1,
            stop: Vec::new(),
        }
    }
}

impl CompletionParams {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            stop: Vec::new(),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Produce the raw text of the next reasoning step for the formatted input.
    async fn complete(&self, messages: &[ChatMessage], params: &CompletionParams) -> Result<String>;
}
