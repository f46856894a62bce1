//! Deterministic provider for running without an API key.

use crate::api_types::{ChatMessage, ChatRole};
use crate::llm::{CompletionParams, LlmClient};
use anyhow::Result;

/// Always answers immediately, echoing the latest user turn.
#[derive(Debug, Clone)]
pub struct MockProvider {
    model: String,
}

impl MockProvider {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for MockProvider {
    async fn complete(&self, messages: &[ChatMessage], _params: &CompletionParams) -> Result<String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!(
            "Thought: I can answer without using any more tools.\nAnswer: (Mock {} response) I received: {}",
            self.model, last_user
        ))
    }
}
