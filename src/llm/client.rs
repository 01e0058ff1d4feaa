use std::sync::Arc;

use super::error::LlmError;
use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatRequest};

pub const COMPANION_SYSTEM_PROMPT: &str = "You are a supportive mental health companion.";

/// Single-shot generation on top of a chat provider: one system instruction,
/// one user message, first completion back.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_sampling(mut self, temperature: Option<f64>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(COMPANION_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .with_sampling(self.temperature, self.max_tokens);

        self.provider.chat(request).await
    }
}
