use async_trait::async_trait;

use super::error::LlmError;
use super::types::ChatRequest;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name for logs (e.g. "openai", "azure", "openrouter")
    fn name(&self) -> &str;

    /// chat completion (non-streaming), returning the first choice's content
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError>;
}
