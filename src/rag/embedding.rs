use async_trait::async_trait;

use crate::llm::LlmError;

/// Turns text into vectors comparable with the ones stored in the collection.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}
