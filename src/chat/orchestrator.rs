use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::prompt::{build_prompt, join_context};
use crate::core::errors::ApiError;
use crate::emotion::{EmotionClassifier, EmotionResult};
use crate::llm::LlmClient;
use crate::rag::ContextRetriever;

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub emotion: EmotionResult,
    pub answer: String,
}

/// Runs one chat turn: classify, retrieve, template, generate.
///
/// Every dependency is injected; nothing is kept between calls.
#[derive(Clone)]
pub struct ChatOrchestrator {
    classifier: Arc<dyn EmotionClassifier>,
    retriever: ContextRetriever,
    llm: LlmClient,
    top_k: usize,
}

impl ChatOrchestrator {
    pub fn new(
        classifier: Arc<dyn EmotionClassifier>,
        retriever: ContextRetriever,
        llm: LlmClient,
    ) -> Self {
        Self {
            classifier,
            retriever,
            llm,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Runs the classifier on the blocking pool.
    pub async fn classify(&self, message: &str) -> Result<EmotionResult, ApiError> {
        let classifier = Arc::clone(&self.classifier);
        let text = message.to_string();

        tokio::task::spawn_blocking(move || classifier.predict(&text))
            .await
            .map_err(ApiError::internal)?
            .map_err(|err| {
                tracing::error!("Emotion classification failed: {}", err);
                ApiError::internal(err)
            })
    }

    pub async fn handle(&self, message: &str) -> Result<ChatResponse, ApiError> {
        let emotion = self.classify(message).await?;
        tracing::debug!(label = %emotion.label, "emotion detected");

        let context = self.retriever.retrieve(message, self.top_k).await;
        let context_text = join_context(&context.snippets());

        let prompt = build_prompt(&emotion.label, &context_text, message);

        let answer = self.llm.generate(&prompt).await.map_err(|err| {
            tracing::error!(
                provider = self.llm.provider_name(),
                kind = err.kind(),
                "LLM generation failed: {}",
                err
            );
            ApiError::from(err)
        })?;

        Ok(ChatResponse { emotion, answer })
    }
}
