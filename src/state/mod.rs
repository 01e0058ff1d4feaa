use std::sync::Arc;

use crate::chat::ChatOrchestrator;
use crate::core::config::{AppPaths, Settings};
use crate::emotion::{EmotionClassifier, SequenceClassifier};
use crate::llm::{LlmClient, OpenAiProvider};
use crate::rag::{ContextRetriever, DocumentStore, SqliteDocumentStore};

pub mod error;

use error::InitializationError;

/// Shared, read-only state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatOrchestrator,
}

impl AppState {
    pub fn new(chat: ChatOrchestrator) -> Arc<Self> {
        Arc::new(Self { chat })
    }

    /// Builds every collaborator once, in order:
    /// 1. the classifier (weights, tokenizer, label set)
    /// 2. the SQLite document store and its collection
    /// 3. the OpenAI-compatible provider, used for both chat and embeddings
    ///
    /// Any failure here is fatal; nothing is retried lazily per request.
    pub async fn initialize(
        paths: &AppPaths,
        settings: &Settings,
    ) -> Result<Arc<Self>, InitializationError> {
        let classifier = load_classifier(paths, settings).await?;
        tracing::info!(labels = ?classifier.labels(), "Emotion classifier ready");

        let db_path = paths.resolve(&settings.rag.db_path);
        let store = SqliteDocumentStore::open(&db_path)
            .await
            .map_err(|e| InitializationError::Store(e.into()))?;
        store
            .get_or_create_collection(&settings.rag.collection)
            .await
            .map_err(|e| InitializationError::Store(e.into()))?;
        let documents = store
            .count(&settings.rag.collection)
            .await
            .map_err(|e| InitializationError::Store(e.into()))?;
        tracing::info!(
            path = %db_path.display(),
            collection = %settings.rag.collection,
            documents,
            "Document store ready"
        );

        let provider =
            Arc::new(OpenAiProvider::new(&settings.llm).map_err(InitializationError::Llm)?);
        tracing::info!(
            provider = ?settings.llm.provider,
            model = %settings.llm.model,
            "LLM provider ready"
        );

        let retriever = ContextRetriever::new(
            Arc::new(store),
            provider.clone(),
            settings.rag.collection.clone(),
        );
        let llm = LlmClient::new(provider)
            .with_sampling(settings.llm.temperature, settings.llm.max_tokens);
        let chat = ChatOrchestrator::new(classifier, retriever, llm).with_top_k(settings.rag.top_k);

        Ok(Self::new(chat))
    }
}

async fn load_classifier(
    paths: &AppPaths,
    settings: &Settings,
) -> Result<Arc<dyn EmotionClassifier>, InitializationError> {
    let model_dir = paths.resolve(&settings.classifier.model_dir);
    let max_input_tokens = settings.classifier.max_input_tokens;
    let labels = settings.classifier.labels.clone();

    let classifier = tokio::task::spawn_blocking(move || {
        SequenceClassifier::load(&model_dir, max_input_tokens, labels.as_deref())
    })
    .await
    .map_err(|e| InitializationError::Classifier(e.into()))?
    .map_err(|e| InitializationError::Classifier(e.into()))?;

    Ok(Arc::new(classifier))
}
