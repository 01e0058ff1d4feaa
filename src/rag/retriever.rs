use std::sync::Arc;

use super::embedding::Embedder;
use super::store::{DocumentStore, RetrievedDocument};

pub const NO_RELEVANT_CONTEXT: &str = "No relevant context found.";
pub const NO_CONTEXT_AVAILABLE: &str = "No context available.";

/// Outcome of a retrieval. Never an error: a failing store degrades to
/// `Unavailable` so the chat request can continue.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievedContext {
    /// Nearest documents, ascending distance, never more than `k`.
    Documents(Vec<RetrievedDocument>),
    /// The collection had nothing to return.
    Empty,
    /// The embedder or the store failed.
    Unavailable,
}

impl RetrievedContext {
    pub fn documents(&self) -> &[RetrievedDocument] {
        match self {
            RetrievedContext::Documents(docs) => docs,
            RetrievedContext::Empty | RetrievedContext::Unavailable => &[],
        }
    }

    /// Text lines to place in a prompt; placeholders stand in for the
    /// empty and unavailable cases.
    pub fn snippets(&self) -> Vec<String> {
        match self {
            RetrievedContext::Documents(docs) => docs.iter().map(|d| d.text.clone()).collect(),
            RetrievedContext::Empty => vec![NO_RELEVANT_CONTEXT.to_string()],
            RetrievedContext::Unavailable => vec![NO_CONTEXT_AVAILABLE.to_string()],
        }
    }
}

#[derive(Clone)]
pub struct ContextRetriever {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    collection: String,
}

impl ContextRetriever {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            collection: collection.into(),
        }
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> RetrievedContext {
        if k == 0 {
            return RetrievedContext::Empty;
        }

        let embedding = match self.embedder.embed(&[query.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.swap_remove(0),
            Ok(_) => {
                tracing::warn!("Error retrieving context: embedder returned no vector");
                return RetrievedContext::Unavailable;
            }
            Err(err) => {
                tracing::warn!("Error retrieving context: {}", err);
                return RetrievedContext::Unavailable;
            }
        };

        match self.store.query(&self.collection, &embedding, k).await {
            Ok(docs) if docs.is_empty() => RetrievedContext::Empty,
            Ok(mut docs) => {
                docs.truncate(k);
                tracing::debug!(
                    collection = %self.collection,
                    hits = docs.len(),
                    "retrieved context"
                );
                RetrievedContext::Documents(docs)
            }
            Err(err) => {
                tracing::warn!("Error retrieving context: {}", err);
                RetrievedContext::Unavailable
            }
        }
    }
}
