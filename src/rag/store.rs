//! DocumentStore trait: the persistent nearest-neighbor collection the
//! retriever reads from.
//!
//! The primary implementation is `SqliteDocumentStore` in the `sqlite` module.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vector_math::VectorError;

/// A document to be written into a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A stored document matched by a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub text: String,
    /// Cosine distance to the query (lower = closer).
    pub distance: f32,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("collection not found: {0}")]
    UnknownCollection(String),
    #[error("corrupted embedding for document '{id}': {source}")]
    CorruptEmbedding {
        id: String,
        #[source]
        source: VectorError,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Ensure the named collection exists.
    async fn get_or_create_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Insert documents, replacing any existing document with the same id.
    async fn add(&self, collection: &str, documents: Vec<NewDocument>) -> Result<(), StoreError>;

    /// Return up to `n_results` documents ordered by ascending distance.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<RetrievedDocument>, StoreError>;

    /// Number of documents in the collection.
    async fn count(&self, collection: &str) -> Result<usize, StoreError>;
}
