//! Retrieval side of the chat pipeline.
//!
//! - `DocumentStore`: persistent collections of embedded documents
//! - `Embedder`: query text to vector
//! - `ContextRetriever`: top-k lookup that degrades instead of failing

mod embedding;
mod retriever;
mod sqlite;
mod store;

pub use embedding::Embedder;
pub use retriever::{ContextRetriever, RetrievedContext, NO_CONTEXT_AVAILABLE, NO_RELEVANT_CONTEXT};
pub use sqlite::SqliteDocumentStore;
pub use store::{DocumentStore, NewDocument, RetrievedDocument, StoreError};
