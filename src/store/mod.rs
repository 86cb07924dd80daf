//! Vector store adapter: one capability surface over two interchangeable
//! backends.
//!
//! The backend is selected once by configuration in [`open_store`]; nothing
//! outside the construction site branches on backend identity. Backend A
//! ([`local::LocalVectorStore`]) keeps embeddings inline in the relational
//! store; backend B ([`pinecone::PineconeStore`]) keeps metadata rows
//! locally and the authoritative vectors in an external managed index.
pub mod local;
pub mod pinecone;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Backend, Config, ConfigError};
use crate::db::models::{ChunkRecord, DocumentRecord};

/// A retrieval result: chunk identity plus denormalized document metadata
/// and a similarity score in [0, 1]. The score is overwritten during
/// re-ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub text: String,
    pub source_url: String,
    pub score: f32,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("index request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("index returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unknown chunk id: {0}")]
    UnknownChunk(i64),
}

/// Capability surface shared by both backends: upsert, fetch, and
/// similarity query.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or update the owning document row, returning its id.
    async fn upsert_document(&self, title: &str, source_uri: &str) -> Result<i64, StoreError>;

    /// Write a chunk and its vector in one step, keyed by (document, index).
    /// Conflict replaces content and embedding, not identity.
    async fn upsert_vector(
        &self,
        doc_id: i64,
        index: usize,
        content: &str,
        vector: &[f32],
    ) -> Result<i64, StoreError>;

    /// Write a chunk row without a vector, returning the chunk id.
    async fn insert_metadata_only(
        &self,
        doc_id: i64,
        index: usize,
        content: &str,
    ) -> Result<i64, StoreError>;

    /// Attach or replace the vector for an existing chunk.
    async fn update_vector_by_id(&self, chunk_id: i64, vector: &[f32]) -> Result<(), StoreError>;

    /// Top-K similarity query with a minimum-score cutoff. Results come back
    /// ranked by the backend's own metric; no re-sort is imposed here.
    async fn query_top_k(
        &self,
        vector: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<Candidate>, StoreError>;

    /// Fetch a single chunk row by id.
    async fn fetch_by_id(&self, chunk_id: i64) -> Result<Option<ChunkRecord>, StoreError>;

    /// All ingested documents.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError>;

    /// Whether vectors are stored inline with chunk rows (as opposed to an
    /// external index). Drives the ingestion pipeline's write path.
    fn stores_vectors_inline(&self) -> bool;
}

/// Construct the configured backend. This is the single place backend
/// identity is examined.
pub fn open_store(config: &Config) -> Result<Box<dyn VectorStore>, StoreError> {
    match config.backend {
        Backend::SqliteVec => Ok(Box::new(local::LocalVectorStore::open(config)?)),
        Backend::Pinecone => Ok(Box::new(pinecone::PineconeStore::open(config)?)),
    }
}
