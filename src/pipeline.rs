//! Document ingestion pipeline: store metadata, chunk, embed, persist.
//!
//! Writes are sequential and per-chunk; no transaction spans the batch.
//! A chunk that fails to embed or write never rolls back previously written
//! chunks — progress is favored over atomicity, and callers needing
//! all-or-nothing must compensate themselves.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::chunker::{self, ChunkOptions};
use crate::embedder::{Embedder, ProviderError};
use crate::store::{StoreError, VectorStore};

/// What to do when one chunk's embed/write step fails mid-batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failing chunk and surface the error. Chunks written
    /// before the failure stay persisted.
    #[default]
    Abort,
    /// Record the failure and keep going with the remaining chunks.
    Continue,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub chunking: ChunkOptions,
    pub failure_policy: FailurePolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkOptions::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Outcome of one document ingestion.
#[derive(Debug)]
pub struct IngestReport {
    pub document_id: i64,
    pub chunks_total: usize,
    pub chunks_written: usize,
    pub failures: Vec<ChunkFailure>,
}

#[derive(Debug)]
pub struct ChunkFailure {
    pub index: usize,
    pub error: String,
}

/// Embed-or-write failure for a single chunk.
#[derive(Error, Debug)]
pub enum ChunkWriteError {
    #[error(transparent)]
    Embed(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// The owning document row could not be written; no chunks proceed.
    #[error("failed to create document record: {0}")]
    Document(#[source] StoreError),

    /// A chunk failed under [`FailurePolicy::Abort`].
    #[error("chunk {index} failed: {source}")]
    Chunk {
        index: usize,
        #[source]
        source: ChunkWriteError,
    },
}

pub struct IngestionPipeline {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    options: IngestOptions,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        options: IngestOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            options,
        }
    }

    /// Ingest one document: upsert its record, chunk the text, then embed and
    /// persist each chunk in order.
    pub async fn ingest(
        &self,
        title: &str,
        source_uri: &str,
        text: &str,
    ) -> Result<IngestReport, IngestError> {
        let document_id = self
            .store
            .upsert_document(title, source_uri)
            .await
            .map_err(IngestError::Document)?;

        let chunks = chunker::split(text, &self.options.chunking);
        info!(document_id, chunks = chunks.len(), title, "ingesting document");

        let mut report = IngestReport {
            document_id,
            chunks_total: chunks.len(),
            chunks_written: 0,
            failures: Vec::new(),
        };

        for (index, content) in chunks.iter().enumerate() {
            match self.write_chunk(document_id, index, content).await {
                Ok(()) => report.chunks_written += 1,
                Err(source) => {
                    warn!(document_id, index, error = %source, "chunk ingestion failed");
                    report.failures.push(ChunkFailure {
                        index,
                        error: source.to_string(),
                    });
                    if self.options.failure_policy == FailurePolicy::Abort {
                        return Err(IngestError::Chunk { index, source });
                    }
                }
            }
        }

        Ok(report)
    }

    async fn write_chunk(
        &self,
        document_id: i64,
        index: usize,
        content: &str,
    ) -> Result<(), ChunkWriteError> {
        if self.store.stores_vectors_inline() {
            let vector = self.embedder.embed_one(content).await?;
            self.store
                .upsert_vector(document_id, index, content, &vector)
                .await?;
        } else {
            // Metadata row first so the external index can be keyed by its id;
            // the relational embedding stays absent in this mode.
            let chunk_id = self
                .store
                .insert_metadata_only(document_id, index, content)
                .await?;
            let vector = self.embedder.embed_one(content).await?;
            self.store.update_vector_by_id(chunk_id, &vector).await?;
        }
        Ok(())
    }
}
