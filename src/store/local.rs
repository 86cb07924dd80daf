//! Backend A: relational store with inline vectors (SQLite + sqlite-vec).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex as TokioMutex;

use super::{Candidate, StoreError, VectorStore};
use crate::config::Config;
use crate::db::Db;
use crate::db::models::{ChunkRecord, DocumentRecord};

pub struct LocalVectorStore {
    db: Arc<TokioMutex<Db>>,
}

impl LocalVectorStore {
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let db = Db::open(&config.db_path, config.embedding.dimensions)?;
        Ok(Self {
            db: Arc::new(TokioMutex::new(db)),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory(dimensions: usize) -> Result<Self, StoreError> {
        let db = Db::open_in_memory(dimensions)?;
        Ok(Self {
            db: Arc::new(TokioMutex::new(db)),
        })
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn upsert_document(&self, title: &str, source_uri: &str) -> Result<i64, StoreError> {
        let db = self.db.lock().await;
        Ok(db.upsert_document(title, source_uri)?)
    }

    async fn upsert_vector(
        &self,
        doc_id: i64,
        index: usize,
        content: &str,
        vector: &[f32],
    ) -> Result<i64, StoreError> {
        let mut db = self.db.lock().await;
        Ok(db.upsert_chunk_with_vector(doc_id, index, content, vector)?)
    }

    async fn insert_metadata_only(
        &self,
        doc_id: i64,
        index: usize,
        content: &str,
    ) -> Result<i64, StoreError> {
        let db = self.db.lock().await;
        Ok(db.upsert_chunk_row(doc_id, index, content)?)
    }

    async fn update_vector_by_id(&self, chunk_id: i64, vector: &[f32]) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        if db.get_chunk(chunk_id)?.is_none() {
            return Err(StoreError::UnknownChunk(chunk_id));
        }
        db.attach_vector(chunk_id, vector)?;
        Ok(())
    }

    async fn query_top_k(
        &self,
        vector: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<Candidate>, StoreError> {
        let db = self.db.lock().await;
        let hits = db.similarity_search(vector, k, min_score)?;
        Ok(hits
            .into_iter()
            .map(|hit| Candidate {
                id: hit.chunk_id.to_string(),
                title: hit.title,
                text: hit.content,
                source_url: hit.source_uri,
                score: hit.score,
            })
            .collect())
    }

    async fn fetch_by_id(&self, chunk_id: i64) -> Result<Option<ChunkRecord>, StoreError> {
        let db = self.db.lock().await;
        Ok(db.get_chunk(chunk_id)?)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let db = self.db.lock().await;
        Ok(db.list_documents()?)
    }

    fn stores_vectors_inline(&self) -> bool {
        true
    }
}
