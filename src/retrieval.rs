//! Retrieval service: embed the query, run the vector store's top-K query,
//! optionally quality-boost with the LLM re-rank pass.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::embedder::{Embedder, ProviderError};
use crate::rerank::Reranker;
use crate::store::{Candidate, StoreError, VectorStore};

#[derive(Error, Debug)]
pub enum RetrieveError {
    #[error("query embedding failed: {0}")]
    Embed(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    reranker: Option<Reranker>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            reranker: None,
        }
    }

    #[must_use]
    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Top-K retrieval. Candidates come back in the backend's own ranking;
    /// no additional sort is imposed here.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        min_score: f32,
    ) -> Result<Vec<Candidate>, RetrieveError> {
        let vector = self.embedder.embed_one(query).await?;
        let candidates = self.store.query_top_k(&vector, k, min_score).await?;
        debug!(query, candidates = candidates.len(), "vector retrieval");
        Ok(candidates)
    }

    /// Retrieval followed by the best-effort re-rank pass. A failing or
    /// unusable re-rank call falls back to the vector ordering; it never
    /// fails retrieval itself.
    pub async fn retrieve_reranked(
        &self,
        query: &str,
        k: usize,
        min_score: f32,
    ) -> Result<Vec<Candidate>, RetrieveError> {
        let candidates = self.retrieve(query, k, min_score).await?;

        let Some(reranker) = &self.reranker else {
            return Ok(candidates);
        };

        match reranker.rerank(query, candidates.clone()).await {
            Ok(reranked) => Ok(reranked),
            Err(err) => {
                warn!(error = %err, "re-rank failed, keeping vector order");
                Ok(candidates)
            }
        }
    }
}
