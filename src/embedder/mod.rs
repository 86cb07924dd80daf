//! Embedder trait and shared provider error type.
//!
//! Embedding runs against a remote model, so the trait is async. Calls are
//! order-preserving, one vector per input, and never retried here — retry
//! policy belongs to the caller.
pub mod mock;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by remote model providers (embedding and re-ranking).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("provider returned {got} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("malformed provider response: {0}")]
    Decode(String),
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. Order-preserving: one vector per input,
    /// in input order, all of length [`Embedder::dimensions`].
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single text string into a vector.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors.pop().ok_or(ProviderError::CountMismatch {
            expected: 1,
            got: 0,
        })
    }

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}
