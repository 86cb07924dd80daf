//! Mock embedder for testing purposes.
//!
//! Produces deterministic bag-of-tokens vectors: each lowercase token hashes
//! to a pseudo-random direction, and a text's vector is the normalized sum of
//! its token directions. Texts sharing tokens therefore score measurably
//! higher than unrelated texts, which the retrieval tests rely on.
use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use super::{Embedder, ProviderError};

pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for token in tokenize(text) {
            for (dim, slot) in embedding.iter_mut().enumerate() {
                *slot += token_component(&token, dim);
            }
        }

        // L2 normalize
        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }

        embedding
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Deterministic pseudo-random component in [-1, 1] for a (token, dim) pair.
fn token_component(token: &str, dim: usize) -> f32 {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    dim.hash(&mut hasher);
    let hash = hasher.finish();
    (hash as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_mock_embed_dimensions() {
        let embedder = MockEmbedder::new(384);
        let result = embedder.embed_one("hello world").await.unwrap();
        assert_eq!(result.len(), 384);
    }

    #[tokio::test]
    async fn test_mock_embed_deterministic() {
        let embedder = MockEmbedder::new(384);
        let a = embedder.embed_one("hello").await.unwrap();
        let b = embedder.embed_one("hello").await.unwrap();
        assert_eq!(a, b, "same input should produce same output");
    }

    #[tokio::test]
    async fn test_mock_embed_different_inputs() {
        let embedder = MockEmbedder::new(384);
        let a = embedder.embed_one("hello").await.unwrap();
        let b = embedder.embed_one("world").await.unwrap();
        assert_ne!(a, b, "different inputs should produce different outputs");
    }

    #[tokio::test]
    async fn test_mock_embed_normalized() {
        let embedder = MockEmbedder::new(384);
        let vec = embedder.embed_one("test normalization").await.unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "vector should be approximately unit length, got {norm}"
        );
    }

    #[tokio::test]
    async fn test_shared_tokens_score_higher() {
        let embedder = MockEmbedder::new(384);
        let query = embedder.embed_one("costs").await.unwrap();
        let related = embedder.embed_one("Costs fell 5%.").await.unwrap();
        let unrelated = embedder.embed_one("Revenue grew 20%.").await.unwrap();

        assert!(
            cosine(&query, &related) > cosine(&query, &unrelated),
            "text sharing a token must rank above unrelated text"
        );
    }

    #[tokio::test]
    async fn test_mock_embed_batch() {
        let embedder = MockEmbedder::new(128);
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let results = embedder.embed(&texts).await.unwrap();
        assert_eq!(results.len(), 3);
        for vec in &results {
            assert_eq!(vec.len(), 128);
        }
    }
}
