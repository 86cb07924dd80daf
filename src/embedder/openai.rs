//! Remote embeddings client for OpenAI-compatible endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::{Embedder, ProviderError};
use crate::config::{ConfigError, EmbeddingConfig};

/// Embeddings client that talks to OpenAI-compatible `/embeddings` endpoints.
#[derive(Clone, Debug)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    /// Builds a new embeddings client. Fails fast on a missing or malformed
    /// API key, before any network call is made.
    pub fn new(config: &EmbeddingConfig, api_key: &str) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("OPENAI_API_KEY"));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ConfigError::Invalid("API key contains invalid characters".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != texts.len() {
            return Err(ProviderError::CountMismatch {
                expected: texts.len(),
                got: parsed.data.len(),
            });
        }
        for entry in &parsed.data {
            if entry.embedding.len() != self.dimensions {
                return Err(ProviderError::Decode(format!(
                    "embedding {} has {} dimensions, expected {}",
                    entry.index,
                    entry.embedding.len(),
                    self.dimensions
                )));
            }
        }

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_config(base_url: String) -> EmbeddingConfig {
        EmbeddingConfig {
            base_url,
            model: "text-embedding-3-small".to_string(),
            dimensions: 3,
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_missing_api_key() {
        let config = test_config("http://localhost".to_string());
        let err = OpenAiEmbedder::new(&config, "  ").unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential("OPENAI_API_KEY")));
    }

    #[tokio::test]
    async fn test_embed_batch_order_preserved() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                // Out-of-order response entries must be re-sorted by index.
                then.status(200).json_body(json!({
                    "data": [
                        {"index": 1, "embedding": [0.4, 0.5, 0.6]},
                        {"index": 0, "embedding": [0.1, 0.2, 0.3]}
                    ]
                }));
            })
            .await;

        let embedder =
            OpenAiEmbedder::new(&test_config(server.base_url()), "test-key").unwrap();
        let vectors = embedder
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
    }

    #[tokio::test]
    async fn test_embed_api_error_propagates() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(429).body("quota exceeded");
            })
            .await;

        let embedder =
            OpenAiEmbedder::new(&test_config(server.base_url()), "test-key").unwrap();
        let err = embedder.embed(&["text".to_string()]).await.unwrap_err();
        match err {
            ProviderError::Api { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("quota"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_embed_count_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}]
                }));
            })
            .await;

        let embedder =
            OpenAiEmbedder::new(&test_config(server.base_url()), "test-key").unwrap();
        let err = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::CountMismatch { expected: 2, got: 1 }
        ));
    }

    #[tokio::test]
    async fn test_empty_input_no_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({"data": []}));
            })
            .await;

        let embedder =
            OpenAiEmbedder::new(&test_config(server.base_url()), "test-key").unwrap();
        let vectors = embedder.embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
        mock.assert_hits_async(0).await;
    }
}
