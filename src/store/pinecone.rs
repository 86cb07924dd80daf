//! Backend B: external managed vector index over HTTP.
//!
//! Chunk metadata rows live in the local SQLite catalog (which also mints
//! the chunk ids); the authoritative vectors live in the index. Upserted
//! vectors carry document id, title, source URI and chunk index as attached
//! metadata so query results can be hydrated without touching the relational
//! embedding column, which stays empty in this mode.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as TokioMutex;
use tracing::warn;

use super::{Candidate, StoreError, VectorStore};
use crate::config::{Config, ConfigError};
use crate::db::Db;
use crate::db::models::{ChunkRecord, DocumentRecord};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct PineconeStore {
    catalog: Arc<TokioMutex<Db>>,
    client: reqwest::Client,
    index_host: String,
    namespace: Option<String>,
}

impl PineconeStore {
    /// Open the configured index. Fails fast when the API key or index host
    /// is missing, before any network call.
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let api_key = Config::pinecone_api_key()?;
        if config.pinecone.index_host.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "pinecone.index_host is required for the pinecone backend".into(),
            )
            .into());
        }
        let catalog = Db::open(&config.db_path, config.embedding.dimensions)?;
        Self::new(
            catalog,
            &config.pinecone.index_host,
            config.pinecone.namespace.clone(),
            &api_key,
        )
    }

    /// Build a store around an existing catalog; used by [`Self::open`] and
    /// by tests against a mock index.
    pub fn new(
        catalog: Db,
        index_host: &str,
        namespace: Option<String>,
        api_key: &str,
    ) -> Result<Self, StoreError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("PINECONE_API_KEY").into());
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "Api-Key",
            HeaderValue::from_str(api_key.trim()).map_err(|_| {
                ConfigError::Invalid("API key contains invalid characters".into())
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            catalog: Arc::new(TokioMutex::new(catalog)),
            client,
            index_host: index_host.trim_end_matches('/').to_string(),
            namespace,
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, StoreError> {
        let url = format!("{}{path}", self.index_host);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn push_vector(
        &self,
        chunk: &ChunkRecord,
        document: &DocumentRecord,
        vector: &[f32],
    ) -> Result<(), StoreError> {
        let request = UpsertRequest {
            vectors: vec![IndexVector {
                id: chunk.id.to_string(),
                values: vector,
                metadata: VectorMetadata {
                    document_id: chunk.document_id,
                    chunk_index: chunk.position,
                    title: document.title.clone(),
                    source_uri: document.source_uri.clone(),
                },
            }],
            namespace: self.namespace.as_deref(),
        };
        let _: UpsertResponse = self.post("/vectors/upsert", &request).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert_document(&self, title: &str, source_uri: &str) -> Result<i64, StoreError> {
        let catalog = self.catalog.lock().await;
        Ok(catalog.upsert_document(title, source_uri)?)
    }

    async fn upsert_vector(
        &self,
        doc_id: i64,
        index: usize,
        content: &str,
        vector: &[f32],
    ) -> Result<i64, StoreError> {
        let chunk_id = self.insert_metadata_only(doc_id, index, content).await?;
        self.update_vector_by_id(chunk_id, vector).await?;
        Ok(chunk_id)
    }

    async fn insert_metadata_only(
        &self,
        doc_id: i64,
        index: usize,
        content: &str,
    ) -> Result<i64, StoreError> {
        let catalog = self.catalog.lock().await;
        Ok(catalog.upsert_chunk_row(doc_id, index, content)?)
    }

    async fn update_vector_by_id(&self, chunk_id: i64, vector: &[f32]) -> Result<(), StoreError> {
        let (chunk, document) = {
            let catalog = self.catalog.lock().await;
            let chunk = catalog
                .get_chunk(chunk_id)?
                .ok_or(StoreError::UnknownChunk(chunk_id))?;
            let document = catalog
                .get_document(chunk.document_id)?
                .ok_or(StoreError::UnknownChunk(chunk_id))?;
            (chunk, document)
        };
        self.push_vector(&chunk, &document, vector).await
    }

    async fn query_top_k(
        &self,
        vector: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<Candidate>, StoreError> {
        let request = QueryRequest {
            vector,
            top_k: k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };
        let response: QueryResponse = self.post("/query", &request).await?;

        let mut candidates = Vec::with_capacity(response.matches.len());
        for m in response.matches {
            if m.score < min_score {
                continue;
            }
            let Ok(chunk_id) = m.id.parse::<i64>() else {
                warn!(id = %m.id, "skipping match with non-numeric id");
                continue;
            };
            let Some(metadata) = m.metadata else {
                warn!(id = %m.id, "skipping match without metadata");
                continue;
            };
            // Hydrate the chunk text from the catalog row the id points at.
            let text = {
                let catalog = self.catalog.lock().await;
                match catalog.get_chunk(chunk_id)? {
                    Some(chunk) => chunk.content,
                    None => {
                        warn!(chunk_id, "index match has no catalog row");
                        continue;
                    }
                }
            };
            candidates.push(Candidate {
                id: m.id,
                title: metadata.title,
                text,
                source_url: metadata.source_uri,
                score: m.score,
            });
        }

        candidates.truncate(k);
        Ok(candidates)
    }

    async fn fetch_by_id(&self, chunk_id: i64) -> Result<Option<ChunkRecord>, StoreError> {
        let catalog = self.catalog.lock().await;
        Ok(catalog.get_chunk(chunk_id)?)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let catalog = self.catalog.lock().await;
        Ok(catalog.list_documents()?)
    }

    fn stores_vectors_inline(&self) -> bool {
        false
    }
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<IndexVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct IndexVector<'a> {
    id: String,
    values: &'a [f32],
    metadata: VectorMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorMetadata {
    document_id: i64,
    chunk_index: usize,
    title: String,
    source_uri: String,
}

#[derive(Deserialize)]
struct UpsertResponse {
    #[serde(rename = "upsertedCount", default)]
    #[allow(dead_code)]
    upserted_count: usize,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<IndexMatch>,
}

#[derive(Deserialize)]
struct IndexMatch {
    id: String,
    score: f32,
    metadata: Option<VectorMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn store_with_mock(server: &MockServer) -> PineconeStore {
        let catalog = Db::open_in_memory(3).unwrap();
        PineconeStore::new(catalog, &server.base_url(), None, "test-key").unwrap()
    }

    #[test]
    fn test_missing_api_key() {
        let catalog = Db::open_in_memory(3).unwrap();
        let err = PineconeStore::new(catalog, "https://idx.test", None, " ").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Config(ConfigError::MissingCredential("PINECONE_API_KEY"))
        ));
    }

    #[tokio::test]
    async fn test_write_path_splits_metadata_and_vector() {
        let server = MockServer::start_async().await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vectors/upsert")
                    .json_body_partial(r#"{"vectors": [{"id": "1"}]}"#);
                then.status(200).json_body(json!({"upsertedCount": 1}));
            })
            .await;

        let store = store_with_mock(&server);
        let doc_id = store
            .upsert_document("Doc", "https://docs.test/doc")
            .await
            .unwrap();

        let chunk_id = store
            .insert_metadata_only(doc_id, 0, "chunk text")
            .await
            .unwrap();
        // Metadata row exists before any vector is pushed.
        assert!(store.fetch_by_id(chunk_id).await.unwrap().is_some());

        store
            .update_vector_by_id(chunk_id, &[0.1, 0.2, 0.3])
            .await
            .unwrap();
        upsert.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_hydrates_from_catalog() {
        let server = MockServer::start_async().await;

        let store = store_with_mock(&server);
        let doc_id = store
            .upsert_document("Report", "https://docs.test/report")
            .await
            .unwrap();
        let chunk_id = store
            .insert_metadata_only(doc_id, 0, "revenue grew")
            .await
            .unwrap();

        server
            .mock_async(|when, then| {
                when.method(POST).path("/query");
                then.status(200).json_body(json!({
                    "matches": [
                        {
                            "id": chunk_id.to_string(),
                            "score": 0.92,
                            "metadata": {
                                "document_id": doc_id,
                                "chunk_index": 0,
                                "title": "Report",
                                "source_uri": "https://docs.test/report"
                            }
                        },
                        {
                            "id": "999999",
                            "score": 0.8,
                            "metadata": {
                                "document_id": 42,
                                "chunk_index": 0,
                                "title": "Orphan",
                                "source_uri": "https://docs.test/orphan"
                            }
                        },
                        {
                            "id": chunk_id.to_string(),
                            "score": 0.1,
                            "metadata": null
                        }
                    ]
                }));
            })
            .await;

        let candidates = store.query_top_k(&[0.1, 0.2, 0.3], 5, 0.5).await.unwrap();
        // The orphan has no catalog row; the 0.1 match is below min_score.
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].text, "revenue grew");
        assert_eq!(candidates[0].title, "Report");
        assert!((candidates[0].score - 0.92).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_index_error_propagates() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/query");
                then.status(500).body("index unavailable");
            })
            .await;

        let store = store_with_mock(&server);
        let err = store.query_top_k(&[0.1, 0.2, 0.3], 5, 0.0).await.unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_stores_vectors_externally() {
        let server = MockServer::start_async().await;
        let store = store_with_mock(&server);
        assert!(!store.stores_vectors_inline());
    }
}
