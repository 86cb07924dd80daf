use chrono::{DateTime, Utc};

/// A document row: identity, title, source URI and creation timestamp.
/// Immutable once created except via explicit re-ingestion.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: i64,
    pub title: String,
    pub source_uri: String,
    pub created_at: DateTime<Utc>,
}

/// A chunk row. The embedding is not part of the row: for the sqlite-vec
/// backend it lives in `vec_chunks`, for the external-index backend it lives
/// in the managed index.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: i64,
    pub document_id: i64,
    pub position: usize,
    pub content: String,
}
