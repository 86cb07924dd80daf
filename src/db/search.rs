use super::{Db, serialize_vector};
use rusqlite::{Result, params};

/// One similarity-search row, already joined with its document metadata.
#[derive(Debug)]
pub struct SearchHit {
    pub chunk_id: i64,
    pub title: String,
    pub source_uri: String,
    pub content: String,
    /// Similarity in [0, 1], derived from cosine distance as `1 - d/2`.
    pub score: f32,
}

impl Db {
    /// Ranked top-K similarity search with a minimum-score cutoff, executed
    /// entirely inside the database engine.
    pub fn similarity_search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<SearchHit>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT chunk_id, title, source_uri, content, score FROM (
                SELECT
                    c.id AS chunk_id,
                    d.title AS title,
                    d.source_uri AS source_uri,
                    c.content AS content,
                    1.0 - (vec_distance_cosine(v.embedding, ?) / 2.0) AS score
                FROM vec_chunks v
                JOIN chunks c ON v.rowid = c.id
                JOIN documents d ON c.document_id = d.id
            )
            WHERE score >= ?
            ORDER BY score DESC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(
            params![
                serialize_vector(query_vector),
                f64::from(min_score),
                top_k as i64
            ],
            |row| {
                Ok(SearchHit {
                    chunk_id: row.get(0)?,
                    title: row.get(1)?,
                    source_uri: row.get(2)?,
                    content: row.get(3)?,
                    score: row.get::<_, f64>(4)? as f32,
                })
            },
        )?;

        rows.collect()
    }
}
