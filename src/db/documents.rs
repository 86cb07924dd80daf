use super::{Db, models::*, serialize_vector};
use rusqlite::{OptionalExtension, Result, params};

impl Db {
    /// Inserts or updates a document keyed by its source URI, returning the
    /// stable document id. Re-ingestion of the same source keeps the id and
    /// the original creation timestamp.
    pub fn upsert_document(&self, title: &str, source_uri: &str) -> Result<i64> {
        self.conn.query_row(
            r#"
            INSERT INTO documents (title, source_uri)
            VALUES (?, ?)
            ON CONFLICT(source_uri) DO UPDATE SET
                title = excluded.title
            RETURNING id
            "#,
            params![title, source_uri],
            |row| row.get(0),
        )
    }

    /// Returns all documents, oldest first.
    pub fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, source_uri, created_at FROM documents ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(DocumentRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                source_uri: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;

        rows.collect()
    }

    pub fn get_document(&self, doc_id: i64) -> Result<Option<DocumentRecord>> {
        self.conn
            .query_row(
                "SELECT id, title, source_uri, created_at FROM documents WHERE id = ?",
                params![doc_id],
                |row| {
                    Ok(DocumentRecord {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        source_uri: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
    }

    /// Inserts or replaces a chunk row keyed by (document_id, position),
    /// returning the chunk id. On conflict the content is replaced but the
    /// identity is kept.
    pub fn upsert_chunk_row(&self, doc_id: i64, position: usize, content: &str) -> Result<i64> {
        self.conn.query_row(
            r#"
            INSERT INTO chunks (document_id, position, content)
            VALUES (?, ?, ?)
            ON CONFLICT(document_id, position) DO UPDATE SET
                content = excluded.content
            RETURNING id
            "#,
            params![doc_id, position as i64, content],
            |row| row.get(0),
        )
    }

    /// Inserts or replaces a chunk row together with its inline embedding,
    /// in one transaction.
    pub fn upsert_chunk_with_vector(
        &mut self,
        doc_id: i64,
        position: usize,
        content: &str,
        vector: &[f32],
    ) -> Result<i64> {
        let tx = self.conn.transaction()?;

        let chunk_id: i64 = tx.query_row(
            r#"
            INSERT INTO chunks (document_id, position, content)
            VALUES (?, ?, ?)
            ON CONFLICT(document_id, position) DO UPDATE SET
                content = excluded.content
            RETURNING id
            "#,
            params![doc_id, position as i64, content],
            |row| row.get(0),
        )?;

        // vec0 rows cannot be upserted in place; replace explicitly.
        tx.execute("DELETE FROM vec_chunks WHERE rowid = ?", params![chunk_id])?;
        tx.execute(
            "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
            params![chunk_id, serialize_vector(vector)],
        )?;

        tx.commit()?;
        Ok(chunk_id)
    }

    /// Attaches or replaces the inline embedding for an existing chunk.
    pub fn attach_vector(&self, chunk_id: i64, vector: &[f32]) -> Result<()> {
        self.conn
            .execute("DELETE FROM vec_chunks WHERE rowid = ?", params![chunk_id])?;
        self.conn.execute(
            "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
            params![chunk_id, serialize_vector(vector)],
        )?;
        Ok(())
    }

    pub fn get_chunk(&self, chunk_id: i64) -> Result<Option<ChunkRecord>> {
        self.conn
            .query_row(
                "SELECT id, document_id, position, content FROM chunks WHERE id = ?",
                params![chunk_id],
                |row| {
                    Ok(ChunkRecord {
                        id: row.get(0)?,
                        document_id: row.get(1)?,
                        position: row.get::<_, i64>(2)? as usize,
                        content: row.get(3)?,
                    })
                },
            )
            .optional()
    }

    /// Number of chunk rows belonging to a document.
    pub fn count_chunks(&self, doc_id: i64) -> Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE document_id = ?",
            params![doc_id],
            |row| row.get(0),
        )
    }
}
