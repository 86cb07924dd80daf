//! Relational catalog with vector similarity, using SQLite and sqlite-vec.
//!
//! Holds the document and chunk rows for both backends. For the sqlite-vec
//! backend the chunk embeddings live inline in the `vec_chunks` virtual
//! table; for the external-index backend only the metadata rows are kept
//! here and `vec_chunks` stays empty.
use rusqlite::{Connection, Result};
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use tracing::info;

pub mod documents;
pub mod models;
pub mod search;

fn schema_sql(dimensions: usize) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    source_uri TEXT NOT NULL UNIQUE,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_source_uri ON documents(source_uri);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    content TEXT NOT NULL,
    UNIQUE(document_id, position),
    FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_document_id ON chunks(document_id);

CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(
    embedding FLOAT[{dimensions}]
);
"#
    )
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A wrapper around a SQLite connection initialized with sqlite-vec and the
/// application schema.
#[derive(Debug)]
pub struct Db {
    pub(crate) conn: Connection,
}

impl Db {
    /// Open a database connection at the given path and initialize the schema
    /// for the configured embedding dimensionality.
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self> {
        let path = path.as_ref();
        info!("Initializing database: {}", path.display());

        init_sqlite_vec();

        let conn = Connection::open(path)?;
        Self::init(conn, dimensions)
    }

    /// Open an in-memory database connection (useful for testing).
    pub fn open_in_memory(dimensions: usize) -> Result<Self> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        Self::init(conn, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> Result<Self> {
        // Verify sqlite-vec is loaded
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&schema_sql(dimensions))?;

        Ok(Self { conn })
    }
}

/// Helper to serialize a float32 vector into bytes for the vec0 virtual table.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_init() {
        let db = Db::open_in_memory(8).expect("Failed to open in-memory DB");

        let tables: usize = db
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('documents', 'chunks', 'vec_chunks');",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_serialize_vector() {
        let vec = vec![1.0, 2.0, -3.5];
        let bytes = serialize_vector(&vec);
        assert_eq!(bytes.len(), 12);

        // 1.0f32 -> little endian 00 00 80 3f
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x00, 0x40]);
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x60, 0xc0]);
    }
}
