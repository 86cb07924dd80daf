//! # ragpipe — Retrieval Pipeline for RAG Search
//!
//! Ingests documents into a vector store and answers similarity queries,
//! optionally re-ranked by an LLM.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation, and template generation
//! - **[`chunker`]** — Heading-aware splitting into bounded, overlapping chunks
//! - **[`embedder`]** — Text embedding via a remote provider (plus a mock for tests)
//! - **[`db`]** — SQLite + sqlite-vec catalog (documents, chunks, similarity search)
//! - **[`store`]** — Vector store backends behind one trait (local sqlite-vec, Pinecone)
//! - **[`pipeline`]** — Ingestion: chunk, embed, persist with a failure policy
//! - **[`rerank`]** — LLM relevance re-scoring of retrieved candidates
//! - **[`retrieval`]** — Query-side service tying embedder, store, and reranker together

pub mod chunker;
pub mod config;
pub mod db;
pub mod embedder;
pub mod pipeline;
pub mod rerank;
pub mod retrieval;
pub mod store;
