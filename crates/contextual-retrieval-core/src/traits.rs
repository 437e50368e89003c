//! Collaborator contracts.
//!
//! The core never talks to a model, a database, or a file directly. Every
//! external system sits behind one of these traits; the application crate
//! provides SQLite- and HTTP-backed implementations, and
//! [`store::memory`](crate::store::memory) provides in-memory ones.
//!
//! | Trait | Operation | Output |
//! |-------|-----------|--------|
//! | [`Parser`] | raw bytes → text | plain text |
//! | [`Splitter`] | text → chunks | ordered chunk texts |
//! | [`ChatCompleter`] | prompt → completion | completion text |
//! | [`Embedder`] | text → vector | fixed-length `Vec<f32>` |
//! | [`VectorIndex`] | add / search | new id / [`RankedList`] |
//! | [`LexicalIndex`] | search | [`RankedList`] |
//! | [`ChunkRepository`] | save_all | `()` |
//!
//! Implementations must be `Send + Sync`: ingestion calls them from many
//! concurrent futures.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, Document, RankedList};

/// Turns raw document bytes into plain text.
pub trait Parser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<String>;
}

/// Splits plain text into an ordered sequence of chunk texts.
pub trait Splitter: Send + Sync {
    fn split(&self, text: &str) -> Vec<String>;
}

/// A chat/completion model.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn chat(&self, prompt: &str) -> Result<String>;
}

/// An embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedding store with similarity search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store `vector` with its `text`, returning a new, corpus-unique id.
    async fn add(&self, vector: &[f32], text: &str) -> Result<String>;

    /// Return at most `k` items most similar to `query`, best first.
    async fn search(&self, query: &str, k: usize) -> Result<RankedList>;
}

/// Full-text index over persisted chunks.
#[async_trait]
pub trait LexicalIndex: Send + Sync {
    /// Return at most `k` items by lexical relevance, best first. Item ids
    /// are embedding identifiers so they line up with [`VectorIndex`] ids.
    async fn search(&self, query: &str, k: usize) -> Result<RankedList>;
}

/// Relational storage for documents and their chunks.
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Persist a document and its full chunk set as one batch.
    async fn save_all(&self, document: &Document, chunks: &[Chunk]) -> Result<()>;
}
