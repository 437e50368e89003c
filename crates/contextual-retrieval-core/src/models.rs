//! Core data models used throughout Contextual Retrieval.
//!
//! [`Document`] and [`Chunk`] are produced by ingestion and persisted for
//! the lifetime of the corpus. [`RankedList`] and [`RetrievedChunk`] exist
//! only while a single query is being answered.

use serde::Serialize;

/// An uploaded document. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Document UUID.
    pub id: String,
    /// Display name supplied by the uploader.
    pub name: String,
    /// Upload time (unix seconds).
    pub created_at: i64,
}

/// A contiguous slice of a document's text, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Chunk UUID.
    pub id: String,
    /// Owning document UUID.
    pub document_id: String,
    /// Raw text as produced by the splitter.
    pub content: String,
    /// Situating summary, a blank line, then the raw text.
    pub contextualized_text: String,
    /// Zero-based position in split order.
    pub chunk_index: usize,
    /// Key under which the chunk's embedding lives in the vector store.
    pub embedding_id: String,
}

/// One entry of a [`RankedList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedItem {
    /// Embedding identifier of the chunk.
    pub id: String,
    /// Text returned by the source.
    pub content: String,
}

impl RankedItem {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// Results of a single retrieval source, best first. Rank 1 is `items[0]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankedList {
    pub items: Vec<RankedItem>,
}

impl RankedList {
    pub fn new(items: Vec<RankedItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankedItem> {
        self.items.iter()
    }
}

impl FromIterator<RankedItem> for RankedList {
    fn from_iter<I: IntoIterator<Item = RankedItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Chunk content paired with a query-time relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub content: String,
    /// Non-negative relevance score.
    pub score: f64,
}

/// Result of ingesting one document.
#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub document: Document,
    /// Chunks in index order.
    pub chunks: Vec<Chunk>,
}
