//! Error taxonomy for ingestion and question answering.
//!
//! Collaborators report failures as [`anyhow::Error`]; the orchestrating
//! components wrap them into [`Error`] so callers can tell which stage
//! failed and what side effects may have been left behind.

use std::fmt;

use thiserror::Error;

/// Step of the per-chunk ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStage {
    Contextualize,
    Embed,
    StoreEmbedding,
}

impl fmt::Display for ChunkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkStage::Contextualize => write!(f, "contextualization"),
            ChunkStage::Embed => write!(f, "embedding"),
            ChunkStage::StoreEmbedding => write!(f, "embedding store add"),
        }
    }
}

/// Retrieval source that produced a ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSource {
    Lexical,
    Vector,
}

impl fmt::Display for SearchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchSource::Lexical => write!(f, "full-text"),
            SearchSource::Vector => write!(f, "vector"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The document bytes could not be turned into text.
    #[error("failed to parse document: {0:#}")]
    Parse(#[source] anyhow::Error),

    /// One per-chunk task failed; the whole ingestion is aborted.
    #[error("chunk {index} failed during {stage}: {source:#}")]
    ChunkTask {
        index: usize,
        stage: ChunkStage,
        #[source]
        source: anyhow::Error,
    },

    /// Saving the chunk set failed after every embedding was stored.
    #[error("failed to persist chunks ({embeddings_added} embeddings left in the vector store): {source:#}")]
    Persistence {
        embeddings_added: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Lexical or vector search failed for a query.
    #[error("{source_kind} search failed: {source:#}")]
    Retrieval {
        source_kind: SearchSource,
        #[source]
        source: anyhow::Error,
    },

    /// The answer completion call failed.
    #[error("completion failed: {0:#}")]
    Completion(#[source] anyhow::Error),

    /// An internal invariant did not hold.
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_task_message_names_stage_and_index() {
        let err = Error::ChunkTask {
            index: 3,
            stage: ChunkStage::Embed,
            source: anyhow::anyhow!("rate limited"),
        };
        assert_eq!(err.to_string(), "chunk 3 failed during embedding: rate limited");
    }

    #[test]
    fn test_retrieval_message_names_source() {
        let err = Error::Retrieval {
            source_kind: SearchSource::Lexical,
            source: anyhow::anyhow!("fts5: syntax error"),
        };
        assert!(err.to_string().starts_with("full-text search failed"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
