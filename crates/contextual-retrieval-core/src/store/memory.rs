//! In-memory adapters for tests and embedded use.
//!
//! State lives in `Vec`/`HashMap` behind `std::sync::RwLock`. Vector search
//! is brute-force cosine similarity; full-text search counts matching query
//! terms over the document name and the contextualized text.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, Document, RankedItem, RankedList};
use crate::traits::{ChunkRepository, Embedder, LexicalIndex, VectorIndex};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

struct StoredVector {
    id: String,
    text: String,
    vector: Vec<f32>,
}

/// Embedding store that embeds queries with its own [`Embedder`].
pub struct InMemoryVectorIndex {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<StoredVector>>,
}

impl InMemoryVectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored embeddings.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn add(&self, vector: &[f32], text: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        write(&self.entries)?.push(StoredVector {
            id: id.clone(),
            text: text.to_string(),
            vector: vector.to_vec(),
        });
        Ok(id)
    }

    async fn search(&self, query: &str, k: usize) -> Result<RankedList> {
        let query_vec = self.embedder.embed(query).await?;
        let entries = read(&self.entries)?;

        let mut scored: Vec<(f32, &StoredVector)> = entries
            .iter()
            .map(|e| (cosine_similarity(&query_vec, &e.vector), e))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, e)| RankedItem::new(e.id.as_str(), e.text.as_str()))
            .collect())
    }
}

/// Document and chunk store with a naive full-text index.
#[derive(Default)]
pub struct InMemoryChunkStore {
    documents: RwLock<HashMap<String, Document>>,
    chunks: RwLock<Vec<Chunk>>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored documents, in no particular order.
    pub fn documents(&self) -> Result<Vec<Document>> {
        Ok(read(&self.documents)?.values().cloned().collect())
    }

    /// Chunks of one document ordered by `chunk_index`.
    pub fn chunks_for(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let mut chunks: Vec<Chunk> = read(&self.chunks)?
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }
}

#[async_trait]
impl ChunkRepository for InMemoryChunkStore {
    async fn save_all(&self, document: &Document, chunks: &[Chunk]) -> Result<()> {
        let mut documents = write(&self.documents)?;
        let mut stored = write(&self.chunks)?;

        if documents.contains_key(&document.id) {
            bail!("document {} already exists", document.id);
        }

        let mut embedding_ids: HashSet<&str> =
            stored.iter().map(|c| c.embedding_id.as_str()).collect();
        let mut indices = HashSet::new();
        for chunk in chunks {
            if chunk.document_id != document.id {
                bail!(
                    "chunk {} belongs to document {}, not {}",
                    chunk.id,
                    chunk.document_id,
                    document.id
                );
            }
            if !indices.insert(chunk.chunk_index) {
                bail!("duplicate chunk index {}", chunk.chunk_index);
            }
            if !embedding_ids.insert(chunk.embedding_id.as_str()) {
                bail!("embedding id {} already used", chunk.embedding_id);
            }
        }
        drop(embedding_ids);

        documents.insert(document.id.clone(), document.clone());
        stored.extend(chunks.iter().cloned());
        Ok(())
    }
}

#[async_trait]
impl LexicalIndex for InMemoryChunkStore {
    async fn search(&self, query: &str, k: usize) -> Result<RankedList> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(RankedList::default());
        }

        let documents = read(&self.documents)?;
        let chunks = read(&self.chunks)?;

        let mut matches: Vec<(usize, &Chunk)> = chunks
            .iter()
            .filter_map(|c| {
                let name = documents
                    .get(&c.document_id)
                    .map(|d| d.name.as_str())
                    .unwrap_or_default();
                let haystack = format!("{} {}", name, c.contextualized_text).to_lowercase();
                let hits = terms.iter().filter(|t| haystack.contains(*t)).count();
                (hits > 0).then_some((hits, c))
            })
            .collect();
        matches.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(matches
            .into_iter()
            .take(k)
            .map(|(_, c)| RankedItem::new(c.embedding_id.as_str(), c.content.as_str()))
            .collect())
    }
}
