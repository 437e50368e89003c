//! Contextual ingestion pipeline.
//!
//! Coordinates the upload flow: parse → split → per-chunk
//! (contextualize → embed → store embedding) → persist.
//!
//! Per-chunk work runs concurrently, bounded by `max_concurrency`, inside a
//! task group owned by a single [`Ingestor::ingest`] call. Every task
//! carries its chunk index; results land in a slot vector indexed by that
//! index, so completion order never affects the persisted order.
//!
//! Ingestion is all-or-nothing with respect to the chunk repository: if any
//! chunk fails, nothing is saved. Embeddings already added to the vector
//! store by sibling tasks are *not* removed; the error reports how many.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::contextualize::{contextualize_with, DocumentPrompt};
use crate::error::{ChunkStage, Error, Result};
use crate::models::{Chunk, Document, IngestedDocument};
use crate::traits::{ChatCompleter, ChunkRepository, Embedder, Parser, Splitter, VectorIndex};

/// Default number of chunks processed at the same time.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Turns uploaded documents into persisted, contextualized, embedded chunks.
#[derive(Clone)]
pub struct Ingestor {
    parser: Arc<dyn Parser>,
    splitter: Arc<dyn Splitter>,
    chat: Arc<dyn ChatCompleter>,
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorIndex>,
    repository: Arc<dyn ChunkRepository>,
    max_concurrency: usize,
}

impl Ingestor {
    pub fn new(
        parser: Arc<dyn Parser>,
        splitter: Arc<dyn Splitter>,
        chat: Arc<dyn ChatCompleter>,
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorIndex>,
        repository: Arc<dyn ChunkRepository>,
    ) -> Self {
        Self {
            parser,
            splitter,
            chat,
            embedder,
            vectors,
            repository,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Limit how many chunks are processed at once (minimum 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Ingest one document.
    ///
    /// # Errors
    ///
    /// - [`Error::Parse`] before any chunk work starts.
    /// - [`Error::ChunkTask`] if any chunk fails; nothing is persisted.
    /// - [`Error::Persistence`] if the final batch save fails.
    pub async fn ingest(&self, bytes: &[u8], name: &str) -> Result<IngestedDocument> {
        info!(name, bytes = bytes.len(), "uploading document");

        let text = self.parser.parse(bytes).map_err(Error::Parse)?;
        let segments = self.splitter.split(&text);

        let document = Document {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now().timestamp(),
        };
        let prompt = DocumentPrompt::new(&text);
        let added = AtomicUsize::new(0);

        let total = segments.len();
        let mut slots: Vec<Option<Chunk>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        {
            // Tasks must own their segment for the ingest future to be `Send`.
            let tasks: Vec<_> = segments
                .into_iter()
                .enumerate()
                .map(|(index, segment)| self.process_chunk(&document, &prompt, index, segment, &added))
                .collect();
            let mut tasks = stream::iter(tasks).buffer_unordered(self.max_concurrency);

            while let Some(result) = tasks.next().await {
                let chunk = match result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let orphaned = added.load(Ordering::SeqCst);
                        if orphaned > 0 {
                            warn!(
                                name,
                                orphaned, "chunk failed; embeddings already stored are not removed"
                            );
                        }
                        return Err(e);
                    }
                };
                let index = chunk.chunk_index;
                let slot = slots.get_mut(index).ok_or_else(|| {
                    Error::Inconsistent(format!("chunk index {} out of range 0..{}", index, total))
                })?;
                if slot.is_some() {
                    return Err(Error::Inconsistent(format!("chunk {} produced twice", index)));
                }
                *slot = Some(chunk);
            }
        }

        let chunks = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.ok_or_else(|| Error::Inconsistent(format!("chunk {} missing", i))))
            .collect::<Result<Vec<Chunk>>>()?;

        if let Err(source) = self.repository.save_all(&document, &chunks).await {
            warn!(
                name,
                orphaned = chunks.len(),
                "persistence failed; stored embeddings are not removed"
            );
            return Err(Error::Persistence {
                embeddings_added: chunks.len(),
                source,
            });
        }

        info!(name, chunks = chunks.len(), "all chunks processed and saved");
        Ok(IngestedDocument { document, chunks })
    }

    async fn process_chunk(
        &self,
        document: &Document,
        prompt: &DocumentPrompt,
        index: usize,
        content: String,
        added: &AtomicUsize,
    ) -> Result<Chunk> {
        let contextualized = contextualize_with(self.chat.as_ref(), prompt, &content)
            .await
            .map_err(|source| Error::ChunkTask {
                index,
                stage: ChunkStage::Contextualize,
                source,
            })?;

        let vector = self
            .embedder
            .embed(&contextualized)
            .await
            .map_err(|source| Error::ChunkTask {
                index,
                stage: ChunkStage::Embed,
                source,
            })?;

        let embedding_id = self
            .vectors
            .add(&vector, &contextualized)
            .await
            .map_err(|source| Error::ChunkTask {
                index,
                stage: ChunkStage::StoreEmbedding,
                source,
            })?;
        added.fetch_add(1, Ordering::SeqCst);

        debug!(index, embedding_id = %embedding_id, "processed chunk");

        Ok(Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            content,
            contextualized_text: contextualized,
            chunk_index: index,
            embedding_id,
        })
    }
}
