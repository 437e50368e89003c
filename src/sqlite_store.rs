//! SQLite-backed storage for documents, chunks, and embeddings.
//!
//! [`SqliteStore`] implements the chunk repository and the full-text index
//! over the `documents`, `chunks`, and `chunks_fts` tables.
//! [`SqliteVectorIndex`] implements the vector store over `embeddings`,
//! with brute-force cosine similarity computed in Rust.
//!
//! The two share a pool but not a transaction: embeddings are added while
//! chunks are still being processed, and the chunk batch is written once
//! every chunk has succeeded.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use contextual_retrieval_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use contextual_retrieval_core::models::{Chunk, Document, RankedItem, RankedList};
use contextual_retrieval_core::traits::{ChunkRepository, Embedder, LexicalIndex, VectorIndex};

/// A stored document with its chunk count, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    pub chunk_count: i64,
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All documents, newest first.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.name, d.created_at, COUNT(c.id) AS chunk_count
            FROM documents d
            LEFT JOIN chunks c ON c.document_id = d.id
            GROUP BY d.id
            ORDER BY d.created_at DESC, d.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DocumentSummary {
                id: row.get("id"),
                name: row.get("name"),
                created_at: row.get("created_at"),
                chunk_count: row.get("chunk_count"),
            })
            .collect())
    }

    /// Chunks of one document in index order.
    pub async fn document_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, document_id, content, contextualized_text, chunk_index, embedding_id
            FROM chunks
            WHERE document_id = ?
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let index: i64 = row.get("chunk_index");
                Chunk {
                    id: row.get("id"),
                    document_id: row.get("document_id"),
                    content: row.get("content"),
                    contextualized_text: row.get("contextualized_text"),
                    chunk_index: index as usize,
                    embedding_id: row.get("embedding_id"),
                }
            })
            .collect())
    }
}

#[async_trait]
impl ChunkRepository for SqliteStore {
    async fn save_all(&self, document: &Document, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO documents (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&document.id)
            .bind(&document.name)
            .bind(document.created_at)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, content, contextualized_text, chunk_index, embedding_id)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(&chunk.content)
            .bind(&chunk.contextualized_text)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.embedding_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO chunks_fts (embedding_id, name, contextualized_text) VALUES (?, ?, ?)",
            )
            .bind(&chunk.embedding_id)
            .bind(&document.name)
            .bind(&chunk.contextualized_text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl LexicalIndex for SqliteStore {
    async fn search(&self, query: &str, k: usize) -> Result<RankedList> {
        let Some(match_expr) = fts_query(query) else {
            return Ok(RankedList::default());
        };

        // Document name weighs twice the contextualized text; the id column is unweighted.
        let rows = sqlx::query(
            r#"
            SELECT f.embedding_id, c.content
            FROM chunks_fts f
            JOIN chunks c ON c.embedding_id = f.embedding_id
            WHERE chunks_fts MATCH ?
            ORDER BY bm25(chunks_fts, 0.0, 2.0, 1.0), f.rowid
            LIMIT ?
            "#,
        )
        .bind(match_expr)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("embedding_id");
                let content: String = row.get("content");
                RankedItem::new(id, content)
            })
            .collect())
    }
}

/// Build an FTS5 expression matching any query term.
///
/// Each whitespace-separated term is quoted so punctuation and FTS
/// operators in user input are taken literally. Terms without any
/// alphanumeric character would tokenize to nothing and are dropped.
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"", t))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Vector store over the `embeddings` table.
pub struct SqliteVectorIndex {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    /// Number of stored embeddings.
    pub async fn count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn add(&self, vector: &[f32], text: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO embeddings (id, text, vector, dims, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(text)
        .bind(vec_to_blob(vector))
        .bind(vector.len() as i64)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn search(&self, query: &str, k: usize) -> Result<RankedList> {
        let query_vec = self.embedder.embed(query).await?;

        // Fetch all vectors and compute cosine similarity in Rust
        let rows = sqlx::query("SELECT id, text, vector FROM embeddings ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let mut scored: Vec<(f32, String, String)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                (similarity, row.get("id"), row.get("text"))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(_, id, text)| RankedItem::new(id, text))
            .collect())
    }
}
