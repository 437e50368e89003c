//! # Contextual Retrieval Core
//!
//! Shared, runtime-agnostic logic for Contextual Retrieval: data models,
//! collaborator traits, the contextual ingestion pipeline, reciprocal-rank
//! scoring, hybrid fusion, and answer composition.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Every external system (parser, splitter, chat model, embedding model,
//! vector store, full-text index, chunk repository) is reached through the
//! traits in [`traits`]; the application crate supplies the implementations.
//!
//! ## Data flow
//!
//! ```text
//! ingest:  bytes ─▶ Parser ─▶ Splitter ─▶ [contextualize ─▶ embed ─▶ VectorIndex::add] × N ─▶ ChunkRepository::save_all
//! answer:  query ─▶ {LexicalIndex::search ∥ VectorIndex::search} ─▶ rank::score × 2 ─▶ fuse ─▶ ChatCompleter::chat
//! ```

pub mod answer;
pub mod chunk;
pub mod contextualize;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod ingest;
pub mod models;
pub mod rank;
pub mod store;
pub mod traits;

pub use error::{Error, Result};
