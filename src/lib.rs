//! # Contextual Retrieval
//!
//! Document question answering over contextualized chunks.
//!
//! Uploaded documents are split into chunks; a chat model writes a short
//! description situating each chunk within the whole document, and that
//! description is prepended to the chunk before it is embedded and
//! full-text indexed. Questions are answered from the reciprocal-rank
//! fusion of full-text and vector search.
//!
//! The pipeline itself lives in `contextual-retrieval-core`; this crate
//! supplies SQLite storage, OpenAI-compatible model adapters, document
//! parsing, the `crag` CLI, and the HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! upload ─▶ parse ─▶ split ─▶ [contextualize ─▶ embed ─▶ store vector] × N ─▶ save chunks
//!
//! query ─┬─▶ full-text search (FTS5) ─┐
//!        └─▶ vector search (cosine) ──┴─▶ RRF (K=60) ─▶ top-k context ─▶ chat ─▶ answer
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | Chunk repository, full-text index, vector index |
//! | [`openai`] | OpenAI-compatible HTTP client |
//! | [`embedding`] | Embedding model adapters |
//! | [`llm`] | Chat model adapters |
//! | [`extract`] | PDF / DOCX / text extraction |
//! | [`service`] | Pipeline wiring and CLI commands |
//! | [`server`] | HTTP API |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod llm;
pub mod migrate;
pub mod openai;
pub mod server;
pub mod service;
pub mod sqlite_store;
