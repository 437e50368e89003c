//! Storage adapters that need no external system.
//!
//! The traits themselves live in [`traits`](crate::traits); the
//! application crate supplies the SQLite-backed implementations.

pub mod memory;

pub use memory::{InMemoryChunkStore, InMemoryVectorIndex};
