//! Hybrid retrieval by reciprocal-rank fusion.
//!
//! # Algorithm
//!
//! 1. Run full-text search and vector search concurrently, `k = top_k` each.
//! 2. Score each ranked list with [`rank::score`](crate::rank::score).
//! 3. Union the ids; an item's fused score is the sum of its per-source
//!    scores, so an item found by both sources beats one found by a single
//!    source at a comparable rank.
//! 4. When both sources return an item, the vector source's content is kept.
//! 5. Sort by fused score (desc), vector rank (asc), full-text rank (asc),
//!    id (asc); truncate to `top_k`.
//!
//! Scores are computed into an immutable list first and sorted afterwards.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result, SearchSource};
use crate::models::{RankedList, RetrievedChunk};
use crate::rank::{self, RankScore};
use crate::traits::{LexicalIndex, VectorIndex};

/// One fused result: the scored chunk plus where each source ranked it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedChunk {
    /// Embedding id, content, and summed reciprocal-rank score.
    pub chunk: RetrievedChunk,
    /// 1-based rank in the full-text list, if present there.
    pub lexical_rank: Option<usize>,
    /// 1-based rank in the vector list, if present there.
    pub vector_rank: Option<usize>,
}

/// Fuse two ranked lists and keep the best `top_k`.
pub fn fuse(lexical: &RankedList, vector: &RankedList, top_k: usize) -> Vec<FusedChunk> {
    let lexical_scores = rank::score(lexical);
    let vector_scores = rank::score(vector);

    let mut fused = combine(&lexical_scores, &vector_scores);
    info!(
        lexical = lexical_scores.len(),
        vector = vector_scores.len(),
        unique = fused.len(),
        "merged ranked lists"
    );

    fused.sort_by(compare_fused);
    fused.truncate(top_k);
    fused
}

fn combine(
    lexical: &HashMap<String, RankScore>,
    vector: &HashMap<String, RankScore>,
) -> Vec<FusedChunk> {
    let mut fused: Vec<FusedChunk> = Vec::with_capacity(lexical.len() + vector.len());

    for (id, v) in vector {
        let l = lexical.get(id);
        fused.push(FusedChunk {
            chunk: RetrievedChunk {
                id: id.clone(),
                content: v.content.clone(),
                score: v.score + l.map_or(0.0, |l| l.score),
            },
            lexical_rank: l.map(|l| l.rank),
            vector_rank: Some(v.rank),
        });
    }
    for (id, l) in lexical {
        if vector.contains_key(id) {
            continue;
        }
        fused.push(FusedChunk {
            chunk: RetrievedChunk {
                id: id.clone(),
                content: l.content.clone(),
                score: l.score,
            },
            lexical_rank: Some(l.rank),
            vector_rank: None,
        });
    }

    for f in &fused {
        debug!(id = %f.chunk.id, score = f.chunk.score, "merged chunk");
    }
    fused
}

/// Descending score, then the explicit tie-break chain.
fn compare_fused(a: &FusedChunk, b: &FusedChunk) -> Ordering {
    b.chunk
        .score
        .partial_cmp(&a.chunk.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| rank_order(a.vector_rank, b.vector_rank))
        .then_with(|| rank_order(a.lexical_rank, b.lexical_rank))
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

/// Present ranks before absent ones, lower rank first.
fn rank_order(a: Option<usize>, b: Option<usize>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Runs both retrieval sources for a query and fuses their results.
#[derive(Clone)]
pub struct HybridRetriever {
    lexical: Arc<dyn LexicalIndex>,
    vector: Arc<dyn VectorIndex>,
}

impl HybridRetriever {
    pub fn new(lexical: Arc<dyn LexicalIndex>, vector: Arc<dyn VectorIndex>) -> Self {
        Self { lexical, vector }
    }

    /// Fused results with scores, at most `top_k`.
    ///
    /// Both searches must succeed; a failure of either one fails the query.
    pub async fn retrieve_scored(&self, query: &str, top_k: usize) -> Result<Vec<FusedChunk>> {
        info!(query, top_k, "starting hybrid retrieval");

        let lexical = async {
            self.lexical
                .search(query, top_k)
                .await
                .map_err(|source| Error::Retrieval {
                    source_kind: SearchSource::Lexical,
                    source,
                })
        };
        let vector = async {
            self.vector
                .search(query, top_k)
                .await
                .map_err(|source| Error::Retrieval {
                    source_kind: SearchSource::Vector,
                    source,
                })
        };
        let (lexical, vector) = futures::try_join!(lexical, vector)?;

        let fused = fuse(&lexical, &vector, top_k);
        for (i, f) in fused.iter().enumerate() {
            info!(position = i + 1, id = %f.chunk.id, score = f.chunk.score, "top-k chunk");
        }
        Ok(fused)
    }

    /// Fused chunk contents only, best first.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        Ok(self
            .retrieve_scored(query, top_k)
            .await?
            .into_iter()
            .map(|f| f.chunk.content)
            .collect())
    }
}
