//! Reciprocal-rank scoring.
//!
//! Converts one source's [`RankedList`] into per-item partial scores:
//! the item at 1-based rank `r` scores `1 / (r + K)` with `K = 60`.
//! Only list position matters; the source's own scores are ignored.

use std::collections::HashMap;

use crate::models::RankedList;

/// Smoothing constant damping the advantage of top ranks.
pub const RRF_K: f64 = 60.0;

/// Partial score of one item in one source.
#[derive(Debug, Clone, PartialEq)]
pub struct RankScore {
    /// 1-based position in the source list.
    pub rank: usize,
    pub score: f64,
    pub content: String,
}

/// Reciprocal-rank score for a 1-based rank.
pub fn reciprocal_rank(rank: usize) -> f64 {
    1.0 / (rank as f64 + RRF_K)
}

/// Score every item of `list` by its position.
///
/// Items absent from the list get no entry. If an id appears more than
/// once, the first occurrence keeps its rank and later duplicates neither
/// score nor consume a rank.
pub fn score(list: &RankedList) -> HashMap<String, RankScore> {
    let mut scores = HashMap::with_capacity(list.len());
    let mut rank = 0usize;
    for item in list.iter() {
        if scores.contains_key(&item.id) {
            continue;
        }
        rank += 1;
        scores.insert(
            item.id.clone(),
            RankScore {
                rank,
                score: reciprocal_rank(rank),
                content: item.content.clone(),
            },
        );
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RankedItem;

    fn list(ids: &[&str]) -> RankedList {
        ids.iter()
            .map(|id| RankedItem::new(*id, format!("text of {}", id)))
            .collect()
    }

    #[test]
    fn test_scores_follow_list_position() {
        let scores = score(&list(&["a", "b", "c"]));
        assert_eq!(scores.len(), 3);
        assert!((scores["a"].score - 1.0 / 61.0).abs() < 1e-12);
        assert!((scores["b"].score - 1.0 / 62.0).abs() < 1e-12);
        assert!((scores["c"].score - 1.0 / 63.0).abs() < 1e-12);
        assert_eq!(scores["c"].rank, 3);
        assert_eq!(scores["b"].content, "text of b");
    }

    #[test]
    fn test_empty_list_has_no_entries() {
        assert!(score(&RankedList::default()).is_empty());
    }

    #[test]
    fn test_absent_items_have_no_entry() {
        let scores = score(&list(&["a"]));
        assert!(!scores.contains_key("z"));
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let l = list(&["x", "y", "z", "w"]);
        assert_eq!(score(&l), score(&l));
    }

    #[test]
    fn test_duplicate_ids_keep_first_rank() {
        let scores = score(&list(&["a", "b", "a", "c"]));
        assert_eq!(scores.len(), 3);
        assert_eq!(scores["a"].rank, 1);
        assert_eq!(scores["b"].rank, 2);
        assert_eq!(scores["c"].rank, 3);
    }

    #[test]
    fn test_scores_strictly_decrease() {
        let scores = score(&list(&["a", "b", "c", "d", "e"]));
        let mut by_rank: Vec<&RankScore> = scores.values().collect();
        by_rank.sort_by_key(|s| s.rank);
        for pair in by_rank.windows(2) {
            assert!(pair[0].score > pair[1].score);
        }
    }
}
