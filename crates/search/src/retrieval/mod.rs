//! Multi-signal retrieval system
//!
//! Provides four independent ranking signals over the filtered candidates:
//! - Dense (cosine similarity of embeddings)
//! - Sparse (BM25 / full-text relevance)
//! - Pattern (case-insensitive substring containment)
//! - Fuzzy (trigram similarity)
//!
//! and their weighted Reciprocal Rank Fusion.

pub(crate) mod dense;
mod fusion;
mod fuzzy;
mod hybrid;
mod pattern;
mod sparse;
pub mod text;

pub use dense::DenseRetriever;
pub use fusion::{FusedHit, MethodValues, RRFusion, DEFAULT_RRF_K, MAX_FUSED_RESULTS};
pub use fuzzy::FuzzyRetriever;
pub use hybrid::{HybridOutcome, HybridRetriever, MethodOutcome, MethodReport, RetrievalPlan, SearchStatus};
pub use pattern::PatternRetriever;
pub use sparse::SparseRetriever;

use crate::filter::CompiledFilter;
use rankforge_common::db::ScoredChunkId;
use rankforge_common::errors::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Retrieval signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Embedding similarity
    Dense,
    /// Lexical relevance
    Sparse,
    /// Substring containment
    Pattern,
    /// Trigram similarity
    Fuzzy,
}

impl Method {
    /// All methods in fusion order
    pub const ALL: [Method; 4] = [Method::Dense, Method::Sparse, Method::Pattern, Method::Fuzzy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Dense => "dense",
            Method::Sparse => "sparse",
            Method::Pattern => "pattern",
            Method::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a single method's ranking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MethodHit {
    pub record_id: Uuid,

    /// Score on the method's native scale
    pub raw_score: f64,

    /// 1-based position in the method's list
    pub rank: usize,
}

/// Ranked output of one method
#[derive(Debug, Clone, PartialEq)]
pub struct RankedList {
    pub method: Method,
    pub hits: Vec<MethodHit>,
}

/// Inputs shared by every retriever for one request
#[derive(Debug, Clone, Copy)]
pub struct RetrievalQuery<'a> {
    pub text: &'a str,
    pub embedding: Option<&'a [f32]>,
    pub filter: &'a CompiledFilter,
    /// Candidates to return per method
    pub limit: usize,
    pub fuzzy_threshold: f64,
    /// Per-method score floors, applied before ranking
    pub min_scores: MethodValues<f64>,
}

impl RetrievalQuery<'_> {
    /// Drop candidates under `method`'s floor, then rank
    pub fn rank(&self, method: Method, mut scored: Vec<ScoredChunkId>) -> Vec<MethodHit> {
        if let Some(floor) = self.min_scores.get(method) {
            scored.retain(|s| s.score >= floor);
        }
        rank_scored(scored, self.limit)
    }
}

/// Common trait for all retrievers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve the method's top candidates, ranked from 1
    async fn retrieve(&self, query: &RetrievalQuery<'_>) -> Result<Vec<MethodHit>>;

    /// Signal this retriever produces
    fn method(&self) -> Method;
}

/// Order by score descending with record id as tiebreak, keep `limit`,
/// and assign ranks starting at 1.
pub fn rank_scored(mut scored: Vec<ScoredChunkId>, limit: usize) -> Vec<MethodHit> {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    scored.truncate(limit);
    scored
        .into_iter()
        .enumerate()
        .map(|(i, s)| MethodHit {
            record_id: s.id,
            raw_score: s.score,
            rank: i + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_scored_breaks_ties_by_id() {
        let scored = vec![
            ScoredChunkId { id: Uuid::from_u128(3), score: 0.5 },
            ScoredChunkId { id: Uuid::from_u128(1), score: 0.5 },
            ScoredChunkId { id: Uuid::from_u128(2), score: 0.9 },
            ScoredChunkId { id: Uuid::from_u128(4), score: 0.1 },
        ];

        let hits = rank_scored(scored, 3);
        let ids: Vec<u128> = hits.iter().map(|h| h.record_id.as_u128()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(hits.iter().map(|h| h.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_floor_drops_candidates_before_ranking() {
        let filter = CompiledFilter::match_all();
        let query = RetrievalQuery {
            text: "q",
            embedding: None,
            filter: &filter,
            limit: 10,
            fuzzy_threshold: 0.3,
            min_scores: MethodValues {
                sparse: Some(0.5),
                ..MethodValues::default()
            },
        };
        let scored = || {
            vec![
                ScoredChunkId { id: Uuid::from_u128(1), score: 0.4 },
                ScoredChunkId { id: Uuid::from_u128(2), score: 0.9 },
                ScoredChunkId { id: Uuid::from_u128(3), score: 0.5 },
            ]
        };

        let sparse = query.rank(Method::Sparse, scored());
        assert_eq!(
            sparse.iter().map(|h| (h.record_id.as_u128(), h.rank)).collect::<Vec<_>>(),
            vec![(2, 1), (3, 2)]
        );

        // No floor for dense
        assert_eq!(query.rank(Method::Dense, scored()).len(), 3);
    }
}
