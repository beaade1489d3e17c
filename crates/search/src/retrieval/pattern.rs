//! Pattern retrieval by case-insensitive substring containment

use super::{Method, MethodHit, RetrievalQuery, Retriever};
use crate::store::RecordStore;
use crate::weights::quoted_phrases;
use rankforge_common::db::ScoredChunkId;
use rankforge_common::errors::Result;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Substring retriever; only records containing the query (or one of its
/// quoted phrases) are returned
pub struct PatternRetriever {
    store: Arc<dyn RecordStore>,
}

impl PatternRetriever {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Retriever for PatternRetriever {
    /// Quoted phrases are matched on their own, without the quotes, and a
    /// record's scores across phrases add up.
    async fn retrieve(&self, query: &RetrievalQuery<'_>) -> Result<Vec<MethodHit>> {
        let phrases = quoted_phrases(query.text);
        let needles = if phrases.is_empty() {
            vec![query.text.trim()]
        } else {
            phrases
        };

        let mut totals: HashMap<Uuid, f64> = HashMap::new();
        for needle in needles.into_iter().filter(|n| !n.is_empty()) {
            for hit in self.store.substring(needle, query.filter, query.limit).await? {
                *totals.entry(hit.id).or_default() += hit.score;
            }
        }

        let scored = totals
            .into_iter()
            .map(|(id, score)| ScoredChunkId { id, score })
            .collect();
        Ok(query.rank(self.method(), scored))
    }

    fn method(&self) -> Method {
        Method::Pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CompiledFilter;
    use crate::testing::{fixture_store, record_id};

    #[tokio::test]
    async fn test_denser_matches_rank_first() {
        let retriever = PatternRetriever::new(fixture_store());
        let filter = CompiledFilter::match_all();
        let query = RetrievalQuery {
            text: "Annual Report",
            embedding: None,
            filter: &filter,
            limit: 10,
            fuzzy_threshold: 0.3,
            min_scores: Default::default(),
        };
        let hits = retriever.retrieve(&query).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.record_id).collect();
        assert_eq!(ids, vec![record_id(5), record_id(6)]);
    }

    #[tokio::test]
    async fn test_quoted_phrases_are_matched_without_quotes() {
        let retriever = PatternRetriever::new(fixture_store());
        let filter = CompiledFilter::match_all();
        let query = RetrievalQuery {
            text: "\"annual report\"",
            embedding: None,
            filter: &filter,
            limit: 10,
            fuzzy_threshold: 0.3,
            min_scores: Default::default(),
        };
        let hits = retriever.retrieve(&query).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.record_id).collect();
        assert_eq!(ids, vec![record_id(5), record_id(6)]);

        // Each phrase contributes; record 7 only matches the second one
        let query = RetrievalQuery {
            text: "\"annual report\" and \"eleven percent\"",
            ..query
        };
        let hits = retriever.retrieve(&query).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.record_id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&record_id(7)));
    }

    #[tokio::test]
    async fn test_floor_removes_weak_matches() {
        let retriever = PatternRetriever::new(fixture_store());
        let filter = CompiledFilter::match_all();
        let query = RetrievalQuery {
            text: "annual report",
            embedding: None,
            filter: &filter,
            limit: 10,
            fuzzy_threshold: 0.3,
            min_scores: crate::retrieval::MethodValues {
                pattern: Some(50.0),
                ..Default::default()
            },
        };
        let hits = retriever.retrieve(&query).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.record_id).collect();
        assert_eq!(ids, vec![record_id(5)]);
    }
}
