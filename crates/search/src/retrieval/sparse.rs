//! Sparse (lexical) retrieval

use super::{Method, MethodHit, RetrievalQuery, Retriever};
use crate::store::RecordStore;
use rankforge_common::errors::Result;
use std::sync::Arc;

/// Lexical retriever: BM25 in memory, `ts_rank_cd` on Postgres
pub struct SparseRetriever {
    store: Arc<dyn RecordStore>,
}

impl SparseRetriever {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Retriever for SparseRetriever {
    async fn retrieve(&self, query: &RetrievalQuery<'_>) -> Result<Vec<MethodHit>> {
        let scored = self.store.lexical(query.text, query.filter, query.limit).await?;
        Ok(query.rank(self.method(), scored))
    }

    fn method(&self) -> Method {
        Method::Sparse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CompiledFilter;
    use crate::testing::{fixture_store, record_id};

    #[tokio::test]
    async fn test_rarer_terms_rank_higher() {
        let retriever = SparseRetriever::new(fixture_store());
        let filter = CompiledFilter::match_all();
        let query = RetrievalQuery {
            text: "transformer attention",
            embedding: None,
            filter: &filter,
            limit: 10,
            fuzzy_threshold: 0.3,
            min_scores: Default::default(),
        };
        let hits = retriever.retrieve(&query).await.unwrap();
        assert_eq!(hits.first().map(|h| h.record_id), Some(record_id(1)));
        assert!(hits.iter().all(|h| h.raw_score > 0.0));
    }
}
