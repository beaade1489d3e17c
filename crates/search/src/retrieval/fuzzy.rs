//! Fuzzy retrieval by trigram similarity

use super::{Method, MethodHit, RetrievalQuery, Retriever};
use crate::store::RecordStore;
use rankforge_common::errors::Result;
use std::sync::Arc;

/// Trigram retriever; records under the similarity floor are excluded
pub struct FuzzyRetriever {
    store: Arc<dyn RecordStore>,
}

impl FuzzyRetriever {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Retriever for FuzzyRetriever {
    async fn retrieve(&self, query: &RetrievalQuery<'_>) -> Result<Vec<MethodHit>> {
        let scored = self
            .store
            .trigram(query.text, query.fuzzy_threshold, query.filter, query.limit)
            .await?;
        Ok(query.rank(self.method(), scored))
    }

    fn method(&self) -> Method {
        Method::Fuzzy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CompiledFilter;
    use crate::testing::{fixture_store, record_id};

    #[tokio::test]
    async fn test_threshold_controls_recall() {
        let retriever = FuzzyRetriever::new(fixture_store());
        let filter = CompiledFilter::match_all();
        let mut query = RetrievalQuery {
            text: "atention mechanism",
            embedding: None,
            filter: &filter,
            limit: 10,
            fuzzy_threshold: 0.3,
            min_scores: Default::default(),
        };
        let strict = retriever.retrieve(&query).await.unwrap();
        assert_eq!(strict.first().map(|h| h.record_id), Some(record_id(1)));

        query.fuzzy_threshold = 0.0;
        let loose = retriever.retrieve(&query).await.unwrap();
        assert!(loose.len() >= strict.len());
    }
}
