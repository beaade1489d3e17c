//! Hybrid retrieval: the four signals run concurrently, then RRF
//!
//! A retriever that errors or exceeds the request timeout degrades to an
//! empty list for its method; fusion proceeds with whatever completed.

use super::{
    dense::DenseRetriever, fuzzy::FuzzyRetriever, pattern::PatternRetriever, sparse::SparseRetriever,
    Method, RankedList, RetrievalQuery, Retriever,
};
use super::fusion::{FusedHit, RRFusion};
use crate::store::RecordStore;
use crate::weights::WeightSet;
use rankforge_common::errors::Result;
use rankforge_common::metrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How one method's retrieval ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodOutcome {
    Completed,
    /// Weight at or below the disable threshold; never queried
    Disabled,
    Failed,
    TimedOut,
}

impl MethodOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodOutcome::Completed => "completed",
            MethodOutcome::Disabled => "disabled",
            MethodOutcome::Failed => "failed",
            MethodOutcome::TimedOut => "timed_out",
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, MethodOutcome::Failed | MethodOutcome::TimedOut)
    }
}

/// Per-method execution report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodReport {
    pub method: Method,
    pub outcome: MethodOutcome,
    pub hits: usize,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Overall request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Complete,
    /// At least one enabled method failed or timed out
    Degraded,
    /// Fused ranking is empty
    NoResults,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::Complete => "complete",
            SearchStatus::Degraded => "degraded",
            SearchStatus::NoResults => "no_results",
        }
    }
}

/// Everything needed to run one hybrid retrieval
#[derive(Debug, Clone, Copy)]
pub struct RetrievalPlan<'a> {
    /// Shared retriever input; `query.limit` is the per-method candidate count
    pub query: RetrievalQuery<'a>,
    pub weights: WeightSet,
    pub rrf_k: u32,
    pub match_count: usize,
    /// Bound on each retriever
    pub timeout: Duration,
}

/// Fused hits plus how each method fared
#[derive(Debug, Clone)]
pub struct HybridOutcome {
    pub hits: Vec<FusedHit>,
    pub reports: Vec<MethodReport>,
    pub status: SearchStatus,
}

/// Runs the four retrievers and fuses their rankings
pub struct HybridRetriever {
    dense: Box<dyn Retriever>,
    sparse: Box<dyn Retriever>,
    pattern: Box<dyn Retriever>,
    fuzzy: Box<dyn Retriever>,
}

impl HybridRetriever {
    /// Standard retrievers over one store
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_retrievers(
            Box::new(DenseRetriever::new(store.clone())),
            Box::new(SparseRetriever::new(store.clone())),
            Box::new(PatternRetriever::new(store.clone())),
            Box::new(FuzzyRetriever::new(store)),
        )
    }

    pub fn with_retrievers(
        dense: Box<dyn Retriever>,
        sparse: Box<dyn Retriever>,
        pattern: Box<dyn Retriever>,
        fuzzy: Box<dyn Retriever>,
    ) -> Self {
        Self {
            dense,
            sparse,
            pattern,
            fuzzy,
        }
    }

    /// Retrieve concurrently and fuse
    pub async fn search(&self, plan: &RetrievalPlan<'_>) -> Result<HybridOutcome> {
        let fusion = RRFusion::new(plan.rrf_k, plan.weights)?;

        let (dense, sparse, pattern, fuzzy) = tokio::join!(
            run(self.dense.as_ref(), plan),
            run(self.sparse.as_ref(), plan),
            run(self.pattern.as_ref(), plan),
            run(self.fuzzy.as_ref(), plan),
        );

        let mut lists = Vec::with_capacity(4);
        let mut reports = Vec::with_capacity(4);
        for (list, report) in [dense, sparse, pattern, fuzzy] {
            lists.push(list);
            reports.push(report);
        }

        let hits = fusion.fuse(&lists, plan.match_count)?;

        let status = if hits.is_empty() {
            SearchStatus::NoResults
        } else if reports.iter().any(|r| r.outcome.is_degraded()) {
            SearchStatus::Degraded
        } else {
            SearchStatus::Complete
        };

        debug!(
            fused = hits.len(),
            status = status.as_str(),
            "Hybrid retrieval finished"
        );

        Ok(HybridOutcome { hits, reports, status })
    }
}

async fn run(retriever: &dyn Retriever, plan: &RetrievalPlan<'_>) -> (RankedList, MethodReport) {
    let method = retriever.method();
    let empty = RankedList {
        method,
        hits: Vec::new(),
    };

    if !plan.weights.is_enabled(method) {
        let report = MethodReport {
            method,
            outcome: MethodOutcome::Disabled,
            hits: 0,
            elapsed_ms: 0,
            error: None,
        };
        return (empty, report);
    }

    let started = Instant::now();
    let result = tokio::time::timeout(plan.timeout, retriever.retrieve(&plan.query)).await;
    let elapsed = started.elapsed();

    let (list, outcome, error) = match result {
        Ok(Ok(hits)) => (RankedList { method, hits }, MethodOutcome::Completed, None),
        Ok(Err(e)) => {
            warn!(method = %method, error = %e, "Retriever failed, continuing without it");
            (empty, MethodOutcome::Failed, Some(e.to_string()))
        }
        Err(_) => {
            warn!(
                method = %method,
                timeout_ms = plan.timeout.as_millis() as u64,
                "Retriever timed out, continuing without it"
            );
            (empty, MethodOutcome::TimedOut, Some("timed out".to_string()))
        }
    };

    metrics::record_retriever(method.as_str(), outcome.as_str(), elapsed.as_secs_f64());

    let report = MethodReport {
        method,
        outcome,
        hits: list.hits.len(),
        elapsed_ms: elapsed.as_millis() as u64,
        error,
    };
    (list, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CompiledFilter;
    use crate::retrieval::MethodHit;
    use rankforge_common::errors::AppError;
    use uuid::Uuid;

    enum Behaviour {
        Hits(Vec<u128>),
        Fail,
        Sleep(Duration),
    }

    struct StubRetriever {
        method: Method,
        behaviour: Behaviour,
    }

    fn stub(method: Method, behaviour: Behaviour) -> Box<dyn Retriever> {
        Box::new(StubRetriever { method, behaviour })
    }

    #[async_trait::async_trait]
    impl Retriever for StubRetriever {
        async fn retrieve(&self, _query: &RetrievalQuery<'_>) -> Result<Vec<MethodHit>> {
            match &self.behaviour {
                Behaviour::Hits(ids) => Ok(ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| MethodHit {
                        record_id: Uuid::from_u128(*id),
                        raw_score: 1.0,
                        rank: i + 1,
                    })
                    .collect()),
                Behaviour::Fail => Err(AppError::Internal {
                    message: "boom".to_string(),
                }),
                Behaviour::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(Vec::new())
                }
            }
        }

        fn method(&self) -> Method {
            self.method
        }
    }

    fn plan<'a>(filter: &'a CompiledFilter, weights: WeightSet) -> RetrievalPlan<'a> {
        RetrievalPlan {
            query: RetrievalQuery {
                text: "query",
                embedding: None,
                filter,
                limit: 20,
                fuzzy_threshold: 0.3,
                min_scores: Default::default(),
            },
            weights,
            rrf_k: 60,
            match_count: 10,
            timeout: Duration::from_millis(50),
        }
    }

    fn outcomes(outcome: &HybridOutcome) -> Vec<MethodOutcome> {
        outcome.reports.iter().map(|r| r.outcome).collect()
    }

    #[tokio::test]
    async fn test_all_methods_complete() {
        let hybrid = HybridRetriever::with_retrievers(
            stub(Method::Dense, Behaviour::Hits(vec![1, 2])),
            stub(Method::Sparse, Behaviour::Hits(vec![2, 3])),
            stub(Method::Pattern, Behaviour::Hits(vec![2])),
            stub(Method::Fuzzy, Behaviour::Hits(vec![])),
        );
        let filter = CompiledFilter::match_all();
        let outcome = hybrid.search(&plan(&filter, WeightSet::BALANCED)).await.unwrap();

        assert_eq!(outcome.status, SearchStatus::Complete);
        assert_eq!(outcome.hits[0].record_id, Uuid::from_u128(2));
        assert!(outcome.reports.iter().all(|r| r.outcome == MethodOutcome::Completed));
    }

    #[tokio::test]
    async fn test_failure_and_timeout_degrade() {
        let hybrid = HybridRetriever::with_retrievers(
            stub(Method::Dense, Behaviour::Fail),
            stub(Method::Sparse, Behaviour::Hits(vec![4])),
            stub(Method::Pattern, Behaviour::Sleep(Duration::from_secs(5))),
            stub(Method::Fuzzy, Behaviour::Hits(vec![4, 5])),
        );
        let filter = CompiledFilter::match_all();
        let outcome = hybrid.search(&plan(&filter, WeightSet::BALANCED)).await.unwrap();

        assert_eq!(outcome.status, SearchStatus::Degraded);
        assert_eq!(
            outcomes(&outcome),
            vec![
                MethodOutcome::Failed,
                MethodOutcome::Completed,
                MethodOutcome::TimedOut,
                MethodOutcome::Completed
            ]
        );
        assert_eq!(outcome.hits.len(), 2);
        assert!(outcome.hits.iter().all(|h| h.method_ranks.dense.is_none()));
    }

    #[tokio::test]
    async fn test_disabled_methods_are_not_queried() {
        // A failing dense retriever with zero weight must not degrade the request
        let hybrid = HybridRetriever::with_retrievers(
            stub(Method::Dense, Behaviour::Fail),
            stub(Method::Sparse, Behaviour::Hits(vec![1])),
            stub(Method::Pattern, Behaviour::Fail),
            stub(Method::Fuzzy, Behaviour::Fail),
        );
        let filter = CompiledFilter::match_all();
        let outcome = hybrid
            .search(&plan(&filter, WeightSet::only(Method::Sparse)))
            .await
            .unwrap();

        assert_eq!(outcome.status, SearchStatus::Complete);
        assert_eq!(
            outcomes(&outcome),
            vec![
                MethodOutcome::Disabled,
                MethodOutcome::Completed,
                MethodOutcome::Disabled,
                MethodOutcome::Disabled
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_ranking_is_not_an_error() {
        let hybrid = HybridRetriever::with_retrievers(
            stub(Method::Dense, Behaviour::Hits(vec![])),
            stub(Method::Sparse, Behaviour::Hits(vec![])),
            stub(Method::Pattern, Behaviour::Hits(vec![])),
            stub(Method::Fuzzy, Behaviour::Hits(vec![])),
        );
        let filter = CompiledFilter::match_all();
        let outcome = hybrid.search(&plan(&filter, WeightSet::BALANCED)).await.unwrap();
        assert_eq!(outcome.status, SearchStatus::NoResults);
        assert!(outcome.hits.is_empty());
    }
}
