//! Hybrid search engine
//!
//! Request flow: validate → select weights → compile filter → run the four
//! retrievers concurrently → fuse → hydrate records → optional radius
//! expansion of the fused hits.

use crate::context::{
    ChunkRange, ContextExpander, Expansion, ExpansionSpec, RadiusExpansion, RadiusRequest, RangeExpansion,
};
use crate::filter::{FilterCompiler, MetadataSchema};
use crate::record::{Metadata, Record};
use crate::retrieval::{
    HybridRetriever, Method, MethodReport, MethodValues, RetrievalPlan, RetrievalQuery, SearchStatus,
};
use crate::store::RecordStore;
use crate::weights::{WeightSelector, WeightSet, BALANCED_RULE};
use rankforge_common::config::{ExpansionConfig, SearchConfig};
use rankforge_common::db::CorpusStats;
use rankforge_common::errors::{AppError, Result};
use rankforge_common::metrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Radius expansion of the returned hits
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpandOptions {
    pub radius: Option<u32>,
    pub max_total_tokens: Option<usize>,
}

/// Search request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_text: String,
    #[serde(default)]
    pub query_embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub match_count: Option<usize>,
    /// Filter DSL document
    #[serde(default)]
    pub filter: Option<Value>,
    /// Pinned weights; mutually exclusive with `method`
    #[serde(default)]
    pub weights: Option<WeightSet>,
    /// Single-method mode
    #[serde(default)]
    pub method: Option<Method>,
    #[serde(default)]
    pub rrf_k: Option<u32>,
    #[serde(default)]
    pub fuzzy_threshold: Option<f64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Per-method score floors; candidates below are dropped before fusion
    #[serde(default)]
    pub min_scores: MethodValues<f64>,
    #[serde(default)]
    pub expand: Option<ExpandOptions>,
}

impl SearchRequest {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            ..Self::default()
        }
    }
}

/// One fused, hydrated result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub record_id: Uuid,
    pub doc_id: Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub metadata: Metadata,
    pub method_scores: MethodValues<f64>,
    pub method_ranks: MethodValues<usize>,
    pub fused_score: f64,
    /// 1-based position in the fused ranking
    pub rank: usize,
}

/// Search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub weights: WeightSet,
    pub weight_rule: String,
    pub rrf_k: u32,
    pub fuzzy_threshold: f64,
    pub methods: Vec<MethodReport>,
    pub status: SearchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion: Option<RadiusExpansion>,
    pub query_time_ms: u64,
}

/// Description of one retrieval method
#[derive(Debug, Clone, Serialize)]
pub struct MethodInfo {
    pub method: Method,
    pub description: &'static str,
    pub default_weight: f64,
}

/// One weight rule as exposed to clients
#[derive(Debug, Clone, Serialize)]
pub struct RuleInfo {
    pub name: &'static str,
    pub weights: WeightSet,
    pub fuzzy_threshold: Option<f64>,
}

/// Methods, default weights and rule order
#[derive(Debug, Clone, Serialize)]
pub struct MethodCatalogue {
    pub methods: Vec<MethodInfo>,
    pub rules: Vec<RuleInfo>,
    pub rule_order: Vec<&'static str>,
    pub rrf_k: u32,
    pub fuzzy_threshold: f64,
    pub default_match_count: usize,
    pub max_match_count: usize,
}

/// Hybrid retrieval over a record store
pub struct HybridSearchEngine {
    store: Arc<dyn RecordStore>,
    hybrid: HybridRetriever,
    selector: WeightSelector,
    compiler: FilterCompiler,
    expander: ContextExpander,
    config: SearchConfig,
}

impl HybridSearchEngine {
    /// Build the engine, rejecting inconsistent configuration
    pub fn new(store: Arc<dyn RecordStore>, search: &SearchConfig, expansion: &ExpansionConfig) -> Result<Self> {
        if search.rrf_k < 1 {
            return Err(AppError::Configuration {
                message: "search.rrf_k must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&search.fuzzy_threshold) {
            return Err(AppError::Configuration {
                message: "search.fuzzy_threshold must be within [0, 1]".to_string(),
            });
        }
        if search.oversample_factor < 1 || search.max_match_count < 1 {
            return Err(AppError::Configuration {
                message: "search.oversample_factor and search.max_match_count must be at least 1".to_string(),
            });
        }

        let schema = MetadataSchema::from_config(&search.metadata_schema)?;
        let selector = match &search.weight_rule_order {
            Some(order) => WeightSelector::with_order(order)?,
            None => WeightSelector::default(),
        };

        info!(
            backend = store.backend(),
            rule_order = ?selector.order(),
            schema_fields = search.metadata_schema.len(),
            "Hybrid search engine ready"
        );

        Ok(Self {
            hybrid: HybridRetriever::new(store.clone()),
            expander: ContextExpander::new(store.clone(), expansion.clone()),
            store,
            selector,
            compiler: FilterCompiler::new(schema),
            config: search.clone(),
        })
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run a hybrid search.
    ///
    /// Every validation error is raised before retrieval starts. Failed or
    /// timed-out retrievers only degrade the response.
    #[instrument(skip(self, request), fields(query_len = request.query_text.len()))]
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();

        let query = request.query_text.trim();
        if query.is_empty() {
            return Err(AppError::Validation {
                message: "query_text must not be blank".to_string(),
                field: Some("query_text".to_string()),
            });
        }

        let match_count = request.match_count.unwrap_or(self.config.default_match_count);
        if match_count < 1 || match_count > self.config.max_match_count {
            return Err(AppError::InvalidMatchCount {
                value: match_count,
                max: self.config.max_match_count,
            });
        }

        let rrf_k = request.rrf_k.unwrap_or(self.config.rrf_k);
        if rrf_k < 1 {
            return Err(AppError::InvalidRrfK { value: rrf_k });
        }

        if let Some(threshold) = request.fuzzy_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(AppError::InvalidThreshold { value: threshold });
            }
        }

        for floor in Method::ALL.into_iter().filter_map(|m| request.min_scores.get(m)) {
            if !floor.is_finite() {
                return Err(AppError::InvalidThreshold { value: floor });
            }
        }

        let selection = self.selector.select(query, request.weights, request.method)?;

        if let Some(embedding) = &request.query_embedding {
            if embedding.len() != self.config.embedding_dimension {
                return Err(AppError::DimensionMismatch {
                    expected: self.config.embedding_dimension,
                    actual: embedding.len(),
                });
            }
        }

        let filter = self.compiler.compile_json(request.filter.as_ref())?;

        let expansion_request = request
            .expand
            .map(|options| self.radius_request(Vec::new(), options))
            .transpose()?;

        let fuzzy_threshold = request
            .fuzzy_threshold
            .or(selection.fuzzy_threshold)
            .unwrap_or(self.config.fuzzy_threshold);
        let timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.config.retriever_timeout());

        let plan = RetrievalPlan {
            query: RetrievalQuery {
                text: query,
                embedding: request.query_embedding.as_deref(),
                filter: &filter,
                limit: match_count.saturating_mul(self.config.oversample_factor),
                fuzzy_threshold,
                min_scores: request.min_scores,
            },
            weights: selection.weights,
            rrf_k,
            match_count,
            timeout,
        };

        let outcome = self.hybrid.search(&plan).await?;
        let results = self.hydrate(&outcome.hits).await?;

        let expansion = match expansion_request {
            Some(mut radius) if !results.is_empty() => {
                radius.chunk_ids = results.iter().map(|r| r.record_id).collect();
                match self.expander.expand_radius(&radius).await {
                    Ok(expansion) => Some(expansion),
                    Err(e) => {
                        warn!(error = %e, "Expansion of search results failed");
                        None
                    }
                }
            }
            _ => None,
        };

        let elapsed = started.elapsed();
        metrics::record_weight_rule(selection.rule);
        metrics::record_search(elapsed.as_secs_f64(), outcome.status.as_str(), results.len());

        info!(
            rule = selection.rule,
            rrf_k,
            fuzzy_threshold,
            results = results.len(),
            status = outcome.status.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Search completed"
        );

        Ok(SearchResponse {
            results,
            weights: selection.weights,
            weight_rule: selection.rule.to_string(),
            rrf_k,
            fuzzy_threshold,
            methods: outcome.reports,
            status: outcome.status,
            expansion,
            query_time_ms: elapsed.as_millis() as u64,
        })
    }

    async fn hydrate(&self, hits: &[crate::retrieval::FusedHit]) -> Result<Vec<SearchResult>> {
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = hits.iter().map(|h| h.record_id).collect();
        let mut records: HashMap<Uuid, Record> = self
            .store
            .fetch(&ids)
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(record) = records.remove(&hit.record_id) else {
                warn!(record_id = %hit.record_id, "Fused hit vanished before hydration");
                continue;
            };
            results.push(SearchResult {
                record_id: record.id,
                doc_id: record.doc_id,
                chunk_index: record.chunk_index,
                content: record.content,
                metadata: record.metadata,
                method_scores: hit.method_scores,
                method_ranks: hit.method_ranks,
                fused_score: hit.fused_score,
                rank: results.len() + 1,
            });
        }
        Ok(results)
    }

    fn radius_request(&self, chunk_ids: Vec<Uuid>, options: ExpandOptions) -> Result<RadiusRequest> {
        let defaults = self.expander.config();
        let request = RadiusRequest {
            chunk_ids,
            radius: options.radius.unwrap_or(defaults.default_radius),
            max_total_tokens: options.max_total_tokens.unwrap_or(defaults.max_total_tokens),
        };
        if request.radius > defaults.max_radius {
            return Err(AppError::Validation {
                message: format!(
                    "expansion radius {} exceeds the maximum of {}",
                    request.radius, defaults.max_radius
                ),
                field: Some("expansion_radius".to_string()),
            });
        }
        if request.max_total_tokens < 1 {
            return Err(AppError::Validation {
                message: "max_total_tokens must be at least 1".to_string(),
                field: Some("max_total_tokens".to_string()),
            });
        }
        Ok(request)
    }

    pub async fn expand(&self, spec: &ExpansionSpec) -> Result<Expansion> {
        self.expander.expand(spec).await
    }

    pub async fn expand_radius(&self, request: &RadiusRequest) -> Result<RadiusExpansion> {
        self.expander.expand_radius(request).await
    }

    pub async fn chunks_by_ranges(&self, ranges: &[ChunkRange]) -> Result<RangeExpansion> {
        self.expander.chunks_by_ranges(ranges).await
    }

    pub async fn stats(&self) -> Result<CorpusStats> {
        self.store.stats().await
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Methods, default weights and the active rule order
    pub fn methods(&self) -> MethodCatalogue {
        let defaults = WeightSet::BALANCED;
        let methods = Method::ALL
            .into_iter()
            .map(|method| MethodInfo {
                method,
                description: match method {
                    Method::Dense => "Cosine similarity between query and chunk embeddings",
                    Method::Sparse => "BM25 / full-text relevance of query terms",
                    Method::Pattern => "Case-insensitive substring containment",
                    Method::Fuzzy => "Trigram similarity, tolerant to typos",
                },
                default_weight: defaults.get(method),
            })
            .collect();

        let mut rules: Vec<RuleInfo> = self
            .selector
            .rules()
            .iter()
            .map(|rule| RuleInfo {
                name: rule.name,
                weights: rule.weights,
                fuzzy_threshold: rule.fuzzy_threshold,
            })
            .collect();
        rules.push(RuleInfo {
            name: BALANCED_RULE,
            weights: defaults,
            fuzzy_threshold: None,
        });

        MethodCatalogue {
            methods,
            rules,
            rule_order: self.selector.order(),
            rrf_k: self.config.rrf_k,
            fuzzy_threshold: self.config.fuzzy_threshold,
            default_match_count: self.config.default_match_count,
            max_match_count: self.config.max_match_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::MethodOutcome;
    use crate::store::InMemoryRecordStore;
    use crate::testing::{doc_id, fixture_store, record_id, FIXTURE_DIMENSION};
    use rankforge_common::errors::ErrorCode;
    use serde_json::json;

    fn engine() -> HybridSearchEngine {
        let search = SearchConfig {
            embedding_dimension: FIXTURE_DIMENSION,
            ..SearchConfig::default()
        };
        HybridSearchEngine::new(fixture_store(), &search, &ExpansionConfig::default()).unwrap()
    }

    fn ids(response: &SearchResponse) -> Vec<Uuid> {
        response.results.iter().map(|r| r.record_id).collect()
    }

    #[tokio::test]
    async fn test_single_method_search() {
        let request = SearchRequest {
            method: Some(Method::Pattern),
            ..SearchRequest::new("annual report")
        };
        let response = engine().search(request).await.unwrap();

        assert_eq!(ids(&response), vec![record_id(5), record_id(6)]);
        assert_eq!(response.weight_rule, "method_only");
        assert_eq!(response.status, SearchStatus::Complete);
        assert_eq!(response.results[1].rank, 2);
        assert!(response.results[0].method_scores.pattern.is_some());
        assert!(response.results[0].method_scores.dense.is_none());
    }

    #[tokio::test]
    async fn test_missing_embedding_degrades() {
        let response = engine()
            .search(SearchRequest::new("transformer attention mechanism"))
            .await
            .unwrap();

        assert_eq!(response.weight_rule, "balanced");
        assert_eq!(response.status, SearchStatus::Degraded);
        assert_eq!(response.methods[0].outcome, MethodOutcome::Failed);
        assert_eq!(response.results.first().map(|r| r.record_id), Some(record_id(1)));
    }

    #[tokio::test]
    async fn test_full_hybrid_search_completes() {
        let request = SearchRequest {
            query_embedding: Some(vec![1.0, 0.0, 0.0]),
            match_count: Some(3),
            ..SearchRequest::new("transformer attention mechanism")
        };
        let response = engine().search(request).await.unwrap();

        assert_eq!(response.status, SearchStatus::Complete);
        assert_eq!(response.results.len(), 3);
        assert_eq!(response.results[0].record_id, record_id(1));
        assert!(response
            .results
            .windows(2)
            .all(|w| w[0].fused_score >= w[1].fused_score));
    }

    #[tokio::test]
    async fn test_short_query_uses_rule_threshold() {
        let response = engine().search(SearchRequest::new("revenue")).await.unwrap();
        assert_eq!(response.weight_rule, "short_query");
        assert_eq!(response.fuzzy_threshold, 0.2);

        let request = SearchRequest {
            fuzzy_threshold: Some(0.5),
            ..SearchRequest::new("revenue")
        };
        let response = engine().search(request).await.unwrap();
        assert_eq!(response.fuzzy_threshold, 0.5);
    }

    #[tokio::test]
    async fn test_filter_restricts_every_method() {
        let request = SearchRequest {
            filter: Some(json!({ "category": "finance" })),
            query_embedding: Some(vec![1.0, 0.0, 0.0]),
            ..SearchRequest::new("annual report")
        };
        let response = engine().search(request).await.unwrap();
        assert!(!response.results.is_empty());
        assert!(response
            .results
            .iter()
            .all(|r| r.metadata.get("category") == Some(&json!("finance"))));
    }

    #[tokio::test]
    async fn test_quoted_query_finds_exact_phrase() {
        let response = engine()
            .search(SearchRequest::new("\"annual report\""))
            .await
            .unwrap();

        assert_eq!(response.weight_rule, "exact_match");
        let pattern = response
            .methods
            .iter()
            .find(|r| r.method == Method::Pattern)
            .unwrap();
        assert_eq!(pattern.outcome, MethodOutcome::Completed);
        assert_eq!(pattern.hits, 2);

        let found = ids(&response);
        assert!(found.contains(&record_id(5)));
        assert!(found.contains(&record_id(6)));
        assert!(response
            .results
            .iter()
            .filter(|r| r.record_id == record_id(5) || r.record_id == record_id(6))
            .all(|r| r.method_ranks.pattern.is_some()));
    }

    #[tokio::test]
    async fn test_empty_filter_shapes_match_no_filter() {
        let engine = engine();
        let request = |filter: Option<Value>| SearchRequest {
            filter,
            query_embedding: Some(vec![0.5, 0.5, 0.0]),
            ..SearchRequest::new("annual report revenue")
        };

        let baseline = ids(&engine.search(request(None)).await.unwrap());
        assert!(!baseline.is_empty());
        for filter in [Value::Null, json!({}), json!([])] {
            let response = engine.search(request(Some(filter.clone()))).await.unwrap();
            assert_eq!(ids(&response), baseline, "filter {filter} changed the ranking");
        }
    }

    #[tokio::test]
    async fn test_score_floors_drop_candidates() {
        let engine = engine();
        let request = SearchRequest {
            method: Some(Method::Dense),
            query_embedding: Some(vec![1.0, 0.0, 0.0]),
            ..SearchRequest::new("anything")
        };
        let unfloored = engine.search(request.clone()).await.unwrap();
        assert_eq!(unfloored.results.len(), 6);

        let floored = engine
            .search(SearchRequest {
                min_scores: MethodValues {
                    dense: Some(0.8),
                    ..MethodValues::default()
                },
                ..request
            })
            .await
            .unwrap();
        // Only records 1 and 2 are within cosine 0.8 of the x axis
        assert_eq!(ids(&floored), vec![record_id(1), record_id(2)]);
        assert!(floored
            .results
            .iter()
            .all(|r| r.method_scores.dense.is_some_and(|s| s >= 0.8)));

        let err = engine
            .search(SearchRequest {
                min_scores: MethodValues {
                    sparse: Some(f64::NAN),
                    ..MethodValues::default()
                },
                ..SearchRequest::new("q")
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidThreshold);
    }

    #[tokio::test]
    async fn test_slow_store_scan_times_out() {
        let records = (0..5_000u128).map(|i| {
            Record::new(
                Uuid::from_u128(10_000 + i),
                doc_id(10 + i / 100),
                (i % 100) as i32,
                format!("Chunk {i} covers quarterly revenue forecasts, attention layers and subsidiary accounts"),
            )
        });
        let store = InMemoryRecordStore::from_records(FIXTURE_DIMENSION, records).unwrap();
        let search = SearchConfig {
            embedding_dimension: FIXTURE_DIMENSION,
            ..SearchConfig::default()
        };
        let engine = HybridSearchEngine::new(Arc::new(store), &search, &ExpansionConfig::default()).unwrap();

        let request = SearchRequest {
            method: Some(Method::Fuzzy),
            timeout_ms: Some(1),
            ..SearchRequest::new("quarterly revenu forecast")
        };
        let response = engine.search(request).await.unwrap();

        let fuzzy = response.methods.iter().find(|r| r.method == Method::Fuzzy).unwrap();
        assert_eq!(fuzzy.outcome, MethodOutcome::TimedOut);
        assert_eq!(response.status, SearchStatus::NoResults);
    }

    #[tokio::test]
    async fn test_no_results_is_not_an_error() {
        let request = SearchRequest {
            method: Some(Method::Pattern),
            ..SearchRequest::new("zzqqxx")
        };
        let response = engine().search(request).await.unwrap();
        assert_eq!(response.status, SearchStatus::NoResults);
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_expansion_of_results() {
        let request = SearchRequest {
            method: Some(Method::Pattern),
            expand: Some(ExpandOptions {
                radius: Some(1),
                max_total_tokens: None,
            }),
            ..SearchRequest::new("annual report")
        };
        let response = engine().search(request).await.unwrap();
        let expansion = response.expansion.unwrap();
        let indexes: Vec<i32> = expansion.chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(!expansion.chunks[2].is_original);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let engine = engine();

        let cases: Vec<(SearchRequest, ErrorCode)> = vec![
            (SearchRequest::new("   "), ErrorCode::ValidationError),
            (
                SearchRequest {
                    match_count: Some(0),
                    ..SearchRequest::new("q")
                },
                ErrorCode::InvalidMatchCount,
            ),
            (
                SearchRequest {
                    match_count: Some(101),
                    ..SearchRequest::new("q")
                },
                ErrorCode::InvalidMatchCount,
            ),
            (
                SearchRequest {
                    rrf_k: Some(0),
                    ..SearchRequest::new("q")
                },
                ErrorCode::InvalidRrfK,
            ),
            (
                SearchRequest {
                    fuzzy_threshold: Some(1.5),
                    ..SearchRequest::new("q")
                },
                ErrorCode::InvalidThreshold,
            ),
            (
                SearchRequest {
                    weights: Some(WeightSet::BALANCED),
                    method: Some(Method::Dense),
                    ..SearchRequest::new("q")
                },
                ErrorCode::ValidationError,
            ),
            (
                SearchRequest {
                    weights: Some(WeightSet {
                        dense: 0.9,
                        sparse: 0.9,
                        pattern: 0.0,
                        fuzzy: 0.0,
                    }),
                    ..SearchRequest::new("q")
                },
                ErrorCode::InvalidWeights,
            ),
            (
                SearchRequest {
                    query_embedding: Some(vec![1.0, 0.0]),
                    ..SearchRequest::new("q")
                },
                ErrorCode::DimensionMismatch,
            ),
            (
                SearchRequest {
                    filter: Some(json!({ "category": { "operator": ">", "value": "ml" } })),
                    ..SearchRequest::new("q")
                },
                ErrorCode::InvalidOperator,
            ),
            (
                SearchRequest {
                    expand: Some(ExpandOptions {
                        radius: Some(50),
                        max_total_tokens: None,
                    }),
                    ..SearchRequest::new("q")
                },
                ErrorCode::ValidationError,
            ),
        ];

        for (request, expected) in cases {
            let err = engine.search(request.clone()).await.unwrap_err();
            assert_eq!(err.code(), expected, "unexpected error {err:?} for {request:?}");
        }
    }

    #[test]
    fn test_bad_configuration_is_rejected() {
        let search = SearchConfig {
            weight_rule_order: Some(vec!["unknown_rule".to_string()]),
            ..SearchConfig::default()
        };
        assert!(HybridSearchEngine::new(fixture_store(), &search, &ExpansionConfig::default()).is_err());

        let search = SearchConfig {
            metadata_schema: HashMap::from([("year".to_string(), "integer-ish".to_string())]),
            ..SearchConfig::default()
        };
        assert!(HybridSearchEngine::new(fixture_store(), &search, &ExpansionConfig::default()).is_err());
    }

    #[test]
    fn test_method_catalogue() {
        let catalogue = engine().methods();
        assert_eq!(catalogue.methods.len(), 4);
        assert_eq!(catalogue.rule_order.first(), Some(&"exact_match"));
        assert_eq!(catalogue.rule_order.last(), Some(&"balanced"));
        let sum: f64 = catalogue.methods.iter().map(|m| m.default_weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
