//! Search handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};
use validator::Validate;

use super::validation_error;
use crate::AppState;
use rankforge_common::{
    cache::keys,
    db::CorpusStats,
    errors::Result,
    metrics,
    Embedder,
};
use rankforge_search::{
    ExpandOptions, Method, MethodCatalogue, MethodValues, SearchRequest, SearchResponse, SearchStatus, WeightSet,
};

/// Search request body
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SearchBody {
    #[serde(alias = "query")]
    #[validate(length(min = 1, max = 1000))]
    pub query_text: String,

    #[serde(default)]
    pub query_embedding: Option<Vec<f32>>,

    #[serde(default)]
    pub match_count: Option<usize>,

    #[serde(default)]
    pub filter: Option<Value>,

    #[serde(default)]
    pub weights: Option<WeightSet>,

    #[serde(default)]
    pub method: Option<Method>,

    #[serde(default)]
    pub rrf_k: Option<u32>,

    #[serde(default)]
    pub fuzzy_threshold: Option<f64>,

    #[serde(default)]
    #[validate(range(min = 1, max = 60000))]
    pub timeout_ms: Option<u64>,

    /// Score floors on each method's native scale
    #[serde(default)]
    pub min_dense_score: Option<f64>,
    #[serde(default)]
    pub min_sparse_score: Option<f64>,
    #[serde(default)]
    pub min_pattern_score: Option<f64>,
    #[serde(default)]
    pub min_fuzzy_score: Option<f64>,

    #[serde(default)]
    pub expand: Option<ExpandOptions>,
}

impl From<SearchBody> for SearchRequest {
    fn from(body: SearchBody) -> Self {
        Self {
            query_text: body.query_text.trim().to_string(),
            query_embedding: body.query_embedding,
            match_count: body.match_count,
            filter: body.filter,
            weights: body.weights,
            method: body.method,
            rrf_k: body.rrf_k,
            fuzzy_threshold: body.fuzzy_threshold,
            timeout_ms: body.timeout_ms,
            min_scores: MethodValues {
                dense: body.min_dense_score,
                sparse: body.min_sparse_score,
                pattern: body.min_pattern_score,
                fuzzy: body.min_fuzzy_score,
            },
            expand: body.expand,
        }
    }
}

/// Corpus statistics response
#[derive(Serialize)]
pub struct StatsResponse {
    pub backend: String,
    #[serde(flatten)]
    pub stats: CorpusStats,
}

/// Perform a hybrid search
pub async fn search(State(state): State<AppState>, Json(body): Json<SearchBody>) -> Result<Json<SearchResponse>> {
    body.validate().map_err(validation_error)?;
    let mut request = SearchRequest::from(body);

    // Keyed on the request as sent, before any embedding is attached
    let cache_key = match &state.cache {
        Some(_) => match keys::fingerprint(&request) {
            Ok(fp) => Some(keys::search_response(&fp)),
            Err(e) => {
                warn!(error = %e, "Failed to fingerprint search request");
                None
            }
        },
        None => None,
    };

    if let (Some(cache), Some(key)) = (&state.cache, &cache_key) {
        match cache.get::<SearchResponse>(key).await {
            Ok(Some(cached)) => {
                metrics::record_cache(true, "search");
                return Ok(Json(cached));
            }
            Ok(None) => metrics::record_cache(false, "search"),
            Err(e) => warn!(error = %e, "Search cache lookup failed"),
        }
    }

    if request.query_embedding.is_none() && wants_dense(&request) {
        if let Some(embedder) = &state.embedder {
            request.query_embedding = embed_query(embedder.as_ref(), &request.query_text).await;
        }
    }

    let response = state.engine.search(request).await?;

    if response.status != SearchStatus::Degraded {
        if let (Some(cache), Some(key)) = (&state.cache, &cache_key) {
            if let Err(e) = cache.set(key, &response).await {
                warn!(error = %e, "Failed to cache search response");
            }
        }
    }

    Ok(Json(response))
}

/// Method catalogue, default weights and rule order
pub async fn methods(State(state): State<AppState>) -> Json<MethodCatalogue> {
    Json(state.engine.methods())
}

/// Corpus statistics
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.engine.stats().await?;
    Ok(Json(StatsResponse {
        backend: state.engine.store().backend().to_string(),
        stats,
    }))
}

/// Whether the dense method can contribute to this request
fn wants_dense(request: &SearchRequest) -> bool {
    match (&request.weights, request.method) {
        (_, Some(method)) => method == Method::Dense,
        (Some(weights), None) => weights.is_enabled(Method::Dense),
        (None, None) => true,
    }
}

/// Embed the query; failures degrade the search instead of failing it
async fn embed_query(embedder: &dyn Embedder, text: &str) -> Option<Vec<f32>> {
    let start = Instant::now();
    let result = embedder.embed(text).await;
    let elapsed = start.elapsed().as_secs_f64();
    metrics::record_embedding(elapsed, embedder.model_name(), result.is_ok());

    match result {
        Ok(embedding) => {
            debug!(dimension = embedding.len(), "Query embedded");
            Some(embedding)
        }
        Err(e) => {
            warn!(error = %e, "Query embedding failed, searching without dense retrieval");
            None
        }
    }
}
