//! Context expansion handlers

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::validation_error;
use crate::AppState;
use rankforge_common::errors::Result;
use rankforge_search::{ChunkRange, RadiusExpansion, RadiusRequest, RangeExpansion};

/// Radius expansion request body
#[derive(Debug, Deserialize, Validate)]
pub struct ExpandBody {
    #[validate(length(min = 1, max = 200))]
    pub chunk_ids: Vec<Uuid>,

    /// Defaults to `expansion.default_radius`
    #[serde(default)]
    pub expansion_radius: Option<u32>,

    /// Defaults to `expansion.max_total_tokens`
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_total_tokens: Option<usize>,
}

/// Range retrieval request body
#[derive(Debug, Deserialize, Validate)]
pub struct RangesBody {
    #[validate(length(min = 1, max = 100))]
    pub ranges: Vec<ChunkRange>,
}

/// Expand chunks into their neighbours under a token budget
pub async fn expand(State(state): State<AppState>, Json(body): Json<ExpandBody>) -> Result<Json<RadiusExpansion>> {
    body.validate().map_err(validation_error)?;

    let defaults = &state.config.expansion;
    let request = RadiusRequest {
        chunk_ids: body.chunk_ids,
        radius: body.expansion_radius.unwrap_or(defaults.default_radius),
        max_total_tokens: body.max_total_tokens.unwrap_or(defaults.max_total_tokens),
    };

    Ok(Json(state.engine.expand_radius(&request).await?))
}

/// Fetch explicit chunk index ranges
pub async fn ranges(State(state): State<AppState>, Json(body): Json<RangesBody>) -> Result<Json<RangeExpansion>> {
    body.validate().map_err(validation_error)?;
    Ok(Json(state.engine.chunks_by_ranges(&body.ranges).await?))
}
