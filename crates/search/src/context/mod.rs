//! Context expansion around retrieved chunks
//!
//! Provides:
//! - Radius expansion: neighbours within `R` positions of each hit, under a
//!   token budget
//! - Range retrieval: explicit `[start, end]` index ranges per document, with
//!   neighbour previews

mod arena;
mod expander;

pub use arena::DocumentArena;
pub use expander::ContextExpander;

use crate::record::Metadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Radius expansion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiusRequest {
    pub chunk_ids: Vec<Uuid>,
    pub radius: u32,
    pub max_total_tokens: usize,
}

/// Inclusive chunk index range within one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRange {
    pub doc_id: Uuid,
    pub start_index: i32,
    pub end_index: i32,
}

/// What to expand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExpansionSpec {
    Radius(RadiusRequest),
    Ranges { ranges: Vec<ChunkRange> },
}

/// A chunk returned by radius expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedChunk {
    pub record_id: Uuid,
    pub doc_id: Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub metadata: Metadata,
    /// One of the requested hits
    pub is_original: bool,
    /// Index distance to the nearest requested hit that pulled it in
    pub distance_from_original: u32,
    pub token_estimate: usize,
}

/// Radius expansion output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadiusExpansion {
    /// Ordered by document (first appearance among hits) then chunk index
    pub chunks: Vec<ExpandedChunk>,
    pub total_tokens: usize,
    /// Some hits were skipped because the budget ran out
    pub budget_exhausted: bool,
    /// Requested ids with no stored record
    pub missing_ids: Vec<Uuid>,
}

/// A chunk returned by range retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeChunk {
    pub record_id: Uuid,
    pub doc_id: Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub metadata: Metadata,
    pub prev_preview: Option<String>,
    pub next_preview: Option<String>,
    /// Total chunks stored for the owning document
    pub document_chunk_count: usize,
}

/// Range retrieval output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeExpansion {
    pub chunks: Vec<RangeChunk>,
}

/// Output of [`ContextExpander::expand`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Expansion {
    Radius(RadiusExpansion),
    Ranges(RangeExpansion),
}
