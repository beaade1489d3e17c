//! Radius and range expansion

use super::{
    ChunkRange, DocumentArena, Expansion, ExpansionSpec, ExpandedChunk, RadiusExpansion, RadiusRequest,
    RangeChunk, RangeExpansion,
};
use crate::record::Record;
use crate::store::RecordStore;
use rankforge_common::config::ExpansionConfig;
use rankforge_common::errors::{AppError, Result};
use rankforge_common::metrics;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Expands hits into surrounding context
pub struct ContextExpander {
    store: Arc<dyn RecordStore>,
    config: ExpansionConfig,
}

impl ContextExpander {
    pub fn new(store: Arc<dyn RecordStore>, config: ExpansionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    pub async fn expand(&self, spec: &ExpansionSpec) -> Result<Expansion> {
        match spec {
            ExpansionSpec::Radius(request) => self.expand_radius(request).await.map(Expansion::Radius),
            ExpansionSpec::Ranges { ranges } => self.chunks_by_ranges(ranges).await.map(Expansion::Ranges),
        }
    }

    /// Approximate token count: `ceil(chars / chars_per_token)`
    pub fn estimate_tokens(&self, content: &str) -> usize {
        let per_token = self.config.chars_per_token.max(1);
        content.chars().count().div_ceil(per_token)
    }

    /// Pull in the neighbours within `radius` of each hit.
    ///
    /// Hits are processed in request order. Before each hit the running token
    /// total is checked, and once it exceeds the budget the remaining hits are
    /// skipped. Chunks reached from several hits keep their smallest distance.
    pub async fn expand_radius(&self, request: &RadiusRequest) -> Result<RadiusExpansion> {
        if request.max_total_tokens < 1 {
            return Err(AppError::Validation {
                message: "max_total_tokens must be at least 1".to_string(),
                field: Some("max_total_tokens".to_string()),
            });
        }
        if request.radius > self.config.max_radius {
            return Err(AppError::Validation {
                message: format!(
                    "expansion radius {} exceeds the maximum of {}",
                    request.radius, self.config.max_radius
                ),
                field: Some("expansion_radius".to_string()),
            });
        }

        let hits = self.store.fetch(&request.chunk_ids).await?;
        let found: HashSet<Uuid> = hits.iter().map(|r| r.id).collect();
        let mut missing_ids: Vec<Uuid> = Vec::new();
        for id in &request.chunk_ids {
            if !found.contains(id) && !missing_ids.contains(id) {
                missing_ids.push(*id);
            }
        }
        if !missing_ids.is_empty() {
            debug!(missing = missing_ids.len(), "Skipping unknown chunk ids");
        }

        let doc_order: Vec<Uuid> = first_appearance(hits.iter().map(|r| r.doc_id));
        let arena = DocumentArena::load(self.store.as_ref(), &doc_order).await?;

        let radius = i32::try_from(request.radius).unwrap_or(i32::MAX);
        let mut selected: HashMap<Uuid, ExpandedChunk> = HashMap::new();
        let mut tokens_used = 0usize;
        let mut budget_exhausted = false;

        for hit in &hits {
            if tokens_used > request.max_total_tokens {
                budget_exhausted = true;
                break;
            }

            let window = arena.window(
                &hit.doc_id,
                hit.chunk_index.saturating_sub(radius),
                hit.chunk_index.saturating_add(radius),
            );
            for chunk in window {
                let distance = chunk.chunk_index.abs_diff(hit.chunk_index);
                let is_original = chunk.id == hit.id;
                match selected.get_mut(&chunk.id) {
                    Some(existing) => {
                        existing.distance_from_original = existing.distance_from_original.min(distance);
                        existing.is_original |= is_original;
                    }
                    None => {
                        let token_estimate = self.estimate_tokens(&chunk.content);
                        tokens_used += token_estimate;
                        selected.insert(chunk.id, expanded(chunk, is_original, distance, token_estimate));
                    }
                }
            }
        }

        let rank_of: HashMap<Uuid, usize> = doc_order.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        let mut chunks: Vec<ExpandedChunk> = selected.into_values().collect();
        chunks.sort_by_key(|c| (rank_of.get(&c.doc_id).copied().unwrap_or(usize::MAX), c.chunk_index));

        metrics::record_expansion("radius", chunks.len(), budget_exhausted);
        info!(
            hits = hits.len(),
            chunks = chunks.len(),
            tokens = tokens_used,
            budget_exhausted,
            "Radius expansion complete"
        );

        Ok(RadiusExpansion {
            chunks,
            total_tokens: tokens_used,
            budget_exhausted,
            missing_ids,
        })
    }

    /// Every chunk inside the requested index ranges.
    ///
    /// All ranges are validated before any lookup. Rows are grouped by
    /// document in order of first appearance and sorted by index; a chunk
    /// covered by overlapping ranges appears once.
    pub async fn chunks_by_ranges(&self, ranges: &[ChunkRange]) -> Result<RangeExpansion> {
        if let Some(bad) = ranges.iter().find(|r| r.start_index > r.end_index) {
            return Err(AppError::InvalidRange {
                doc_id: bad.doc_id.to_string(),
                start_index: bad.start_index,
                end_index: bad.end_index,
            });
        }

        let doc_order = first_appearance(ranges.iter().map(|r| r.doc_id));
        let arena = DocumentArena::load(self.store.as_ref(), &doc_order).await?;

        let mut chunks = Vec::new();
        for doc_id in &doc_order {
            let document = arena.document(doc_id);
            let doc_ranges: Vec<&ChunkRange> = ranges.iter().filter(|r| r.doc_id == *doc_id).collect();

            for (position, chunk) in document.iter().enumerate() {
                let covered = doc_ranges
                    .iter()
                    .any(|r| (r.start_index..=r.end_index).contains(&chunk.chunk_index));
                if !covered {
                    continue;
                }
                let prev = position.checked_sub(1).and_then(|p| document.get(p));
                let next = document.get(position + 1);
                chunks.push(RangeChunk {
                    record_id: chunk.id,
                    doc_id: chunk.doc_id,
                    chunk_index: chunk.chunk_index,
                    content: chunk.content.clone(),
                    metadata: chunk.metadata.clone(),
                    prev_preview: prev.map(|r| self.preview(&r.content)),
                    next_preview: next.map(|r| self.preview(&r.content)),
                    document_chunk_count: document.len(),
                });
            }
        }

        metrics::record_expansion("ranges", chunks.len(), false);
        info!(
            ranges = ranges.len(),
            documents = arena.document_count(),
            chunks = chunks.len(),
            "Range retrieval complete"
        );

        Ok(RangeExpansion { chunks })
    }

    fn preview(&self, content: &str) -> String {
        let limit = self.config.preview_chars;
        match content.char_indices().nth(limit) {
            Some((cut, _)) => format!("{}...", &content[..cut]),
            None => content.to_string(),
        }
    }
}

fn expanded(record: &Record, is_original: bool, distance: u32, token_estimate: usize) -> ExpandedChunk {
    ExpandedChunk {
        record_id: record.id,
        doc_id: record.doc_id,
        chunk_index: record.chunk_index,
        content: record.content.clone(),
        metadata: record.metadata.clone(),
        is_original,
        distance_from_original: distance,
        token_estimate,
    }
}

fn first_appearance(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;
    use crate::testing::long_document;

    const DOC: u128 = 42;
    const OTHER: u128 = 43;

    fn chunk_id(doc: u128, index: u128) -> Uuid {
        Uuid::from_u128(doc * 100 + index)
    }

    /// Two documents of 11 chunks, 40 chars (10 tokens) each
    fn expander() -> ContextExpander {
        let mut records = long_document(Uuid::from_u128(DOC), 11, 40);
        records.extend(long_document(Uuid::from_u128(OTHER), 11, 40));
        let store = InMemoryRecordStore::from_records(3, records).unwrap();
        ContextExpander::new(Arc::new(store), ExpansionConfig::default())
    }

    fn radius(ids: Vec<Uuid>, radius: u32, budget: usize) -> RadiusRequest {
        RadiusRequest {
            chunk_ids: ids,
            radius,
            max_total_tokens: budget,
        }
    }

    #[tokio::test]
    async fn test_radius_two_around_middle_chunk() {
        let result = expander()
            .expand_radius(&radius(vec![chunk_id(DOC, 5)], 2, 8000))
            .await
            .unwrap();

        let layout: Vec<(i32, u32, bool)> = result
            .chunks
            .iter()
            .map(|c| (c.chunk_index, c.distance_from_original, c.is_original))
            .collect();
        assert_eq!(
            layout,
            vec![(3, 2, false), (4, 1, false), (5, 0, true), (6, 1, false), (7, 2, false)]
        );
        assert_eq!(result.total_tokens, 50);
        assert!(!result.budget_exhausted);
    }

    #[tokio::test]
    async fn test_radius_zero_returns_hits_only() {
        let result = expander()
            .expand_radius(&radius(vec![chunk_id(DOC, 0), chunk_id(DOC, 10)], 0, 8000))
            .await
            .unwrap();
        let indexes: Vec<i32> = result.chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, vec![0, 10]);
        assert!(result.chunks.iter().all(|c| c.is_original));
    }

    #[tokio::test]
    async fn test_overlapping_windows_keep_smallest_distance() {
        let result = expander()
            .expand_radius(&radius(vec![chunk_id(DOC, 4), chunk_id(DOC, 6)], 2, 8000))
            .await
            .unwrap();

        let layout: Vec<(i32, u32, bool)> = result
            .chunks
            .iter()
            .map(|c| (c.chunk_index, c.distance_from_original, c.is_original))
            .collect();
        assert_eq!(
            layout,
            vec![
                (2, 2, false),
                (3, 1, false),
                (4, 0, true),
                (5, 1, false),
                (6, 0, true),
                (7, 1, false),
                (8, 2, false)
            ]
        );
    }

    #[tokio::test]
    async fn test_budget_stops_before_next_hit() {
        let hits = vec![chunk_id(DOC, 2), chunk_id(OTHER, 8)];

        let tight = expander().expand_radius(&radius(hits.clone(), 1, 25)).await.unwrap();
        assert!(tight.budget_exhausted);
        assert_eq!(tight.total_tokens, 30);
        assert!(tight.chunks.iter().all(|c| c.doc_id == Uuid::from_u128(DOC)));

        // Exactly at the budget is not over it
        let exact = expander().expand_radius(&radius(hits, 1, 30)).await.unwrap();
        assert!(!exact.budget_exhausted);
        assert_eq!(exact.total_tokens, 60);
    }

    #[tokio::test]
    async fn test_documents_follow_first_appearance_and_missing_reported() {
        let unknown = Uuid::from_u128(999_999);
        let result = expander()
            .expand_radius(&radius(vec![chunk_id(OTHER, 3), unknown, chunk_id(DOC, 1)], 0, 8000))
            .await
            .unwrap();

        let docs: Vec<u128> = result.chunks.iter().map(|c| c.doc_id.as_u128()).collect();
        assert_eq!(docs, vec![OTHER, DOC]);
        assert_eq!(result.missing_ids, vec![unknown]);
    }

    #[tokio::test]
    async fn test_radius_validation() {
        let expander = expander();
        assert!(expander
            .expand_radius(&radius(vec![chunk_id(DOC, 1)], 11, 8000))
            .await
            .is_err());
        assert!(expander
            .expand_radius(&radius(vec![chunk_id(DOC, 1)], 1, 0))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_ranges_with_previews() {
        let mut records = long_document(Uuid::from_u128(DOC), 4, 10);
        records[0].content = "a".repeat(250);
        let store = InMemoryRecordStore::from_records(3, records).unwrap();
        let expander = ContextExpander::new(Arc::new(store), ExpansionConfig::default());

        let doc = Uuid::from_u128(DOC);
        let result = expander
            .chunks_by_ranges(&[ChunkRange {
                doc_id: doc,
                start_index: 1,
                end_index: 3,
            }])
            .await
            .unwrap();

        assert_eq!(result.chunks.len(), 3);
        let first = &result.chunks[0];
        assert_eq!(first.chunk_index, 1);
        assert_eq!(first.document_chunk_count, 4);
        let preview = first.prev_preview.as_deref().unwrap();
        assert_eq!(preview.len(), 203);
        assert!(preview.ends_with("..."));
        assert_eq!(result.chunks[2].next_preview, None);
    }

    #[tokio::test]
    async fn test_single_index_and_unknown_document() {
        let doc = Uuid::from_u128(DOC);
        let result = expander()
            .chunks_by_ranges(&[
                ChunkRange {
                    doc_id: doc,
                    start_index: 4,
                    end_index: 4,
                },
                ChunkRange {
                    doc_id: Uuid::from_u128(5),
                    start_index: 0,
                    end_index: 3,
                },
            ])
            .await
            .unwrap();
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].chunk_index, 4);
    }

    #[tokio::test]
    async fn test_any_inverted_range_rejects_the_request() {
        let doc = Uuid::from_u128(DOC);
        let err = expander()
            .chunks_by_ranges(&[
                ChunkRange {
                    doc_id: doc,
                    start_index: 0,
                    end_index: 1,
                },
                ChunkRange {
                    doc_id: doc,
                    start_index: 5,
                    end_index: 2,
                },
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRange { start_index: 5, end_index: 2, .. }));
    }
}
