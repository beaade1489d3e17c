//! Per-request document arena

use crate::record::Record;
use crate::store::RecordStore;
use rankforge_common::errors::Result;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use uuid::Uuid;

/// Chunks of a set of documents in one contiguous vector.
///
/// Each document occupies one span sorted by chunk index, so neighbours are
/// adjacent slots and index lookups are binary searches.
#[derive(Debug, Default)]
pub struct DocumentArena {
    records: Vec<Record>,
    spans: HashMap<Uuid, Range<usize>>,
}

impl DocumentArena {
    /// Load each distinct document once
    pub async fn load(store: &dyn RecordStore, doc_ids: &[Uuid]) -> Result<Self> {
        let mut seen = HashSet::new();
        let distinct: Vec<Uuid> = doc_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if distinct.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self::from_records(store.load_documents(&distinct).await?))
    }

    /// Build from records grouped by document
    pub fn from_records(mut records: Vec<Record>) -> Self {
        let mut spans: HashMap<Uuid, Range<usize>> = HashMap::new();
        let mut start = 0;
        while start < records.len() {
            let doc_id = records[start].doc_id;
            let len = records[start..].iter().take_while(|r| r.doc_id == doc_id).count();
            let span = start..start + len;
            records[span.clone()].sort_by_key(|r| r.chunk_index);
            spans.insert(doc_id, span);
            start += len;
        }
        Self { records, spans }
    }

    /// All chunks of a document; empty when unknown
    pub fn document(&self, doc_id: &Uuid) -> &[Record] {
        self.spans
            .get(doc_id)
            .map(|span| &self.records[span.clone()])
            .unwrap_or(&[])
    }

    /// Chunks whose index lies in `[start, end]`
    pub fn window(&self, doc_id: &Uuid, start: i32, end: i32) -> &[Record] {
        let chunks = self.document(doc_id);
        let lo = chunks.partition_point(|r| r.chunk_index < start);
        let hi = chunks.partition_point(|r| r.chunk_index <= end);
        if lo >= hi {
            return &[];
        }
        &chunks[lo..hi]
    }

    pub fn document_count(&self) -> usize {
        self.spans.len()
    }
}
