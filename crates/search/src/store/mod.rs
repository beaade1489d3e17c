//! Record stores
//!
//! The engine reads records through [`RecordStore`]; it never writes.
//! Two implementations:
//! - [`InMemoryRecordStore`]: arena-backed, with a `bm25` engine for lexical scoring
//! - [`PgRecordStore`]: Postgres with pgvector and pg_trgm

mod memory;
mod postgres;

pub use memory::InMemoryRecordStore;
pub use postgres::PgRecordStore;

use crate::filter::CompiledFilter;
use crate::record::Record;
use async_trait::async_trait;
use rankforge_common::db::{CorpusStats, ScoredChunkId};
use rankforge_common::errors::Result;
use uuid::Uuid;

/// Read access to the chunk collection.
///
/// Every signal query only considers records accepted by `filter` and
/// returns at most `limit` entries ordered by score descending, ties by id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Cosine similarity to `embedding`; records without one are skipped
    async fn nearest(
        &self,
        embedding: &[f32],
        filter: &CompiledFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunkId>>;

    /// Lexical relevance of `query`
    async fn lexical(&self, query: &str, filter: &CompiledFilter, limit: usize) -> Result<Vec<ScoredChunkId>>;

    /// Case-insensitive containment of `query`
    async fn substring(&self, query: &str, filter: &CompiledFilter, limit: usize) -> Result<Vec<ScoredChunkId>>;

    /// Trigram similarity of at least `threshold`
    async fn trigram(
        &self,
        query: &str,
        threshold: f64,
        filter: &CompiledFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunkId>>;

    /// Records by id; unknown ids are absent from the result
    async fn fetch(&self, ids: &[Uuid]) -> Result<Vec<Record>>;

    /// All records of the given documents, grouped in `doc_ids` order and
    /// sorted by chunk index within each document
    async fn load_documents(&self, doc_ids: &[Uuid]) -> Result<Vec<Record>>;

    /// Corpus statistics
    async fn stats(&self) -> Result<CorpusStats>;

    /// Connectivity check
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;
}

/// Sort scored ids by score descending then id, and keep `limit`
pub(crate) fn top_scored(mut scored: Vec<ScoredChunkId>, limit: usize) -> Vec<ScoredChunkId> {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    scored.truncate(limit);
    scored
}
