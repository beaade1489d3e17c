//! Postgres record store (pgvector + pg_trgm)

use super::RecordStore;
use crate::filter::CompiledFilter;
use crate::record::Record;
use async_trait::async_trait;
use rankforge_common::db::{CorpusStats, Repository, ScoredChunkId};
use rankforge_common::errors::Result;
use std::collections::HashMap;
use uuid::Uuid;

/// Store backed by the `chunks` table
#[derive(Clone)]
pub struct PgRecordStore {
    repo: Repository,
}

impl PgRecordStore {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn nearest(
        &self,
        embedding: &[f32],
        filter: &CompiledFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunkId>> {
        self.repo.nearest_chunks(embedding, filter, limit).await
    }

    async fn lexical(&self, query: &str, filter: &CompiledFilter, limit: usize) -> Result<Vec<ScoredChunkId>> {
        self.repo.lexical_chunks(query, filter, limit).await
    }

    async fn substring(&self, query: &str, filter: &CompiledFilter, limit: usize) -> Result<Vec<ScoredChunkId>> {
        self.repo.substring_chunks(query, filter, limit).await
    }

    async fn trigram(
        &self,
        query: &str,
        threshold: f64,
        filter: &CompiledFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunkId>> {
        self.repo.trigram_chunks(query, threshold, filter, limit).await
    }

    async fn fetch(&self, ids: &[Uuid]) -> Result<Vec<Record>> {
        let mut by_id: HashMap<Uuid, Record> = self
            .repo
            .find_chunks_by_ids(ids)
            .await?
            .into_iter()
            .map(|chunk| (chunk.id, Record::from(chunk)))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn load_documents(&self, doc_ids: &[Uuid]) -> Result<Vec<Record>> {
        // Rows arrive grouped by doc_id and sorted by index; regroup into request order
        let mut grouped: HashMap<Uuid, Vec<Record>> = HashMap::new();
        for chunk in self.repo.find_chunks_by_documents(doc_ids).await? {
            grouped.entry(chunk.doc_id).or_default().push(chunk.into());
        }

        let mut records = Vec::new();
        for doc_id in doc_ids {
            if let Some(chunks) = grouped.remove(doc_id) {
                records.extend(chunks);
            }
        }
        Ok(records)
    }

    async fn stats(&self) -> Result<CorpusStats> {
        self.repo.corpus_stats().await
    }

    async fn ping(&self) -> Result<()> {
        self.repo.ping().await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
