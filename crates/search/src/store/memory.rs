//! In-memory record store
//!
//! Records live in a single arena (`Vec<Record>`); ids and document
//! membership index into it by slot. Lexical relevance comes from a `bm25`
//! search engine over record contents.
//!
//! Every signal query is a full scan, so each one runs on the blocking pool:
//! the hybrid executor's per-method deadline can then abandon a slow scan
//! while the other methods keep going.

use super::{top_scored, RecordStore};
use crate::filter::CompiledFilter;
use crate::record::Record;
use crate::retrieval::dense::cosine_similarity;
use crate::retrieval::text;
use async_trait::async_trait;
use bm25::{Document, Language, SearchEngine, SearchEngineBuilder};
use rankforge_common::db::{CorpusStats, ScoredChunkId};
use rankforge_common::errors::{AppError, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tracing::info;
use uuid::Uuid;

/// Arena-backed store with a BM25 index
pub struct InMemoryRecordStore {
    dimension: usize,
    corpus: Arc<RwLock<Corpus>>,
}

#[derive(Default)]
struct Corpus {
    records: Vec<Record>,
    by_id: HashMap<Uuid, usize>,
    /// Slots of each document, sorted by chunk index
    by_document: HashMap<Uuid, Vec<usize>>,
    /// `None` while the corpus is empty
    lexical: Option<SearchEngine<Uuid>>,
}

impl Corpus {
    /// Add a record to the arena without touching the lexical index
    fn push(&mut self, record: Record, dimension: usize) -> Result<()> {
        if self.by_id.contains_key(&record.id) {
            return Err(AppError::DuplicateRecord {
                message: format!("record id {} already stored", record.id),
            });
        }

        let siblings = self.by_document.get(&record.doc_id).map(Vec::as_slice).unwrap_or(&[]);
        let position = siblings.partition_point(|&slot| self.records[slot].chunk_index < record.chunk_index);
        if siblings
            .get(position)
            .is_some_and(|&slot| self.records[slot].chunk_index == record.chunk_index)
        {
            return Err(AppError::DuplicateRecord {
                message: format!(
                    "document {} already has chunk index {}",
                    record.doc_id, record.chunk_index
                ),
            });
        }

        if let Some(embedding) = &record.embedding {
            if embedding.len() != dimension {
                return Err(AppError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
        }

        let slot = self.records.len();
        self.by_id.insert(record.id, slot);
        self.by_document
            .entry(record.doc_id)
            .or_default()
            .insert(position, slot);
        self.records.push(record);
        Ok(())
    }

    /// Rebuild the BM25 engine so document-length statistics cover every record
    fn reindex(&mut self) {
        if self.records.is_empty() {
            self.lexical = None;
            return;
        }
        let documents: Vec<Document<Uuid>> = self
            .records
            .iter()
            .map(|record| Document {
                id: record.id,
                contents: record.content.clone(),
            })
            .collect();
        self.lexical = Some(SearchEngineBuilder::<Uuid>::with_documents(Language::English, documents).build());
    }

    fn score_each<F>(&self, filter: &CompiledFilter, limit: usize, score: F) -> Vec<ScoredChunkId>
    where
        F: Fn(&Record) -> Option<f64>,
    {
        let scored = self
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .filter_map(|record| score(record).map(|score| ScoredChunkId { id: record.id, score }))
            .collect();
        top_scored(scored, limit)
    }

    fn lexical(&self, query: &str, filter: &CompiledFilter, limit: usize) -> Vec<ScoredChunkId> {
        let Some(engine) = &self.lexical else {
            return Vec::new();
        };

        // Filter after scoring, so ask for every matching record
        let scored = engine
            .search(query, self.records.len())
            .into_iter()
            .filter(|result| result.score > 0.0)
            .filter_map(|result| {
                let slot = *self.by_id.get(&result.document.id)?;
                filter.matches(&self.records[slot]).then_some(ScoredChunkId {
                    id: result.document.id,
                    score: f64::from(result.score),
                })
            })
            .collect();
        top_scored(scored, limit)
    }
}

impl InMemoryRecordStore {
    /// Create an empty store for embeddings of `dimension`
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            corpus: Arc::new(RwLock::new(Corpus::default())),
        }
    }

    /// Build a store from records, enforcing the record invariants
    pub fn from_records(dimension: usize, records: impl IntoIterator<Item = Record>) -> Result<Self> {
        let mut corpus = Corpus::default();
        for record in records {
            corpus.push(record, dimension)?;
        }
        corpus.reindex();
        Ok(Self {
            dimension,
            corpus: Arc::new(RwLock::new(corpus)),
        })
    }

    /// Load a JSON array of records from disk
    pub async fn load_snapshot(path: &Path, dimension: usize) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let records: Vec<Record> = serde_json::from_str(&raw)?;
        let store = Self::from_records(dimension, records)?;
        info!(
            path = %path.display(),
            records = store.len(),
            documents = store.read().map(|c| c.by_document.len()).unwrap_or_default(),
            "Loaded record snapshot"
        );
        Ok(store)
    }

    /// Add a record.
    ///
    /// Rejects duplicate ids, duplicate `(doc_id, chunk_index)` pairs and
    /// embeddings of the wrong dimension.
    pub fn insert(&mut self, record: Record) -> Result<()> {
        let mut corpus = self.corpus.write().map_err(|_| poisoned())?;
        corpus.push(record, self.dimension)?;
        corpus.reindex();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().map(|c| c.records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Corpus>> {
        self.corpus.read().map_err(|_| poisoned())
    }

    /// Run a scan on the blocking pool
    async fn scan<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Corpus) -> T + Send + 'static,
        T: Send + 'static,
    {
        let corpus = Arc::clone(&self.corpus);
        tokio::task::spawn_blocking(move || -> Result<T> {
            let guard = corpus.read().map_err(|_| poisoned())?;
            Ok(work(&guard))
        })
        .await
        .map_err(|e| AppError::Internal {
            message: format!("record scan aborted: {}", e),
        })?
    }
}

fn poisoned() -> AppError {
    AppError::Internal {
        message: "in-memory record store lock poisoned".to_string(),
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn nearest(
        &self,
        embedding: &[f32],
        filter: &CompiledFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunkId>> {
        let embedding = embedding.to_vec();
        let filter = filter.clone();
        self.scan(move |corpus| {
            corpus.score_each(&filter, limit, |record| {
                record
                    .embedding
                    .as_deref()
                    .and_then(|stored| cosine_similarity(&embedding, stored))
            })
        })
        .await
    }

    async fn lexical(&self, query: &str, filter: &CompiledFilter, limit: usize) -> Result<Vec<ScoredChunkId>> {
        let query = query.to_string();
        let filter = filter.clone();
        self.scan(move |corpus| corpus.lexical(&query, &filter, limit)).await
    }

    async fn substring(&self, query: &str, filter: &CompiledFilter, limit: usize) -> Result<Vec<ScoredChunkId>> {
        let query = query.to_string();
        let filter = filter.clone();
        self.scan(move |corpus| {
            corpus.score_each(&filter, limit, |record| text::pattern_score(&record.content, &query))
        })
        .await
    }

    async fn trigram(
        &self,
        query: &str,
        threshold: f64,
        filter: &CompiledFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunkId>> {
        let query = query.to_string();
        let filter = filter.clone();
        self.scan(move |corpus| {
            corpus.score_each(&filter, limit, |record| {
                let score = text::word_similarity(&query, &record.content);
                (score >= threshold).then_some(score)
            })
        })
        .await
    }

    async fn fetch(&self, ids: &[Uuid]) -> Result<Vec<Record>> {
        let corpus = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| corpus.by_id.get(id))
            .map(|&slot| corpus.records[slot].clone())
            .collect())
    }

    async fn load_documents(&self, doc_ids: &[Uuid]) -> Result<Vec<Record>> {
        let corpus = self.read()?;
        let mut seen = HashSet::new();
        Ok(doc_ids
            .iter()
            .filter(|doc_id| seen.insert(**doc_id))
            .filter_map(|doc_id| corpus.by_document.get(doc_id))
            .flat_map(|slots| slots.iter().map(|&slot| corpus.records[slot].clone()))
            .collect())
    }

    async fn stats(&self) -> Result<CorpusStats> {
        let corpus = self.read()?;
        let records = &corpus.records;
        let total_chars: usize = records.iter().map(|r| r.content.chars().count()).sum();
        Ok(CorpusStats {
            total_chunks: records.len() as u64,
            embedded_chunks: records.iter().filter(|r| r.embedding.is_some()).count() as u64,
            documents: corpus.by_document.len() as u64,
            avg_content_length: if records.is_empty() {
                0.0
            } else {
                total_chars as f64 / records.len() as f64
            },
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
