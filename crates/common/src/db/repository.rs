//! Repository pattern for database operations
//!
//! All signal queries run as raw statements because pgvector and pg_trgm
//! operators are outside SeaORM's query builder. Metadata filtering is
//! delegated to a [`ChunkPredicate`], which renders a parameterised
//! `WHERE` fragment over the `chunks c` alias.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, Statement, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chunk id with the raw score of one signal query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunkId {
    pub id: Uuid,
    pub score: f64,
}

/// Aggregate statistics over the stored corpus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_chunks: u64,
    pub embedded_chunks: u64,
    pub documents: u64,
    pub avg_content_length: f64,
}

/// A parameterised SQL predicate over the `chunks` table aliased as `c`
pub trait ChunkPredicate: Send + Sync {
    /// Render the predicate with placeholders numbered from `$first`.
    /// Returns the SQL text and the values to bind, in placeholder order.
    fn render(&self, first: usize) -> (String, Vec<Value>);
}

/// Predicate that keeps every chunk
pub struct MatchAllChunks;

impl ChunkPredicate for MatchAllChunks {
    fn render(&self, _first: usize) -> (String, Vec<Value>) {
        ("TRUE".to_string(), Vec::new())
    }
}

const CHUNK_COLUMNS: &str = "c.id, c.doc_id, c.chunk_index, c.content, c.metadata, \
     c.embedding::text AS embedding, c.created_at";

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Signal Queries
    // ========================================================================

    /// Cosine similarity against the query embedding
    pub async fn nearest_chunks(
        &self,
        embedding: &[f32],
        predicate: &dyn ChunkPredicate,
        limit: usize,
    ) -> Result<Vec<ScoredChunkId>> {
        let (clause, filter_values) = predicate.render(2);
        let limit_param = 2 + filter_values.len();
        let sql = format!(
            r#"
            SELECT c.id, (1 - (c.embedding <=> $1::vector))::double precision AS score
            FROM chunks c
            WHERE c.embedding IS NOT NULL
              AND ({clause})
            ORDER BY score DESC, c.id ASC
            LIMIT ${limit_param}
            "#
        );

        let mut values: Vec<Value> = vec![format_vector(embedding).into()];
        values.extend(filter_values);
        values.push((limit as i64).into());

        self.scored_ids(&sql, values).await
    }

    /// Full-text relevance via `ts_rank_cd`
    pub async fn lexical_chunks(
        &self,
        query: &str,
        predicate: &dyn ChunkPredicate,
        limit: usize,
    ) -> Result<Vec<ScoredChunkId>> {
        let (clause, filter_values) = predicate.render(2);
        let limit_param = 2 + filter_values.len();
        let sql = format!(
            r#"
            SELECT c.id,
                   ts_rank_cd(to_tsvector('english', c.content),
                              plainto_tsquery('english', $1))::double precision AS score
            FROM chunks c
            WHERE to_tsvector('english', c.content) @@ plainto_tsquery('english', $1)
              AND ({clause})
            ORDER BY score DESC, c.id ASC
            LIMIT ${limit_param}
            "#
        );

        let mut values: Vec<Value> = vec![query.into()];
        values.extend(filter_values);
        values.push((limit as i64).into());

        self.scored_ids(&sql, values).await
    }

    /// Case-insensitive containment scored by the share of content matched
    pub async fn substring_chunks(
        &self,
        query: &str,
        predicate: &dyn ChunkPredicate,
        limit: usize,
    ) -> Result<Vec<ScoredChunkId>> {
        let (clause, filter_values) = predicate.render(3);
        let limit_param = 3 + filter_values.len();
        let sql = format!(
            r#"
            SELECT c.id,
                   (char_length(c.content) - char_length(replace(lower(c.content), $2, '')))
                       ::double precision * 100.0
                       / GREATEST(char_length(c.content), 1) AS score
            FROM chunks c
            WHERE c.content ILIKE '%' || $1 || '%'
              AND ({clause})
            ORDER BY score DESC, c.id ASC
            LIMIT ${limit_param}
            "#
        );

        let mut values: Vec<Value> = vec![escape_like(query).into(), query.to_lowercase().into()];
        values.extend(filter_values);
        values.push((limit as i64).into());

        self.scored_ids(&sql, values).await
    }

    /// Trigram word similarity via pg_trgm
    pub async fn trigram_chunks(
        &self,
        query: &str,
        threshold: f64,
        predicate: &dyn ChunkPredicate,
        limit: usize,
    ) -> Result<Vec<ScoredChunkId>> {
        let (clause, filter_values) = predicate.render(3);
        let limit_param = 3 + filter_values.len();
        let sql = format!(
            r#"
            SELECT c.id, word_similarity($1, c.content)::double precision AS score
            FROM chunks c
            WHERE word_similarity($1, c.content) >= $2
              AND ({clause})
            ORDER BY score DESC, c.id ASC
            LIMIT ${limit_param}
            "#
        );

        let mut values: Vec<Value> = vec![query.into(), threshold.into()];
        values.extend(filter_values);
        values.push((limit as i64).into());

        self.scored_ids(&sql, values).await
    }

    async fn scored_ids(&self, sql: &str, values: Vec<Value>) -> Result<Vec<ScoredChunkId>> {
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);
        let rows = self.read_conn().query_all(stmt).await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(ScoredChunkId {
                id: row.try_get::<Uuid>("", "id")?,
                score: row.try_get::<f64>("", "score")?,
            });
        }
        Ok(results)
    }

    // ========================================================================
    // Chunk Operations
    // ========================================================================

    /// Load chunks by id, in no particular order
    pub async fn find_chunks_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Chunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = placeholders(1, ids.len());
        let sql = format!("SELECT {CHUNK_COLUMNS} FROM chunks c WHERE c.id IN ({placeholders})");
        let values: Vec<Value> = ids.iter().map(|id| (*id).into()).collect();

        ChunkEntity::find()
            .from_raw_sql(Statement::from_sql_and_values(DbBackend::Postgres, &sql, values))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Load every chunk of the given documents, ordered by document then index
    pub async fn find_chunks_by_documents(&self, doc_ids: &[Uuid]) -> Result<Vec<Chunk>> {
        if doc_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = placeholders(1, doc_ids.len());
        let sql = format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks c WHERE c.doc_id IN ({placeholders}) \
             ORDER BY c.doc_id, c.chunk_index"
        );
        let values: Vec<Value> = doc_ids.iter().map(|id| (*id).into()).collect();

        ChunkEntity::find()
            .from_raw_sql(Statement::from_sql_and_values(DbBackend::Postgres, &sql, values))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Corpus-wide counts for the stats endpoint
    pub async fn corpus_stats(&self) -> Result<CorpusStats> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            r#"
            SELECT COUNT(*)::bigint AS total_chunks,
                   COUNT(c.embedding)::bigint AS embedded_chunks,
                   COUNT(DISTINCT c.doc_id)::bigint AS documents,
                   COALESCE(AVG(char_length(c.content)), 0)::double precision AS avg_content_length
            FROM chunks c
            "#,
        );

        let Some(row) = self.read_conn().query_one(stmt).await? else {
            return Ok(CorpusStats::default());
        };

        Ok(CorpusStats {
            total_chunks: row.try_get::<i64>("", "total_chunks")?.max(0) as u64,
            embedded_chunks: row.try_get::<i64>("", "embedded_chunks")?.max(0) as u64,
            documents: row.try_get::<i64>("", "documents")?.max(0) as u64,
            avg_content_length: row.try_get::<f64>("", "avg_content_length")?,
        })
    }
}

/// `$first, $first+1, ...` for `count` binds
fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape LIKE metacharacters so the query matches literally
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for ch in query.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1, 3), "$1, $2, $3");
        assert_eq!(placeholders(4, 1), "$4");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_match_all_renders_true() {
        let (sql, values) = MatchAllChunks.render(5);
        assert_eq!(sql, "TRUE");
        assert!(values.is_empty());
    }
}
