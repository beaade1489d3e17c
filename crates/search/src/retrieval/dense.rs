//! Dense retrieval by embedding cosine similarity

use super::{Method, MethodHit, RetrievalQuery, Retriever};
use crate::store::RecordStore;
use rankforge_common::errors::{AppError, Result};
use std::sync::Arc;

/// Dense retriever
pub struct DenseRetriever {
    store: Arc<dyn RecordStore>,
}

impl DenseRetriever {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Retriever for DenseRetriever {
    async fn retrieve(&self, query: &RetrievalQuery<'_>) -> Result<Vec<MethodHit>> {
        let embedding = query.embedding.ok_or(AppError::MissingEmbedding)?;
        let scored = self.store.nearest(embedding, query.filter, query.limit).await?;
        Ok(query.rank(self.method(), scored))
    }

    fn method(&self) -> Method {
        Method::Dense
    }
}

/// Cosine similarity; `None` for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
