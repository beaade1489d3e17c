//! Chunk entity: one retrievable unit of a document

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning document; `(doc_id, chunk_index)` is unique
    pub doc_id: Uuid,

    pub chunk_index: i32,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Open map of scalar attributes (jsonb)
    pub metadata: Json,

    /// pgvector embedding stored as text for SeaORM compatibility
    /// Actual vector operations done via raw SQL
    #[sea_orm(column_type = "Text", nullable)]
    pub embedding: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parse embedding from stored text format to Vec<f32>
    pub fn parse_embedding(&self) -> Option<Vec<f32>> {
        self.embedding.as_deref().and_then(parse_vector)
    }
}

/// Parse pgvector text output, e.g. `[1,2.5,-0.25]`
pub fn parse_vector(text: &str) -> Option<Vec<f32>> {
    let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|v| v.trim().parse::<f32>().ok())
        .collect()
}

/// Format a vector as a pgvector literal for `$n::vector` binds
pub fn format_vector(values: &[f32]) -> String {
    format!(
        "[{}]",
        values
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_text_roundtrip() {
        let values = vec![1.0_f32, -0.25, 3.5];
        let text = format_vector(&values);
        assert_eq!(text, "[1,-0.25,3.5]");
        assert_eq!(parse_vector(&text), Some(values));
    }

    #[test]
    fn test_parse_vector_rejects_garbage() {
        assert_eq!(parse_vector("[1,abc]"), None);
        assert_eq!(parse_vector("[]"), Some(vec![]));
    }
}
