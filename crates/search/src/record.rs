//! The retrievable unit: one chunk of one document

use rankforge_common::db::models::Chunk;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Open map of scalar metadata attributes
pub type Metadata = Map<String, Value>;

/// A chunk of a source document with optional embedding and metadata.
///
/// `(doc_id, chunk_index)` is unique within a store, and an embedding, when
/// present, has the store's configured dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,

    pub doc_id: Uuid,

    pub chunk_index: i32,

    pub content: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Record {
    pub fn new(id: Uuid, doc_id: Uuid, chunk_index: i32, content: impl Into<String>) -> Self {
        Self {
            id,
            doc_id,
            chunk_index,
            content: content.into(),
            metadata: Metadata::new(),
            embedding: None,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

impl From<Chunk> for Record {
    fn from(chunk: Chunk) -> Self {
        let embedding = chunk.parse_embedding();
        let metadata = match chunk.metadata {
            Value::Object(map) => map,
            _ => Metadata::new(),
        };

        Self {
            id: chunk.id,
            doc_id: chunk.doc_id,
            chunk_index: chunk.chunk_index,
            content: chunk.content,
            metadata,
            embedding,
        }
    }
}
