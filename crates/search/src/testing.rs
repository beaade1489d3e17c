//! Shared test corpus

use crate::record::Record;
use crate::store::{InMemoryRecordStore, RecordStore};
use std::sync::Arc;
use uuid::Uuid;

pub const FIXTURE_DIMENSION: usize = 3;

pub fn record_id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub fn doc_id(n: u128) -> Uuid {
    Uuid::from_u128(1_000 + n)
}

/// Two documents: an ML paper (records 1-4) and a finance report (5-7)
pub fn fixture_records() -> Vec<Record> {
    vec![
        Record::new(record_id(1), doc_id(1), 0, "Transformer attention mechanism explained")
            .with_embedding(vec![1.0, 0.0, 0.0])
            .with_metadata("year", 2021)
            .with_metadata("category", "ml"),
        Record::new(record_id(2), doc_id(1), 1, "Attention heads learn different patterns")
            .with_embedding(vec![0.9, 0.1, 0.0])
            .with_metadata("year", 2022)
            .with_metadata("category", "ml"),
        Record::new(record_id(3), doc_id(1), 2, "Training tips for large models")
            .with_embedding(vec![0.7, 0.7, 0.0])
            .with_metadata("year", 2023)
            .with_metadata("category", "ml"),
        Record::new(record_id(4), doc_id(1), 3, "Evaluation benchmarks and metrics")
            .with_embedding(vec![0.0, 1.0, 0.0])
            .with_metadata("year", 2023)
            .with_metadata("category", "ml"),
        Record::new(record_id(5), doc_id(2), 0, "Annual report 2023")
            .with_embedding(vec![0.0, 0.0, 1.0])
            .with_metadata("year", 2023)
            .with_metadata("category", "finance"),
        Record::new(
            record_id(6),
            doc_id(2),
            1,
            "The annual report covers revenue growth; the annual report appendix lists subsidiaries",
        )
        .with_embedding(vec![0.0, 0.2, 1.0])
        .with_metadata("year", 2023)
        .with_metadata("category", "finance"),
        Record::new(record_id(7), doc_id(2), 2, "Revenue grew eleven percent")
            .with_metadata("year", 2023)
            .with_metadata("category", "finance"),
    ]
}

pub fn memory_store() -> InMemoryRecordStore {
    InMemoryRecordStore::from_records(FIXTURE_DIMENSION, fixture_records())
        .expect("fixture records are valid")
}

pub fn fixture_store() -> Arc<dyn RecordStore> {
    Arc::new(memory_store())
}

/// One document with `count` chunks of `chars` characters each
pub fn long_document(doc: Uuid, count: i32, chars: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::new(
                Uuid::from_u128(doc.as_u128() * 100 + i as u128),
                doc,
                i,
                "x".repeat(chars),
            )
        })
        .collect()
}
