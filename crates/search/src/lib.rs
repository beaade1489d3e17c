//! RankForge hybrid retrieval engine
//!
//! Four independent ranking signals over a chunked document corpus (dense
//! embeddings, BM25 / full-text, substring patterns, trigram similarity),
//! combined with weighted Reciprocal Rank Fusion. Weights adapt to the
//! query unless the caller pins them, results can be restricted by a
//! metadata filter DSL, and hits can be expanded into surrounding context.

pub mod context;
pub mod engine;
pub mod filter;
pub mod record;
pub mod retrieval;
pub mod store;
pub mod weights;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{ChunkRange, ContextExpander, Expansion, ExpansionSpec, RadiusExpansion, RadiusRequest, RangeExpansion};
pub use engine::{ExpandOptions, HybridSearchEngine, MethodCatalogue, SearchRequest, SearchResponse, SearchResult};
pub use filter::{CompiledFilter, FilterCompiler, MetadataSchema};
pub use record::Record;
pub use retrieval::{Method, MethodOutcome, MethodValues, SearchStatus};
pub use store::{InMemoryRecordStore, PgRecordStore, RecordStore};
pub use weights::{WeightSelection, WeightSelector, WeightSet};
