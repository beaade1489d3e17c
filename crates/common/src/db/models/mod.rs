//! SeaORM entity models

mod chunk;

pub use chunk::{
    format_vector, parse_vector,
    ActiveModel as ChunkActiveModel,
    Column as ChunkColumn,
    Entity as ChunkEntity,
    Model as Chunk,
};
