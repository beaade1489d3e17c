//! Structured metadata filters
//!
//! A filter goes through two stages:
//! - [`dsl::parse`] turns the JSON document into an untyped [`FilterExpr`]
//! - [`FilterCompiler`] resolves each field's type (schema first, then
//!   sniffing the filter value), rejects operator/type mismatches, and
//!   coerces operands
//!
//! The resulting [`CompiledFilter`] evaluates records in memory and renders
//! a parameterised `WHERE` fragment for the Postgres store. Field names and
//! values are always bound, never spliced into SQL.

mod compiled;
pub mod dsl;
mod types;

pub use compiled::{CompiledFilter, FilterCompiler};
pub use dsl::{BooleanOp, Condition, FilterExpr};
pub use types::{parse_date, FieldType, MetadataSchema, Operator, Scalar};
