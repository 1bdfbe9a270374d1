//! Plansight Core - plan node model and EXPLAIN JSON ingestion
//!
//! This crate provides the types every plansight pass works on:
//!
//! - `PlanNode` - typed representation of one plan operator and its children
//! - `PlanDocument` - a parsed `EXPLAIN (FORMAT JSON)` document
//! - `IdSource` - pluggable node identity (`SequentialIds`, `RandomIds`)
//! - `PlanError` - the error type shared by all plansight crates
//! - `keys` - the property names used by PostgreSQL's JSON EXPLAIN output

mod document;
mod error;
mod ids;
pub mod keys;
mod node;

pub use document::*;
pub use error::*;
pub use ids::*;
pub use node::*;
