//! Plansight Analyzer - enrichment, statistics and comparison of execution plans
//!
//! This crate provides functionality for:
//! - Deriving exclusive timings, buffers and row estimates for every node
//! - Flattening a plan into display rows with CTEs under their scans
//! - Plan-wide maxima, outlier flags and per index/table/operator roll-ups
//! - Comparing two plans, with weighted-similarity node matching

pub mod comparator;
pub mod config;
pub mod enricher;
pub mod explained;
pub mod operations;
pub mod similarity;
pub mod stats;
pub mod summary;

pub use comparator::*;
pub use config::*;
pub use enricher::*;
pub use explained::*;
pub use operations::{OPERATIONS, OperationSpec, OperationTable, operation_name};
pub use similarity::{NodeMatch, NodeSignature, match_rows, match_rows_where, similarity};
pub use stats::*;
pub use summary::*;

pub use plansight_core::{
    FieldIssue, IdSource, NodeId, PlanDocument, PlanError, PlanNode, RandomIds, Result,
    SequentialIds, Trigger,
};
