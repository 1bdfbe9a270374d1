//! Error types for plansight

use thiserror::Error;

/// Core error type for plan ingestion, analysis and comparison
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("EXPLAIN output contains no plan entries")]
    EmptyDocument,

    #[error("Missing Plan object in EXPLAIN output")]
    MissingPlan,

    #[error("Invalid plan structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid numeric value for {key:?}: {value}")]
    InvalidNumber { key: String, value: String },

    #[error("Nodes cannot be compared: {0}")]
    IncompatibleNodes(String),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}

/// Result type alias for plansight operations
pub type Result<T> = std::result::Result<T, PlanError>;
