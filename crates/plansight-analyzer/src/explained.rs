//! Analysis entry points
//!
//! [`PlanAnalyzer`] runs the full pipeline on an EXPLAIN document:
//! ingestion, enrichment, statistics, and flattening. The result is an
//! [`ExplainedPlan`], which can in turn be compared with another one.
//!
//! # Examples
//!
//! ```
//! use plansight_analyzer::{AnalyzerConfig, analyze};
//!
//! let json = r#"[{
//!   "Plan": {
//!     "Node Type": "Seq Scan",
//!     "Relation Name": "users",
//!     "Total Cost": 10.0,
//!     "Actual Total Time": 0.5,
//!     "Actual Rows": 3,
//!     "Actual Loops": 1
//!   },
//!   "Execution Time": 0.6
//! }]"#;
//!
//! let explained = analyze(json, &AnalyzerConfig::default()).unwrap();
//! assert_eq!(explained.summary.len(), 1);
//! assert_eq!(explained.tables_stats[0].name, "users");
//! ```

use crate::comparator::{Comparison, PlanComparator};
use crate::config::AnalyzerConfig;
use crate::enricher::PlanEnricher;
use crate::operations::OPERATIONS;
use crate::stats::{IndexStats, NodeTypeStats, Stats, StatsAggregator, TableStats};
use crate::summary::{PlanRow, SummaryFlattener};
use plansight_core::{FieldIssue, PlanDocument, PlanNode, Result, Trigger};
use serde::Serialize;
use serde_json::Value;

/// Everything derived from one EXPLAIN document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainedPlan {
    /// The enriched tree, serialized with its source property names
    pub plan: PlanNode,
    pub summary: Vec<PlanRow>,
    pub stats: Stats,
    pub indexes_stats: Vec<IndexStats>,
    pub tables_stats: Vec<TableStats>,
    pub nodes_stats: Vec<NodeTypeStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jit: Option<Value>,
    pub triggers: Vec<Trigger>,
    pub issues: Vec<FieldIssue>,
}

/// Runs analyses and comparisons with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct PlanAnalyzer {
    config: AnalyzerConfig,
}

impl PlanAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Parses and analyzes `EXPLAIN (FORMAT JSON)` output
    #[tracing::instrument(skip_all, fields(len = json.len()))]
    pub fn analyze(&self, json: &str) -> Result<ExplainedPlan> {
        let document = PlanDocument::from_json(json)?;
        Ok(self.analyze_document(document))
    }

    /// Analyzes an already parsed document
    pub fn analyze_document(&self, document: PlanDocument) -> ExplainedPlan {
        let aggregator = StatsAggregator::for_document(&document);
        let PlanDocument {
            mut root,
            execution_time,
            planning_time,
            jit,
            triggers,
            issues,
        } = document;

        let ctes = PlanEnricher::new(self.config.ids.source()).enrich(&mut root);

        let stats = aggregator.compute_stats(&mut root);
        let indexes_stats = aggregator.indexes_stats(&root);
        let tables_stats = aggregator.tables_stats(&root);
        let nodes_stats = aggregator.nodes_stats(&root);

        let summary = SummaryFlattener::new(&OPERATIONS, execution_time).flatten(&root, &ctes);

        if !issues.is_empty() {
            tracing::warn!(issues = issues.len(), "plan analyzed with unconvertible fields");
        }
        tracing::debug!(
            nodes = summary.len(),
            execution_time,
            planning_time,
            "plan analyzed"
        );

        ExplainedPlan {
            plan: root,
            summary,
            stats,
            indexes_stats,
            tables_stats,
            nodes_stats,
            jit,
            triggers,
            issues,
        }
    }

    /// Compares two analyzed plans
    pub fn compare(&self, original: &ExplainedPlan, to_compare: &ExplainedPlan) -> Result<Comparison> {
        PlanComparator::new(&self.config.comparison).compare(original, to_compare)
    }
}

/// Analyzes one EXPLAIN document
pub fn analyze(json: &str, config: &AnalyzerConfig) -> Result<ExplainedPlan> {
    PlanAnalyzer::new(config.clone())?.analyze(json)
}

/// Analyzes two EXPLAIN documents and compares them
#[tracing::instrument(skip_all)]
pub fn compare(original: &str, to_compare: &str, config: &AnalyzerConfig) -> Result<Comparison> {
    let analyzer = PlanAnalyzer::new(config.clone())?;
    let original = analyzer.analyze(original)?;
    let to_compare = analyzer.analyze(to_compare)?;
    analyzer.compare(&original, &to_compare)
}
