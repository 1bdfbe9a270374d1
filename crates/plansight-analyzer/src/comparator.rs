//! Plan comparator
//!
//! Compares two analyzed plans: plan-wide statistics side by side, and,
//! when node matching is enabled, every pair of nodes the similarity
//! matcher puts in correspondence.

use crate::config::{ComparisonConfig, ImprovementSense, Strictness};
use crate::explained::ExplainedPlan;
use crate::similarity::{match_rows, match_rows_where};
use crate::stats::Stats;
use crate::summary::{NodeScopes, PlanRow};
use plansight_core::{NodeId, PlanError, Result};
use serde::Serialize;

/// A numeric property of both plans
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PropComparison {
    pub original: f64,
    pub to_compare: f64,
    pub has_improved: bool,
    /// Change relative to the mean of both values; 0 when both are 0
    pub percentage_improved: f64,
}

impl PropComparison {
    pub fn new(original: f64, to_compare: f64, sense: ImprovementSense) -> Self {
        let percentage_improved = if original == 0.0 && to_compare == 0.0 {
            0.0
        } else {
            (to_compare - original) / ((original + to_compare) / 2.0) * 100.0
        };
        Self {
            original,
            to_compare,
            has_improved: sense.has_improved(original, to_compare),
            percentage_improved,
        }
    }

    fn lower_is_better(original: f64, to_compare: f64) -> Self {
        Self::new(original, to_compare, ImprovementSense::LowerIsBetter)
    }
}

/// A textual property of both plans
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropStringComparison {
    pub original: String,
    pub to_compare: String,
    pub are_same: bool,
}

impl PropStringComparison {
    pub fn new(original: &str, to_compare: &str) -> Self {
        Self {
            original: original.to_string(),
            to_compare: to_compare.to_string(),
            are_same: original == to_compare,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralStatsComparison {
    pub execution_time: PropComparison,
    pub planning_time: PropComparison,
    pub max_duration: PropComparison,
    pub max_cost: PropComparison,
    pub max_blocks_read: PropComparison,
    pub max_blocks_written: PropComparison,
    pub max_blocks_hit: PropComparison,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeScopesComparison {
    pub table: PropStringComparison,
    pub filters: PropStringComparison,
    pub index: PropStringComparison,
    pub key: PropStringComparison,
    pub method: PropStringComparison,
    pub condition: PropStringComparison,
}

impl NodeScopesComparison {
    fn new(original: &NodeScopes, to_compare: &NodeScopes) -> Self {
        Self {
            table: PropStringComparison::new(&original.table, &to_compare.table),
            filters: PropStringComparison::new(&original.filters, &to_compare.filters),
            index: PropStringComparison::new(&original.index, &to_compare.index),
            key: PropStringComparison::new(&original.key, &to_compare.key),
            method: PropStringComparison::new(&original.method, &to_compare.method),
            condition: PropStringComparison::new(&original.condition, &to_compare.condition),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowsComparison {
    pub total: PropComparison,
    pub planned_rows: PropComparison,
    pub removed: PropComparison,
    pub estimation_factor: PropComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostsComparison {
    pub startup_cost: PropComparison,
    pub total_cost: PropComparison,
    pub plan_width: PropComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuffersComparison {
    pub effective_blocks_read: PropComparison,
    pub effective_blocks_written: PropComparison,
    pub effective_blocks_hits: PropComparison,
}

/// Side-by-side view of two corresponding nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeComparison {
    pub node_id: NodeId,
    pub node_id_to_compare: NodeId,
    pub operation: String,
    pub level: usize,
    pub similarity: f64,
    pub scopes: NodeScopesComparison,
    pub inclusive: PropComparison,
    pub loops: PropComparison,
    pub exclusive: PropComparison,
    pub execution_time: PropComparison,
    pub rows: RowsComparison,
    pub costs: CostsComparison,
    /// Present only when both nodes carry buffer counters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffers: Option<BuffersComparison>,
    pub warnings: Vec<String>,
}

/// Result of comparing two plans
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub general_stats: GeneralStatsComparison,
    pub nodes: Vec<NodeComparison>,
    pub unmatched_original: Vec<NodeId>,
    pub unmatched_to_compare: Vec<NodeId>,
}

/// Compares analyzed plans according to a [`ComparisonConfig`]
#[derive(Debug, Clone, Copy)]
pub struct PlanComparator<'c> {
    config: &'c ComparisonConfig,
}

impl<'c> PlanComparator<'c> {
    pub fn new(config: &'c ComparisonConfig) -> Self {
        Self { config }
    }

    /// Compares `original` against `to_compare`
    ///
    /// In strict mode only rows with the same operation, table and level are
    /// paired; the others are reported as unmatched.
    #[tracing::instrument(skip_all, fields(match_nodes = self.config.match_nodes))]
    pub fn compare(&self, original: &ExplainedPlan, to_compare: &ExplainedPlan) -> Result<Comparison> {
        let general_stats = self.compare_general_stats(&original.stats, &to_compare.stats);

        if !self.config.match_nodes {
            return Ok(Comparison {
                general_stats,
                nodes: Vec::new(),
                unmatched_original: Vec::new(),
                unmatched_to_compare: Vec::new(),
            });
        }

        let threshold = self.config.similarity_threshold;
        let matches = match self.config.strictness {
            Strictness::Lenient => match_rows(&original.summary, &to_compare.summary, threshold),
            // incompatible pairs are never proposed, so they end up unmatched
            Strictness::Strict => match_rows_where(
                &original.summary,
                &to_compare.summary,
                threshold,
                |a, b| warnings(a, b).is_empty(),
            ),
        };

        let mut nodes = Vec::with_capacity(matches.len());
        let mut matched_original = vec![false; original.summary.len()];
        let mut matched_to_compare = vec![false; to_compare.summary.len()];
        for m in &matches {
            matched_original[m.original] = true;
            matched_to_compare[m.to_compare] = true;
            let mut comparison =
                self.compare_nodes(&original.summary[m.original], &to_compare.summary[m.to_compare])?;
            comparison.similarity = m.similarity;
            nodes.push(comparison);
        }

        let comparison = Comparison {
            general_stats,
            nodes,
            unmatched_original: unmatched(&original.summary, &matched_original),
            unmatched_to_compare: unmatched(&to_compare.summary, &matched_to_compare),
        };
        tracing::debug!(
            matched = comparison.nodes.len(),
            unmatched_original = comparison.unmatched_original.len(),
            unmatched_to_compare = comparison.unmatched_to_compare.len(),
            "plans compared"
        );
        Ok(comparison)
    }

    pub fn compare_general_stats(&self, original: &Stats, to_compare: &Stats) -> GeneralStatsComparison {
        let senses = &self.config.senses;
        GeneralStatsComparison {
            execution_time: PropComparison::new(
                original.execution_time,
                to_compare.execution_time,
                senses.execution_time,
            ),
            planning_time: PropComparison::new(
                original.planning_time,
                to_compare.planning_time,
                senses.planning_time,
            ),
            max_duration: PropComparison::new(
                original.max_duration,
                to_compare.max_duration,
                senses.max_duration,
            ),
            max_cost: PropComparison::new(original.max_cost, to_compare.max_cost, senses.max_cost),
            max_blocks_read: PropComparison::new(
                original.max_blocks_read,
                to_compare.max_blocks_read,
                senses.max_blocks_read,
            ),
            max_blocks_written: PropComparison::new(
                original.max_blocks_written,
                to_compare.max_blocks_written,
                senses.max_blocks_written,
            ),
            max_blocks_hit: PropComparison::new(
                original.max_blocks_hit,
                to_compare.max_blocks_hit,
                senses.max_blocks_hit,
            ),
        }
    }

    /// Compares two rows regardless of how they were paired
    ///
    /// In strict mode rows whose operation, table or level differ fail with
    /// [`PlanError::IncompatibleNodes`].
    pub fn compare_nodes(&self, original: &PlanRow, to_compare: &PlanRow) -> Result<NodeComparison> {
        let warnings = warnings(original, to_compare);
        if !warnings.is_empty() {
            match self.config.strictness {
                Strictness::Strict => return Err(PlanError::IncompatibleNodes(warnings.join("; "))),
                Strictness::Lenient => tracing::debug!(
                    node_id = %original.node_id,
                    node_id_to_compare = %to_compare.node_id,
                    warnings = warnings.len(),
                    "comparing dissimilar nodes"
                ),
            }
        }

        let buffers = match (&original.buffers, &to_compare.buffers) {
            (Some(a), Some(b)) => {
                let senses = &self.config.senses;
                Some(BuffersComparison {
                    effective_blocks_read: PropComparison::new(
                        a.effective_blocks_read,
                        b.effective_blocks_read,
                        senses.max_blocks_read,
                    ),
                    effective_blocks_written: PropComparison::new(
                        a.effective_blocks_written,
                        b.effective_blocks_written,
                        senses.max_blocks_written,
                    ),
                    effective_blocks_hits: PropComparison::new(
                        a.effective_blocks_hits,
                        b.effective_blocks_hits,
                        senses.max_blocks_hit,
                    ),
                })
            }
            _ => None,
        };

        Ok(NodeComparison {
            node_id: original.node_id.clone(),
            node_id_to_compare: to_compare.node_id.clone(),
            operation: original.operation.clone(),
            level: original.level,
            similarity: 0.0,
            scopes: NodeScopesComparison::new(&original.scopes, &to_compare.scopes),
            inclusive: PropComparison::lower_is_better(original.inclusive, to_compare.inclusive),
            loops: PropComparison::lower_is_better(original.loops, to_compare.loops),
            exclusive: PropComparison::lower_is_better(original.exclusive, to_compare.exclusive),
            execution_time: PropComparison::lower_is_better(
                original.execution_time,
                to_compare.execution_time,
            ),
            rows: RowsComparison {
                total: PropComparison::lower_is_better(original.rows.total, to_compare.rows.total),
                planned_rows: PropComparison::lower_is_better(
                    original.rows.planned_rows,
                    to_compare.rows.planned_rows,
                ),
                removed: PropComparison::lower_is_better(original.rows.removed, to_compare.rows.removed),
                estimation_factor: PropComparison::lower_is_better(
                    original.rows.estimation_factor,
                    to_compare.rows.estimation_factor,
                ),
            },
            costs: CostsComparison {
                startup_cost: PropComparison::lower_is_better(
                    original.costs.startup_cost,
                    to_compare.costs.startup_cost,
                ),
                total_cost: PropComparison::lower_is_better(
                    original.costs.total_cost,
                    to_compare.costs.total_cost,
                ),
                plan_width: PropComparison::lower_is_better(
                    original.costs.plan_width,
                    to_compare.costs.plan_width,
                ),
            },
            buffers,
            warnings,
        })
    }
}

fn warnings(original: &PlanRow, to_compare: &PlanRow) -> Vec<String> {
    let mut warnings = Vec::new();
    if original.operation != to_compare.operation {
        warnings.push(format!(
            "Nodes contains different operation type: {}, {}",
            original.operation, to_compare.operation
        ));
    }
    if original.scopes.table != to_compare.scopes.table {
        warnings.push(format!(
            "Nodes are acting on different tables: {}, {}",
            original.scopes.table, to_compare.scopes.table
        ));
    }
    if original.level != to_compare.level {
        warnings.push(format!(
            "Nodes are on different level: {}, {}",
            original.level, to_compare.level
        ));
    }
    warnings
}

fn unmatched(rows: &[PlanRow], matched: &[bool]) -> Vec<NodeId> {
    rows.iter()
        .zip(matched)
        .filter(|(_, matched)| !**matched)
        .map(|(row, _)| row.node_id.clone())
        .collect()
}

#[cfg(test)]
mod tests;
