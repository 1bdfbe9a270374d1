//! Stats Aggregator
//!
//! Computes plan-wide maxima, flags the costliest, largest and slowest
//! nodes, and rolls exclusive time up per index, per table and per
//! operator type.

use indexmap::IndexMap;
use plansight_core::{NodeId, PlanDocument, PlanNode, keys};
use serde::Serialize;

/// Plan-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub execution_time: f64,
    pub planning_time: f64,
    pub max_rows: f64,
    pub max_duration: f64,
    pub max_cost: f64,
    pub max_blocks_read: f64,
    pub max_blocks_written: f64,
    pub max_blocks_hit: f64,
}

/// A node contributing to a roll-up group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMember {
    pub id: Option<NodeId>,
    #[serde(rename = "type")]
    pub node_type: String,
    pub exclusive_time: f64,
    /// Index condition, reported for index groups only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Exclusive time grouped under one name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub name: String,
    pub total_time: f64,
    /// Share of the execution time; absent for plans without timing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub nodes: Vec<GroupMember>,
}

pub type IndexStats = GroupStats;
pub type TableStats = GroupStats;
pub type NodeTypeStats = GroupStats;

/// Computes [`Stats`] and roll-ups over an enriched plan
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsAggregator {
    execution_time: f64,
    planning_time: f64,
}

impl StatsAggregator {
    pub fn new(execution_time: f64, planning_time: f64) -> Self {
        Self {
            execution_time,
            planning_time,
        }
    }

    pub fn for_document(document: &PlanDocument) -> Self {
        Self::new(document.execution_time, document.planning_time)
    }

    /// Computes plan-wide maxima and sets the outlier flags on `root`
    pub fn compute_stats(&self, root: &mut PlanNode) -> Stats {
        let mut stats = Stats {
            execution_time: self.execution_time,
            planning_time: self.planning_time,
            ..Stats::default()
        };

        for node in root.iter() {
            stats.max_rows = stats.max_rows.max(node.analysis.actual_rows_revised);
            stats.max_cost = stats.max_cost.max(node.total_cost.unwrap_or(0.0));
            stats.max_duration = stats.max_duration.max(node.analysis.exclusive_duration);
            stats.max_blocks_read = stats.max_blocks_read.max(node.buffers.blocks_read());
            stats.max_blocks_written = stats.max_blocks_written.max(node.buffers.blocks_written());
            stats.max_blocks_hit = stats.max_blocks_hit.max(node.buffers.blocks_hit());
        }

        let outliers = Outliers {
            costliest: first_reaching(root, stats.max_cost, |n| n.total_cost.unwrap_or(0.0)),
            largest: first_reaching(root, stats.max_rows, |n| n.analysis.actual_rows_revised),
            slowest: first_reaching(root, stats.max_duration, |n| n.analysis.exclusive_duration),
        };
        let mut position = 0;
        flag_outliers(root, &outliers, &mut position);

        tracing::debug!(
            max_rows = stats.max_rows,
            max_cost = stats.max_cost,
            max_duration = stats.max_duration,
            "computed plan statistics"
        );
        stats
    }

    /// Exclusive time per index name
    pub fn indexes_stats(&self, root: &PlanNode) -> Vec<IndexStats> {
        self.group_by(root, |node| node.index_name.clone(), |node| {
            node.extra_str(keys::INDEX_COND).map(String::from)
        })
    }

    /// Exclusive time per relation name
    pub fn tables_stats(&self, root: &PlanNode) -> Vec<TableStats> {
        self.group_by(root, |node| node.relation_name.clone(), |_| None)
    }

    /// Exclusive time per operator type
    pub fn nodes_stats(&self, root: &PlanNode) -> Vec<NodeTypeStats> {
        self.group_by(root, |node| Some(node.node_type.clone()), |_| None)
    }

    fn group_by(
        &self,
        root: &PlanNode,
        name_of: impl Fn(&PlanNode) -> Option<String>,
        condition_of: impl Fn(&PlanNode) -> Option<String>,
    ) -> Vec<GroupStats> {
        let mut groups: IndexMap<String, GroupStats> = IndexMap::new();
        for node in root.iter() {
            let Some(name) = name_of(node) else {
                continue;
            };
            let group = groups.entry(name.clone()).or_insert_with(|| GroupStats {
                name,
                total_time: 0.0,
                percentage: None,
                nodes: Vec::new(),
            });
            let exclusive_time = node.analysis.exclusive_duration;
            group.total_time += exclusive_time;
            group.nodes.push(GroupMember {
                id: node.id().cloned(),
                node_type: node.node_type.clone(),
                exclusive_time,
                condition: condition_of(node),
            });
        }

        let mut groups: Vec<GroupStats> = groups.into_values().collect();
        // estimate-only plans have no execution time to relate to
        if self.execution_time != 0.0 {
            for group in &mut groups {
                group.percentage = Some(group.total_time / self.execution_time * 100.0);
            }
        }
        groups.sort_by(|a, b| b.total_time.total_cmp(&a.total_time));
        groups
    }
}

/// Pre-order positions of the flagged nodes
#[derive(Debug, Default)]
struct Outliers {
    costliest: Option<usize>,
    largest: Option<usize>,
    slowest: Option<usize>,
}

/// Pre-order position of the first node whose metric equals `max`;
/// nothing is flagged when the maximum is zero
fn first_reaching(root: &PlanNode, max: f64, metric: impl Fn(&PlanNode) -> f64) -> Option<usize> {
    if max <= 0.0 {
        return None;
    }
    root.iter().position(|node| metric(node) == max)
}

fn flag_outliers(node: &mut PlanNode, outliers: &Outliers, position: &mut usize) {
    let current = Some(*position);
    node.analysis.is_costliest = outliers.costliest == current;
    node.analysis.is_largest = outliers.largest == current;
    node.analysis.is_slowest = outliers.slowest == current;
    *position += 1;

    for child in &mut node.children {
        flag_outliers(child, outliers, position);
    }
}

#[cfg(test)]
mod tests;
