//! Summary Flattener
//!
//! Turns an enriched plan tree into an ordered table with one [`PlanRow`]
//! per node. CTE definitions are detached from their physical parent and
//! shown under the first `CTE Scan` that reads them.

use crate::enricher::CteIndex;
use crate::operations::{
    NodeProperty, OperationSpec, OperationTable, RowsRemovedSource, WorkerRow, operation_name,
};
use indexmap::IndexMap;
use plansight_core::{BufferCounters, Counter, NodeId, PlanNode};
use serde::Serialize;
use std::collections::HashMap;

const CTE_SCAN: &str = "CTE Scan";

/// Scope strings describing what an operator works on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeScopes {
    pub table: String,
    pub filters: String,
    pub index: String,
    pub key: String,
    pub method: String,
    pub condition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Costs {
    pub startup_cost: f64,
    pub total_cost: f64,
    pub plan_width: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rows {
    /// Actual rows across all loops
    pub total: f64,
    /// Actual rows per loop, as reported
    pub total_per_node: f64,
    pub planned_rows: f64,
    pub removed: f64,
    pub estimation_factor: f64,
    pub estimation_direction: String,
}

/// Inclusive and exclusive block counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Buffers {
    pub reads: f64,
    pub written: f64,
    pub hits: f64,
    pub dirtied: f64,
    pub local_reads: f64,
    pub local_written: f64,
    pub local_hits: f64,
    pub local_dirtied: f64,
    pub temp_reads: f64,
    pub temp_written: f64,
    pub io_read_time: f64,
    pub io_write_time: f64,

    pub exclusive_reads: f64,
    pub exclusive_written: f64,
    pub exclusive_hits: f64,
    pub exclusive_dirtied: f64,
    pub exclusive_local_reads: f64,
    pub exclusive_local_written: f64,
    pub exclusive_local_hits: f64,
    pub exclusive_local_dirtied: f64,
    pub exclusive_temp_reads: f64,
    pub exclusive_temp_written: f64,

    pub effective_blocks_read: f64,
    pub effective_blocks_written: f64,
    pub effective_blocks_hits: f64,
}

impl Buffers {
    fn new(inclusive: &BufferCounters, exclusive: &BufferCounters) -> Self {
        Self {
            reads: inclusive.value(Counter::SharedRead),
            written: inclusive.value(Counter::SharedWritten),
            hits: inclusive.value(Counter::SharedHit),
            dirtied: inclusive.value(Counter::SharedDirtied),
            local_reads: inclusive.value(Counter::LocalRead),
            local_written: inclusive.value(Counter::LocalWritten),
            local_hits: inclusive.value(Counter::LocalHit),
            local_dirtied: inclusive.value(Counter::LocalDirtied),
            temp_reads: inclusive.value(Counter::TempRead),
            temp_written: inclusive.value(Counter::TempWritten),
            io_read_time: inclusive.value(Counter::IoReadTime),
            io_write_time: inclusive.value(Counter::IoWriteTime),

            exclusive_reads: exclusive.value(Counter::SharedRead),
            exclusive_written: exclusive.value(Counter::SharedWritten),
            exclusive_hits: exclusive.value(Counter::SharedHit),
            exclusive_dirtied: exclusive.value(Counter::SharedDirtied),
            exclusive_local_reads: exclusive.value(Counter::LocalRead),
            exclusive_local_written: exclusive.value(Counter::LocalWritten),
            exclusive_local_hits: exclusive.value(Counter::LocalHit),
            exclusive_local_dirtied: exclusive.value(Counter::LocalDirtied),
            exclusive_temp_reads: exclusive.value(Counter::TempRead),
            exclusive_temp_written: exclusive.value(Counter::TempWritten),

            effective_blocks_read: exclusive.blocks_read(),
            effective_blocks_written: exclusive.blocks_written(),
            effective_blocks_hits: exclusive.blocks_hit(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Workers {
    pub launched: f64,
    pub planned: f64,
}

/// One line of the flattened plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRow {
    pub node_id: NodeId,
    /// Logical parent: the referencing `CTE Scan` for CTE definitions
    pub node_parent_id: Option<NodeId>,
    pub operation: String,
    pub node_type: String,
    pub level: usize,
    pub scopes: NodeScopes,
    pub inclusive: f64,
    pub loops: f64,
    pub exclusive: f64,
    pub rows: Rows,
    pub costs: Costs,
    pub execution_time: f64,
    /// Present only when the plan was captured with `BUFFERS`
    pub buffers: Option<Buffers>,
    pub workers: Workers,
    pub properties: Vec<NodeProperty>,
    pub worker_rows: Vec<WorkerRow>,
    pub is_costliest: bool,
    pub is_largest: bool,
    pub is_slowest: bool,
    /// Sub-plan or CTE this row runs under
    pub sub_plan_of: Option<String>,
    pub cte_subplan_of: Option<String>,
}

/// A CTE definition waiting for its reference to be emitted
struct Deferred<'a> {
    name: String,
    node: &'a PlanNode,
    physical_parent: Option<NodeId>,
    physical_level: usize,
}

/// Produces [`PlanRow`]s from an enriched plan
pub struct SummaryFlattener<'t> {
    operations: &'t OperationTable,
    execution_time: f64,
}

impl<'t> SummaryFlattener<'t> {
    pub fn new(operations: &'t OperationTable, execution_time: f64) -> Self {
        Self {
            operations,
            execution_time,
        }
    }

    /// Flattens `root` in pre-order and reattaches CTE definitions
    #[tracing::instrument(skip_all, fields(ctes = ctes.len()))]
    pub fn flatten(&self, root: &PlanNode, ctes: &CteIndex) -> Vec<PlanRow> {
        let mut walk = Walk {
            flattener: self,
            contains_buffers: root.iter().any(|n| n.buffers.shared_hit.is_some()),
            rows: Vec::with_capacity(root.node_count()),
            references: IndexMap::new(),
            deferred: Vec::new(),
            next_fallback_id: 0,
        };

        walk.visit(root, 0, None);

        let positions: HashMap<&str, usize> =
            ctes.names().enumerate().map(|(i, name)| (name, i)).collect();
        let rank = |name: &str| positions.get(name).copied().unwrap_or(usize::MAX);

        // Definitions are placed in CTE index order; placing one may reveal
        // references to CTEs defined inside it, so re-scan after each
        while !walk.deferred.is_empty() {
            let mut pending: Vec<usize> = (0..walk.deferred.len()).collect();
            pending.sort_by_key(|&i| rank(&walk.deferred[i].name));

            let resolved = pending.iter().find_map(|&i| {
                walk.references
                    .get(&walk.deferred[i].name)
                    .map(|(parent, level)| (i, parent.clone(), *level))
            });

            match resolved {
                Some((index, parent, level)) => {
                    let cte = walk.deferred.remove(index);
                    walk.visit(cte.node, level + 1, Some(parent));
                }
                None => {
                    let cte = walk.deferred.remove(pending[0]);
                    tracing::debug!(cte = %cte.name, "CTE is never scanned, keeping physical parent");
                    walk.visit(cte.node, cte.physical_level, cte.physical_parent);
                }
            }
        }

        tracing::debug!(rows = walk.rows.len(), "plan flattened");
        walk.rows
    }

    fn row(
        &self,
        node: &PlanNode,
        id: NodeId,
        level: usize,
        parent: Option<NodeId>,
        contains_buffers: bool,
    ) -> PlanRow {
        let spec = self.operations.get(&node.node_type);
        if !self.operations.contains(&node.node_type) {
            tracing::trace!(node_type = %node.node_type, "using default operation entry");
        }
        let analysis = &node.analysis;

        let removed = match spec.rows_removed {
            RowsRemovedSource::Filter => analysis.rows_removed_by_filter_revised,
            RowsRemovedSource::JoinFilter => analysis.rows_removed_by_join_filter_revised,
        };

        PlanRow {
            node_id: id,
            node_parent_id: parent,
            operation: operation_name(node),
            node_type: node.node_type.clone(),
            level,
            scopes: scopes(node, spec),
            inclusive: analysis.actual_total_time,
            loops: node.actual_loops.unwrap_or(1.0),
            exclusive: analysis.exclusive_duration,
            rows: Rows {
                total: analysis.actual_rows_revised,
                total_per_node: node.actual_rows.unwrap_or(0.0),
                planned_rows: analysis.plan_rows_revised,
                removed,
                estimation_factor: analysis.planner_estimate_factor,
                estimation_direction: analysis.planner_estimate_direction.as_str().to_string(),
            },
            costs: Costs {
                startup_cost: node.startup_cost.unwrap_or(0.0),
                total_cost: node.total_cost.unwrap_or(0.0),
                plan_width: node.plan_width.unwrap_or(0.0),
            },
            execution_time: self.execution_time,
            buffers: contains_buffers
                .then(|| Buffers::new(&node.buffers, &analysis.exclusive_buffers)),
            workers: Workers {
                launched: node.workers_launched.unwrap_or(0.0),
                planned: node.workers_planned.unwrap_or(0.0),
            },
            properties: spec.extract_properties(node),
            worker_rows: spec.extract_workers(node),
            is_costliest: analysis.is_costliest,
            is_largest: analysis.is_largest,
            is_slowest: analysis.is_slowest,
            sub_plan_of: analysis.sub_plan_of.clone(),
            cte_subplan_of: analysis.cte_subplan_of.clone(),
        }
    }
}

/// State of one flattening run
struct Walk<'f, 't, 'a> {
    flattener: &'f SummaryFlattener<'t>,
    contains_buffers: bool,
    rows: Vec<PlanRow>,
    /// First `CTE Scan` row reading each CTE: (row id, level)
    references: IndexMap<String, (NodeId, usize)>,
    deferred: Vec<Deferred<'a>>,
    next_fallback_id: usize,
}

impl<'a> Walk<'_, '_, 'a> {
    fn visit(&mut self, node: &'a PlanNode, level: usize, parent: Option<NodeId>) {
        let id = match node.id() {
            Some(id) => id.clone(),
            None => {
                self.next_fallback_id += 1;
                NodeId::new(format!("row-{}", self.next_fallback_id))
            }
        };

        if node.node_type == CTE_SCAN
            && let Some(name) = node.cte_name.as_deref()
        {
            self.references
                .entry(name.to_string())
                .or_insert_with(|| (id.clone(), level));
        }

        let row = self
            .flattener
            .row(node, id.clone(), level, parent, self.contains_buffers);
        self.rows.push(row);

        for child in &node.children {
            if let Some(name) = child.cte_definition() {
                self.deferred.push(Deferred {
                    name: name.to_string(),
                    node: child,
                    physical_parent: Some(id.clone()),
                    physical_level: level + 1,
                });
                continue;
            }
            self.visit(child, level + 1, Some(id.clone()));
        }
    }
}

/// Renders the scope slots configured for the node's operator
fn scopes(node: &PlanNode, spec: &OperationSpec) -> NodeScopes {
    let render = |key: Option<&'static str>| {
        key.and_then(|key| node.scope_value(key))
            .map(|value| value.render())
            .unwrap_or_default()
    };
    NodeScopes {
        table: render(spec.table),
        filters: render(spec.filters),
        index: render(spec.index),
        key: render(spec.key),
        method: render(spec.method),
        condition: render(spec.condition),
    }
}
