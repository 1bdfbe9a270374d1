//! Plan Enricher
//!
//! Annotates a plan tree in place with derived metrics:
//!
//! - planner row estimate factor and direction
//! - actual timings scaled by loops and parallel workers
//! - exclusive duration and exclusive buffer counters
//! - revised row counts
//! - CTE and sub-plan membership
//!
//! Derived values are written to [`PlanNode::analysis`]; the source
//! counters are left untouched.

use indexmap::IndexMap;
use plansight_core::{
    BufferCounters, Counter, EstimateDirection, IdSource, NodeId, PlanNode, SequentialIds,
};

/// CTE definitions in the order they were found, by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CteIndex {
    entries: IndexMap<String, NodeId>,
}

impl CteIndex {
    /// Id of the node that roots the named CTE
    pub fn get(&self, name: &str) -> Option<&NodeId> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record(&mut self, name: &str, id: NodeId) {
        // a name defined twice keeps its first definition
        self.entries.entry(name.to_string()).or_insert(id);
    }
}

/// Values a node hands down to its children
#[derive(Debug, Clone, Default)]
struct Inherited {
    workers_planned_by_gather: Option<f64>,
    cte: Option<String>,
    sub_plan: Option<String>,
}

/// Walks a plan tree and fills in [`plansight_core::NodeAnalysis`]
pub struct PlanEnricher {
    ids: Box<dyn IdSource>,
    ctes: CteIndex,
}

impl Default for PlanEnricher {
    fn default() -> Self {
        Self::new(Box::new(SequentialIds::new()))
    }
}

impl PlanEnricher {
    pub fn new(ids: Box<dyn IdSource>) -> Self {
        Self {
            ids,
            ctes: CteIndex::default(),
        }
    }

    /// Enriches the tree rooted at `root` and returns the CTE definitions
    #[tracing::instrument(skip_all, fields(root = %root.node_type))]
    pub fn enrich(mut self, root: &mut PlanNode) -> CteIndex {
        self.process(root, Inherited::default());
        tracing::debug!(
            nodes = root.node_count(),
            ctes = self.ctes.len(),
            "plan enriched"
        );
        self.ctes
    }

    fn process(&mut self, node: &mut PlanNode, inherited: Inherited) {
        let id = self.ids.next_id();
        node.analysis.id = Some(id.clone());
        node.analysis.workers_planned_by_gather = inherited.workers_planned_by_gather;

        calculate_planner_estimate(node);

        if let Some(name) = node.cte_definition() {
            let name = name.to_string();
            tracing::trace!(cte = %name, %id, "found CTE definition");
            self.ctes.record(&name, id);
            node.analysis.is_cte_root = true;
            node.analysis.cte_subplan_of = Some(name);
        } else {
            node.analysis.cte_subplan_of = inherited.cte;
        }

        node.analysis.sub_plan_of = if node.is_sub_plan() {
            node.subplan_name
                .clone()
                .or_else(|| node.parent_relationship.clone())
        } else {
            inherited.sub_plan
        };

        // Only the children of a Gather-like node report per-worker
        // figures; sub-plans run outside the parallel part
        let gather_workers = node
            .workers_planned
            .or(node.analysis.workers_planned_by_gather);
        let cte = node.analysis.cte_subplan_of.clone();
        let sub_plan = node.analysis.sub_plan_of.clone();
        for child in &mut node.children {
            let workers_planned_by_gather = if child.is_sub_plan() {
                None
            } else {
                gather_workers
            };
            self.process(
                child,
                Inherited {
                    workers_planned_by_gather,
                    cte: cte.clone(),
                    sub_plan: sub_plan.clone(),
                },
            );
        }

        calculate_actuals(node);
        calculate_exclusive_buffers(node);
        revise_rows(node);
    }
}

/// Factor is max/min of planned and actual rows; direction tells which
/// side the planner erred on
fn calculate_planner_estimate(node: &mut PlanNode) {
    let analysis = &mut node.analysis;
    analysis.planner_estimate_factor = 0.0;
    analysis.planner_estimate_direction = EstimateDirection::None;

    let (Some(planned), Some(actual)) = (node.plan_rows, node.actual_rows) else {
        return;
    };

    if actual < planned {
        analysis.planner_estimate_direction = EstimateDirection::Over;
        analysis.planner_estimate_factor = planned / actual;
    } else if actual > planned {
        analysis.planner_estimate_direction = EstimateDirection::Under;
        analysis.planner_estimate_factor = actual / planned;
    }

    if !analysis.planner_estimate_factor.is_finite() {
        analysis.planner_estimate_factor = 0.0;
    }
}

/// Scales timings by loops and workers, then derives the exclusive duration
fn calculate_actuals(node: &mut PlanNode) {
    let Some(total) = node.actual_total_time else {
        node.analysis.exclusive_duration = 0.0;
        return;
    };

    let loops = node.actual_loops.unwrap_or(1.0);
    let workers = node
        .analysis
        .workers_planned_by_gather
        .map_or(1.0, |planned| planned + 1.0);

    node.analysis.actual_total_time = total * loops / workers;
    node.analysis.actual_startup_time = node
        .actual_startup_time
        .map_or(0.0, |startup| startup * loops / workers);

    let descendants: f64 = node.children.iter().map(descendant_duration).sum();
    node.analysis.exclusive_duration = (node.analysis.actual_total_time - descendants).max(0.0);
}

/// Exclusive duration of `node` and of everything below it reached
/// through regular (non sub-plan) edges
fn descendant_duration(node: &PlanNode) -> f64 {
    if node.is_sub_plan() {
        return 0.0;
    }
    node.analysis.exclusive_duration + node.children.iter().map(descendant_duration).sum::<f64>()
}

/// Buffer counters are cumulative; subtract what direct children report
fn calculate_exclusive_buffers(node: &mut PlanNode) {
    let mut exclusive = BufferCounters::default();
    for counter in Counter::ALL {
        let Some(own) = node.buffers.get(counter) else {
            continue;
        };
        let children: f64 = node
            .children
            .iter()
            .filter(|child| !child.is_sub_plan())
            .map(|child| child.buffers.value(counter))
            .sum();
        exclusive.set(counter, Some((own - children).max(0.0)));
    }
    node.analysis.exclusive_buffers = exclusive;
}

/// Row counts are reported per loop, except under more than one parallel
/// worker where they already cover the whole plan
fn revise_rows(node: &mut PlanNode) {
    let parallel = node
        .analysis
        .workers_planned_by_gather
        .is_some_and(|planned| planned > 1.0);
    let factor = if parallel {
        1.0
    } else {
        node.actual_loops.unwrap_or(1.0)
    };
    let revise = |value: Option<f64>| value.map_or(0.0, |v| v * factor);

    node.analysis.actual_rows_revised = revise(node.actual_rows);
    node.analysis.plan_rows_revised = revise(node.plan_rows);
    node.analysis.rows_removed_by_filter_revised = revise(node.rows_removed_by_filter);
    node.analysis.rows_removed_by_join_filter_revised = revise(node.rows_removed_by_join_filter);
}

#[cfg(test)]
mod tests;
