use super::*;
use plansight_core::keys;
use pretty_assertions::assert_eq;

fn enrich(root: &mut PlanNode) -> CteIndex {
    PlanEnricher::default().enrich(root)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Hash Join over a Seq Scan and a Hash/Seq Scan pair, all single loop
fn join_plan() -> PlanNode {
    PlanNode::new("Hash Join")
        .with_actual_time(0.5, 10.0, 1.0)
        .with_rows(100.0, 150.0)
        .with_counter(Counter::SharedHit, 40.0)
        .with_counter(Counter::SharedRead, 10.0)
        .with_child(
            PlanNode::new("Seq Scan")
                .with_relation("orders")
                .with_actual_time(0.1, 4.0, 1.0)
                .with_rows(1000.0, 150.0)
                .with_counter(Counter::SharedHit, 25.0)
                .with_counter(Counter::SharedRead, 10.0),
        )
        .with_child(
            PlanNode::new("Hash")
                .with_actual_time(3.0, 3.0, 1.0)
                .with_counter(Counter::SharedHit, 10.0)
                .with_child(
                    PlanNode::new("Seq Scan")
                        .with_relation("users")
                        .with_actual_time(0.1, 2.5, 1.0)
                        .with_counter(Counter::SharedHit, 10.0),
                ),
        )
}

#[test]
fn test_ids_are_assigned_in_pre_order() {
    let mut root = join_plan();
    enrich(&mut root);

    let ids: Vec<_> = root
        .iter()
        .map(|n| n.id().map(|id| id.to_string()).unwrap_or_default())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
}

#[test]
fn test_exclusive_duration_conserves_inclusive_time() {
    let mut root = join_plan();
    enrich(&mut root);

    let exclusive: Vec<_> = root.iter().map(|n| n.analysis.exclusive_duration).collect();
    assert!(close(exclusive[0], 3.0));
    assert!(close(exclusive[1], 4.0));
    assert!(close(exclusive[2], 0.5));
    assert!(close(exclusive[3], 2.5));

    let total: f64 = exclusive.iter().sum();
    assert!(close(total, root.analysis.actual_total_time));
}

#[test]
fn test_exclusive_duration_is_clamped() {
    let mut root = PlanNode::new("Limit")
        .with_actual_time(0.0, 1.0, 1.0)
        .with_child(PlanNode::new("Seq Scan").with_actual_time(0.0, 5.0, 1.0));
    enrich(&mut root);

    assert_eq!(root.analysis.exclusive_duration, 0.0);
    assert_eq!(root.children[0].analysis.exclusive_duration, 5.0);
}

#[test]
fn test_sub_plans_are_excluded_from_parent_duration() {
    let mut root = PlanNode::new("Seq Scan")
        .with_actual_time(0.0, 10.0, 1.0)
        .with_child(
            PlanNode::new("Index Scan")
                .with_relationship(keys::SUB_PLAN, Some("SubPlan 1"))
                .with_actual_time(0.0, 0.01, 600.0)
                .with_counter(Counter::SharedHit, 1800.0),
        )
        .with_counter(Counter::SharedHit, 1900.0);
    enrich(&mut root);

    assert_eq!(root.analysis.exclusive_duration, 10.0);
    assert_eq!(root.analysis.exclusive_buffers.shared_hit, Some(1900.0));

    let sub = &root.children[0];
    assert!(close(sub.analysis.actual_total_time, 6.0));
    assert_eq!(sub.analysis.sub_plan_of.as_deref(), Some("SubPlan 1"));
    assert_eq!(root.analysis.sub_plan_of, None);
}

#[test]
fn test_exclusive_buffers_subtract_direct_children() {
    let mut root = join_plan();
    enrich(&mut root);

    let hits: Vec<_> = root
        .iter()
        .map(|n| n.analysis.exclusive_buffers.shared_hit)
        .collect();
    assert_eq!(hits, vec![Some(5.0), Some(25.0), Some(0.0), Some(10.0)]);

    assert_eq!(root.analysis.exclusive_buffers.shared_read, Some(0.0));
    // the Hash node never reported reads, so it gets no exclusive value
    assert_eq!(root.children[1].analysis.exclusive_buffers.shared_read, None);

    // blocks conserve: the exclusive sum equals the root's inclusive value
    let total_hits: f64 = root
        .iter()
        .map(|n| n.analysis.exclusive_buffers.value(Counter::SharedHit))
        .sum();
    assert_eq!(total_hits, 40.0);
    assert_eq!(root.analysis.exclusive_buffers.blocks_hit(), 5.0);
}

#[test]
fn test_planner_estimate() {
    let mut root = join_plan();
    enrich(&mut root);

    assert_eq!(
        root.analysis.planner_estimate_direction,
        EstimateDirection::Under
    );
    assert_eq!(root.analysis.planner_estimate_factor, 1.5);

    let orders = &root.children[0];
    assert_eq!(
        orders.analysis.planner_estimate_direction,
        EstimateDirection::Over
    );
    assert!(close(orders.analysis.planner_estimate_factor, 1000.0 / 150.0));

    let hash = &root.children[1];
    assert_eq!(
        hash.analysis.planner_estimate_direction,
        EstimateDirection::None
    );
    assert_eq!(hash.analysis.planner_estimate_factor, 0.0);
}

#[test]
fn test_planner_estimate_with_zero_actual_rows() {
    let mut root = PlanNode::new("Index Scan").with_rows(1.0, 0.0);
    enrich(&mut root);

    // 1 / 0 is infinite and is reported as 0
    assert_eq!(
        root.analysis.planner_estimate_direction,
        EstimateDirection::Over
    );
    assert_eq!(root.analysis.planner_estimate_factor, 0.0);
}

#[test]
fn test_parallel_workers_normalize_time_and_rows() {
    let mut gather = PlanNode::new("Gather")
        .with_actual_time(0.5, 30.0, 1.0)
        .with_rows(3000.0, 3000.0)
        .with_child(
            PlanNode::new("Seq Scan")
                .with_actual_time(0.1, 27.0, 3.0)
                .with_rows(1000.0, 1000.0)
                .with_child(PlanNode::new("Result").with_actual_time(0.0, 3.0, 3.0)),
        );
    gather.workers_planned = Some(2.0);
    enrich(&mut gather);

    assert_eq!(gather.analysis.workers_planned_by_gather, None);
    assert_eq!(gather.analysis.actual_total_time, 30.0);

    let scan = &gather.children[0];
    assert_eq!(scan.analysis.workers_planned_by_gather, Some(2.0));
    // 27 ms per loop, 3 loops shared by the leader and 2 workers
    assert!(close(scan.analysis.actual_total_time, 27.0));
    assert!(close(scan.analysis.actual_startup_time, 0.1));
    // more than one worker: rows already cover every loop
    assert_eq!(scan.analysis.actual_rows_revised, 1000.0);

    // the grandchild inherits the worker count through its parent
    let result = &scan.children[0];
    assert_eq!(result.analysis.workers_planned_by_gather, Some(2.0));
    assert!(close(result.analysis.actual_total_time, 3.0));
}

#[test]
fn test_sub_plans_do_not_inherit_workers() {
    let mut gather = PlanNode::new("Gather").with_child(
        PlanNode::new("Result").with_relationship(keys::INIT_PLAN, Some("InitPlan 1 (returns $0)")),
    );
    gather.workers_planned = Some(4.0);
    enrich(&mut gather);

    assert_eq!(gather.children[0].analysis.workers_planned_by_gather, None);
}

#[test]
fn test_rows_are_revised_by_loops() {
    let mut root = PlanNode::new("Index Scan")
        .with_actual_time(0.0, 0.02, 50.0)
        .with_rows(2.0, 1.0);
    root.rows_removed_by_filter = Some(3.0);
    enrich(&mut root);

    assert_eq!(root.analysis.actual_rows_revised, 50.0);
    assert_eq!(root.analysis.plan_rows_revised, 100.0);
    assert_eq!(root.analysis.rows_removed_by_filter_revised, 150.0);
    assert_eq!(root.analysis.rows_removed_by_join_filter_revised, 0.0);
    assert!(close(root.analysis.actual_total_time, 1.0));
}

#[test]
fn test_missing_actuals_default_to_zero() {
    let mut root = PlanNode::new("Seq Scan").with_cost(0.0, 35.5);
    enrich(&mut root);

    assert_eq!(root.analysis.actual_total_time, 0.0);
    assert_eq!(root.analysis.exclusive_duration, 0.0);
    assert_eq!(root.analysis.actual_rows_revised, 0.0);
    assert!(root.analysis.exclusive_buffers.is_empty());
}

#[test]
fn test_cte_topology() {
    //  Hash Join
    //  ├── CTE a (InitPlan)
    //  │   └── CTE b (InitPlan, nested)
    //  ├── CTE Scan on a
    //  └── Seq Scan
    let mut root = PlanNode::new("Hash Join")
        .with_child(
            PlanNode::new("Seq Scan")
                .with_relationship(keys::INIT_PLAN, Some("CTE a"))
                .with_child(
                    PlanNode::new("Seq Scan").with_relationship(keys::INIT_PLAN, Some("CTE b")),
                ),
        )
        .with_child(PlanNode::new("CTE Scan"))
        .with_child(PlanNode::new("Seq Scan"));

    let ctes = enrich(&mut root);

    assert_eq!(ctes.names().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(ctes.get("a").map(NodeId::as_str), Some("2"));
    assert_eq!(ctes.get("b").map(NodeId::as_str), Some("3"));
    assert_eq!(ctes.len(), 2);

    let a = &root.children[0];
    assert!(a.analysis.is_cte_root);
    assert_eq!(a.analysis.cte_subplan_of.as_deref(), Some("a"));

    let b = &a.children[0];
    assert!(b.analysis.is_cte_root);
    assert_eq!(b.analysis.cte_subplan_of.as_deref(), Some("b"));
    assert_eq!(b.analysis.sub_plan_of.as_deref(), Some("CTE b"));

    assert!(!root.children[1].analysis.is_cte_root);
    assert_eq!(root.children[1].analysis.cte_subplan_of, None);
    assert_eq!(root.analysis.cte_subplan_of, None);
}

#[test]
fn test_cte_members_inherit_membership() {
    let mut root = PlanNode::new("CTE Scan").with_child(
        PlanNode::new("Sort")
            .with_relationship(keys::INIT_PLAN, Some("CTE recent"))
            .with_child(PlanNode::new("Seq Scan").with_relationship("Outer", None)),
    );
    enrich(&mut root);

    let member = &root.children[0].children[0];
    assert!(!member.analysis.is_cte_root);
    assert_eq!(member.analysis.cte_subplan_of.as_deref(), Some("recent"));
    assert_eq!(member.analysis.sub_plan_of.as_deref(), Some("CTE recent"));
}
