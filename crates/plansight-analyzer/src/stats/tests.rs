use super::*;
use crate::enricher::PlanEnricher;
use plansight_core::Counter;
use pretty_assertions::assert_eq;

fn enriched(mut root: PlanNode) -> PlanNode {
    PlanEnricher::default().enrich(&mut root);
    root
}

fn index_plan() -> PlanNode {
    enriched(
        PlanNode::new("Nested Loop")
            .with_cost(0.0, 120.0)
            .with_actual_time(0.0, 10.0, 1.0)
            .with_rows(10.0, 10.0)
            .with_counter(Counter::SharedHit, 30.0)
            .with_counter(Counter::SharedRead, 5.0)
            .with_child(
                PlanNode::new("Seq Scan")
                    .with_relation("users")
                    .with_cost(0.0, 20.0)
                    .with_actual_time(0.0, 2.0, 1.0)
                    .with_rows(10.0, 10.0)
                    .with_counter(Counter::SharedHit, 10.0),
            )
            .with_child(
                PlanNode::new("Index Scan")
                    .with_relation("orders")
                    .with_index("orders_user_id_idx")
                    .with_extra(keys::INDEX_COND, "(user_id = users.id)")
                    .with_cost(0.0, 100.0)
                    .with_actual_time(0.0, 0.5, 10.0)
                    .with_rows(5.0, 4.0)
                    .with_counter(Counter::SharedHit, 20.0)
                    .with_counter(Counter::SharedRead, 5.0)
                    .with_counter(Counter::TempWritten, 2.0),
            ),
    )
}

#[test]
fn test_compute_stats_maxima() {
    let mut root = index_plan();
    let stats = StatsAggregator::new(12.0, 0.5).compute_stats(&mut root);

    assert_eq!(
        stats,
        Stats {
            execution_time: 12.0,
            planning_time: 0.5,
            max_rows: 40.0,
            max_duration: 5.0,
            max_cost: 120.0,
            max_blocks_read: 5.0,
            max_blocks_written: 2.0,
            max_blocks_hit: 30.0,
        }
    );
}

#[test]
fn test_outlier_flags_are_unique() {
    let mut root = index_plan();
    StatsAggregator::new(12.0, 0.5).compute_stats(&mut root);

    let flagged = |pick: fn(&PlanNode) -> bool| -> Vec<String> {
        root.iter()
            .filter(|n| pick(n))
            .map(|n| n.node_type.clone())
            .collect()
    };
    assert_eq!(flagged(|n| n.analysis.is_costliest), vec!["Nested Loop"]);
    assert_eq!(flagged(|n| n.analysis.is_largest), vec!["Index Scan"]);
    assert_eq!(flagged(|n| n.analysis.is_slowest), vec!["Index Scan"]);
}

#[test]
fn test_outlier_ties_go_to_first_node_in_pre_order() {
    let mut root = enriched(
        PlanNode::new("Append")
            .with_child(PlanNode::new("Seq Scan").with_relation("a").with_cost(0.0, 50.0))
            .with_child(PlanNode::new("Seq Scan").with_relation("b").with_cost(0.0, 50.0)),
    );
    StatsAggregator::default().compute_stats(&mut root);

    let costliest: Vec<_> = root
        .iter()
        .filter(|n| n.analysis.is_costliest)
        .map(|n| n.relation_name.clone())
        .collect();
    assert_eq!(costliest, vec![Some("a".to_string())]);
}

#[test]
fn test_no_outliers_when_maximum_is_zero() {
    let mut root = enriched(PlanNode::new("Result").with_child(PlanNode::new("Result")));
    let stats = StatsAggregator::default().compute_stats(&mut root);

    assert_eq!(stats.max_duration, 0.0);
    assert!(root.iter().all(|n| {
        !n.analysis.is_costliest && !n.analysis.is_largest && !n.analysis.is_slowest
    }));
}

#[test]
fn test_roll_ups_group_and_sort_by_total_time() {
    let root = index_plan();
    let aggregator = StatsAggregator::new(10.0, 0.5);

    let tables = aggregator.tables_stats(&root);
    let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["orders", "users"]);
    assert_eq!(tables[0].total_time, 5.0);
    assert_eq!(tables[0].percentage, Some(50.0));
    assert_eq!(tables[1].percentage, Some(20.0));

    let indexes = aggregator.indexes_stats(&root);
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name, "orders_user_id_idx");
    assert_eq!(
        indexes[0].nodes,
        vec![GroupMember {
            id: Some(NodeId::from("3")),
            node_type: "Index Scan".to_string(),
            exclusive_time: 5.0,
            condition: Some("(user_id = users.id)".to_string()),
        }]
    );

    let nodes = aggregator.nodes_stats(&root);
    let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["Index Scan", "Nested Loop", "Seq Scan"]);
}

#[test]
fn test_roll_up_ties_keep_first_seen_order() {
    let root = enriched(
        PlanNode::new("Append")
            .with_child(PlanNode::new("Seq Scan").with_relation("b"))
            .with_child(PlanNode::new("Seq Scan").with_relation("a")),
    );

    let tables = StatsAggregator::default().tables_stats(&root);
    let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn test_percentage_omitted_without_execution_time() {
    let root = index_plan();
    let aggregator = StatsAggregator::new(0.0, 0.0);

    for group in aggregator
        .tables_stats(&root)
        .into_iter()
        .chain(aggregator.indexes_stats(&root))
        .chain(aggregator.nodes_stats(&root))
    {
        assert_eq!(group.percentage, None);
    }

    let json = serde_json::to_value(aggregator.tables_stats(&root)).unwrap();
    assert!(json[0].get("percentage").is_none());
}
