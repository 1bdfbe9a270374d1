use super::*;
use crate::config::MetricSenses;
use crate::enricher::PlanEnricher;
use crate::operations::OPERATIONS;
use crate::summary::SummaryFlattener;
use plansight_core::{Counter, PlanNode, keys};
use pretty_assertions::assert_eq;

fn rows(mut root: PlanNode) -> Vec<PlanRow> {
    let ctes = PlanEnricher::default().enrich(&mut root);
    SummaryFlattener::new(&OPERATIONS, 5.0).flatten(&root, &ctes)
}

fn scan(relation: &str) -> PlanNode {
    PlanNode::new("Seq Scan")
        .with_relation(relation)
        .with_cost(0.0, 40.0)
        .with_actual_time(0.0, 2.0, 1.0)
        .with_rows(10.0, 10.0)
}

#[test]
fn test_prop_comparison_percentage_is_relative_to_mean() {
    let comparison = PropComparison::new(30.0, 10.0, ImprovementSense::LowerIsBetter);

    assert_eq!(
        comparison,
        PropComparison {
            original: 30.0,
            to_compare: 10.0,
            has_improved: true,
            percentage_improved: -100.0,
        }
    );
}

#[test]
fn test_prop_comparison_is_symmetric() {
    let forward = PropComparison::new(4.0, 12.0, ImprovementSense::LowerIsBetter);
    let backward = PropComparison::new(12.0, 4.0, ImprovementSense::LowerIsBetter);

    assert_eq!(forward.percentage_improved, 100.0);
    assert_eq!(backward.percentage_improved, -100.0);
    assert!(!forward.has_improved);
    assert!(backward.has_improved);
}

#[test]
fn test_prop_comparison_of_zeros() {
    let comparison = PropComparison::new(0.0, 0.0, ImprovementSense::HigherIsBetter);
    assert_eq!(comparison.percentage_improved, 0.0);
    assert!(!comparison.has_improved);

    // one side zero is still a finite change
    let comparison = PropComparison::new(0.0, 5.0, ImprovementSense::HigherIsBetter);
    assert_eq!(comparison.percentage_improved, 200.0);
    assert!(comparison.has_improved);
}

#[test]
fn test_string_comparison() {
    assert!(PropStringComparison::new("(id = 1)", "(id = 1)").are_same);
    assert!(!PropStringComparison::new("(id = 1)", "").are_same);
}

#[test]
fn test_general_stats_follow_configured_senses() {
    let original = Stats {
        execution_time: 10.0,
        max_blocks_hit: 100.0,
        max_blocks_read: 50.0,
        ..Stats::default()
    };
    let to_compare = Stats {
        execution_time: 8.0,
        max_blocks_hit: 80.0,
        max_blocks_read: 60.0,
        ..Stats::default()
    };

    let defaults = ComparisonConfig::default();
    let general = PlanComparator::new(&defaults).compare_general_stats(&original, &to_compare);
    assert!(general.execution_time.has_improved);
    assert!(!general.max_blocks_hit.has_improved);
    assert!(!general.max_blocks_read.has_improved);

    let inverted = ComparisonConfig {
        senses: MetricSenses {
            max_blocks_hit: ImprovementSense::LowerIsBetter,
            max_blocks_read: ImprovementSense::HigherIsBetter,
            ..MetricSenses::default()
        },
        ..ComparisonConfig::default()
    };
    let general = PlanComparator::new(&inverted).compare_general_stats(&original, &to_compare);
    assert!(general.max_blocks_hit.has_improved);
    assert!(general.max_blocks_read.has_improved);
}

#[test]
fn test_compare_identical_nodes() {
    let original = rows(scan("users").with_extra(keys::FILTER, "(active)"));
    let to_compare = rows(scan("users").with_extra(keys::FILTER, "(active)"));

    let config = ComparisonConfig::default();
    let comparison = PlanComparator::new(&config)
        .compare_nodes(&original[0], &to_compare[0])
        .unwrap();

    assert!(comparison.warnings.is_empty());
    assert!(comparison.scopes.table.are_same);
    assert!(comparison.scopes.filters.are_same);
    assert_eq!(comparison.inclusive.percentage_improved, 0.0);
    assert_eq!(comparison.execution_time.original, 5.0);
    assert_eq!(comparison.costs.total_cost.original, 40.0);
    assert_eq!(comparison.buffers, None);
}

#[test]
fn test_mismatched_nodes_warn_when_lenient() {
    let original = rows(scan("users"));
    let to_compare = rows(
        PlanNode::new("Limit").with_child(
            PlanNode::new("Index Scan")
                .with_relation("orders")
                .with_index("orders_pkey"),
        ),
    );

    let config = ComparisonConfig::default();
    let comparison = PlanComparator::new(&config)
        .compare_nodes(&original[0], &to_compare[1])
        .unwrap();

    assert_eq!(
        comparison.warnings,
        vec![
            "Nodes contains different operation type: Seq Scan, Index Scan".to_string(),
            "Nodes are acting on different tables: users, orders".to_string(),
            "Nodes are on different level: 0, 1".to_string(),
        ]
    );
    assert_eq!(comparison.operation, "Seq Scan");
    assert_eq!(comparison.node_id_to_compare, NodeId::from("2"));
}

#[test]
fn test_mismatched_nodes_fail_when_strict() {
    let original = rows(scan("users"));
    let to_compare = rows(scan("orders"));

    let config = ComparisonConfig {
        strictness: Strictness::Strict,
        ..ComparisonConfig::default()
    };
    let result = PlanComparator::new(&config).compare_nodes(&original[0], &to_compare[0]);

    match result {
        Err(PlanError::IncompatibleNodes(message)) => {
            assert_eq!(message, "Nodes are acting on different tables: users, orders");
        }
        other => panic!("expected IncompatibleNodes, got {other:?}"),
    }
}

#[test]
fn test_buffers_compared_only_when_both_sides_have_them() {
    let with_buffers = rows(
        scan("users")
            .with_counter(Counter::SharedHit, 12.0)
            .with_counter(Counter::SharedRead, 4.0),
    );
    let also_with_buffers = rows(scan("users").with_counter(Counter::SharedHit, 16.0));
    let without_buffers = rows(scan("users"));

    let config = ComparisonConfig::default();
    let comparator = PlanComparator::new(&config);

    let comparison = comparator
        .compare_nodes(&with_buffers[0], &also_with_buffers[0])
        .unwrap();
    let buffers = comparison.buffers.unwrap();
    assert_eq!(buffers.effective_blocks_hits.original, 12.0);
    assert_eq!(buffers.effective_blocks_hits.to_compare, 16.0);
    assert!(buffers.effective_blocks_hits.has_improved);
    assert!(buffers.effective_blocks_read.has_improved);

    let comparison = comparator
        .compare_nodes(&with_buffers[0], &without_buffers[0])
        .unwrap();
    assert_eq!(comparison.buffers, None);
}
