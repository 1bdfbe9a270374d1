//! Operation Metadata Table
//!
//! Maps each operator type (`Node Type`) to the properties that describe
//! what the operator works on (its scopes) and to the extractors that
//! surface operator-specific facts such as sort spills or hash batches.
//!
//! Operator types missing from the table use the `Default` entry.

use plansight_core::{PlanNode, keys};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Which row-removal counter is reported for an operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowsRemovedSource {
    #[default]
    Filter,
    JoinFilter,
}

/// Value of an operator-specific property
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Number(f64),
}

/// An operator-specific fact shown next to a row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeProperty {
    pub id: &'static str,
    pub name: String,
    pub value: PropertyValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

impl NodeProperty {
    fn text(id: &'static str, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            value: PropertyValue::Text(value.into()),
            unit: None,
        }
    }

    fn number(id: &'static str, name: impl Into<String>, value: f64) -> Self {
        Self {
            id,
            name: name.into(),
            value: PropertyValue::Number(value),
            unit: None,
        }
    }

    fn kilobytes(id: &'static str, name: impl Into<String>, value: f64) -> Self {
        Self {
            unit: Some("kB"),
            ..Self::number(id, name, value)
        }
    }
}

/// Figures reported by one parallel worker
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkerRow {
    pub worker_number: f64,
    pub actual_startup_time: f64,
    pub actual_total_time: f64,
    pub actual_rows: f64,
    pub actual_loops: f64,
}

pub type PropertyExtractor = fn(&PlanNode) -> Vec<NodeProperty>;
pub type WorkerExtractor = fn(&PlanNode) -> Vec<WorkerRow>;

/// Scope keys and extractors for one operator type
///
/// Each scope slot names the source property displayed for it; `None`
/// leaves the slot empty.
#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    pub table: Option<&'static str>,
    pub filters: Option<&'static str>,
    pub index: Option<&'static str>,
    pub key: Option<&'static str>,
    pub method: Option<&'static str>,
    pub condition: Option<&'static str>,
    pub rows_removed: RowsRemovedSource,
    pub properties: Option<PropertyExtractor>,
    pub workers: WorkerExtractor,
}

impl OperationSpec {
    pub const fn new() -> Self {
        Self {
            table: None,
            filters: None,
            index: None,
            key: None,
            method: None,
            condition: None,
            rows_removed: RowsRemovedSource::Filter,
            properties: None,
            workers: worker_rows,
        }
    }

    pub const fn table(mut self, key: &'static str) -> Self {
        self.table = Some(key);
        self
    }

    pub const fn filters(mut self, key: &'static str) -> Self {
        self.filters = Some(key);
        self
    }

    pub const fn index(mut self, key: &'static str) -> Self {
        self.index = Some(key);
        self
    }

    pub const fn key(mut self, key: &'static str) -> Self {
        self.key = Some(key);
        self
    }

    pub const fn method(mut self, key: &'static str) -> Self {
        self.method = Some(key);
        self
    }

    pub const fn condition(mut self, key: &'static str) -> Self {
        self.condition = Some(key);
        self
    }

    /// Reports `Rows Removed by Join Filter` instead of `Rows Removed by Filter`
    pub const fn join_filter_removal(mut self) -> Self {
        self.rows_removed = RowsRemovedSource::JoinFilter;
        self
    }

    pub const fn with_properties(mut self, extractor: PropertyExtractor) -> Self {
        self.properties = Some(extractor);
        self
    }

    /// Runs the registered property extractor, if any
    pub fn extract_properties(&self, node: &PlanNode) -> Vec<NodeProperty> {
        self.properties.map(|extract| extract(node)).unwrap_or_default()
    }

    pub fn extract_workers(&self, node: &PlanNode) -> Vec<WorkerRow> {
        (self.workers)(node)
    }
}

impl Default for OperationSpec {
    fn default() -> Self {
        Self::new()
    }
}

/// Lookup table from operator type to [`OperationSpec`]
#[derive(Debug, Clone)]
pub struct OperationTable {
    entries: HashMap<&'static str, OperationSpec>,
    fallback: OperationSpec,
}

impl OperationTable {
    pub fn new(fallback: OperationSpec) -> Self {
        Self {
            entries: HashMap::new(),
            fallback,
        }
    }

    pub fn register(&mut self, node_type: &'static str, spec: OperationSpec) {
        self.entries.insert(node_type, spec);
    }

    /// Returns the entry for an operator type, or the `Default` entry
    pub fn get(&self, node_type: &str) -> &OperationSpec {
        self.entries.get(node_type).unwrap_or(&self.fallback)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Built-in operation table, shared read-only by every analysis
pub static OPERATIONS: LazyLock<OperationTable> = LazyLock::new(|| {
    let mut table = OperationTable::new(
        OperationSpec::new()
            .table(keys::RELATION_NAME)
            .index(keys::INDEX_NAME)
            .filters(keys::FILTER),
    );

    // Scans
    table.register(
        "Seq Scan",
        OperationSpec::new()
            .table(keys::RELATION_NAME)
            .filters(keys::FILTER),
    );
    table.register(
        "Index Scan",
        OperationSpec::new()
            .table(keys::RELATION_NAME)
            .index(keys::INDEX_NAME)
            .filters(keys::FILTER)
            .condition(keys::INDEX_COND),
    );
    table.register(
        "Index Only Scan",
        OperationSpec::new()
            .table(keys::RELATION_NAME)
            .index(keys::INDEX_NAME)
            .filters(keys::FILTER)
            .condition(keys::INDEX_COND)
            .with_properties(index_only_scan_properties),
    );
    table.register(
        "Bitmap Index Scan",
        OperationSpec::new()
            .index(keys::INDEX_NAME)
            .condition(keys::INDEX_COND),
    );
    table.register(
        "Bitmap Heap Scan",
        OperationSpec::new()
            .table(keys::RELATION_NAME)
            .filters(keys::FILTER)
            .condition(keys::RECHECK_COND)
            .with_properties(bitmap_heap_scan_properties),
    );
    table.register(
        "Tid Scan",
        OperationSpec::new()
            .table(keys::RELATION_NAME)
            .filters(keys::FILTER)
            .condition(keys::TID_COND),
    );
    table.register(
        "CTE Scan",
        OperationSpec::new()
            .table(keys::CTE_NAME)
            .filters(keys::FILTER),
    );
    table.register(
        "Function Scan",
        OperationSpec::new()
            .table(keys::FUNCTION_NAME)
            .filters(keys::FILTER),
    );

    // Joins
    table.register(
        "Hash Join",
        OperationSpec::new()
            .filters(keys::JOIN_FILTER)
            .condition(keys::HASH_COND)
            .join_filter_removal(),
    );
    table.register(
        "Merge Join",
        OperationSpec::new()
            .filters(keys::JOIN_FILTER)
            .condition(keys::MERGE_COND)
            .join_filter_removal(),
    );
    table.register(
        "Nested Loop",
        OperationSpec::new()
            .filters(keys::JOIN_FILTER)
            .join_filter_removal(),
    );
    table.register("Hash", OperationSpec::new().with_properties(hash_properties));

    // Ordering and grouping
    let sort = OperationSpec::new()
        .key(keys::SORT_KEY)
        .method(keys::SORT_METHOD)
        .with_properties(sort_properties);
    table.register("Sort", sort);
    table.register("Incremental Sort", sort);
    let aggregate = OperationSpec::new()
        .key(keys::GROUP_KEY)
        .method(keys::STRATEGY)
        .filters(keys::FILTER)
        .with_properties(aggregate_properties);
    table.register("Aggregate", aggregate);
    table.register("HashAggregate", aggregate);
    table.register("GroupAggregate", aggregate);
    table.register(
        "Group",
        OperationSpec::new()
            .key(keys::GROUP_KEY)
            .filters(keys::FILTER),
    );
    table.register(
        "Memoize",
        OperationSpec::new()
            .key(keys::CACHE_KEY)
            .with_properties(memoize_properties),
    );
    table.register(
        "SetOp",
        OperationSpec::new()
            .method(keys::STRATEGY)
            .key(keys::COMMAND),
    );
    table.register(
        "ModifyTable",
        OperationSpec::new()
            .table(keys::RELATION_NAME)
            .method(keys::OPERATION),
    );

    tracing::debug!(entries = table.len(), "operation table initialized");
    table
});

/// Display name of a node's operation
///
/// Adds the join type for non-inner joins (`Hash Left Join`), the partial
/// mode unless it is `Simple` (`Finalize Aggregate`) and `Parallel` for
/// parallel-aware nodes.
pub fn operation_name(node: &PlanNode) -> String {
    let mut name = node.node_type.clone();

    if let Some(join_type) = node.join_type.as_deref()
        && join_type != "Inner"
    {
        name = match name.strip_suffix(" Join") {
            Some(base) => format!("{base} {join_type} Join"),
            None => format!("{name} {join_type} Join"),
        };
    }

    if let Some(mode) = node.partial_mode.as_deref()
        && mode != "Simple"
    {
        name = format!("{mode} {name}");
    }

    if node.parallel_aware {
        name = format!("Parallel {name}");
    }

    name
}

fn sort_properties(node: &PlanNode) -> Vec<NodeProperty> {
    let mut props = Vec::new();
    if let Some(method) = node.extra_str(keys::SORT_METHOD) {
        props.push(NodeProperty::text("sort_method", "Sort Method", method));
    }
    if let Some(space_type) = node.extra_str(keys::SORT_SPACE_TYPE) {
        let used = node.extra_f64(keys::SORT_SPACE_USED).unwrap_or(0.0);
        props.push(NodeProperty::kilobytes("sort_space", space_type, used));
    }
    props
}

fn hash_properties(node: &PlanNode) -> Vec<NodeProperty> {
    numeric_properties(
        node,
        &[
            ("hash_buckets", keys::HASH_BUCKETS),
            ("hash_batches", keys::HASH_BATCHES),
            ("original_hash_buckets", keys::ORIGINAL_HASH_BUCKETS),
            ("original_hash_batches", keys::ORIGINAL_HASH_BATCHES),
        ],
    )
    .into_iter()
    .chain(peak_memory(node))
    .collect()
}

fn index_only_scan_properties(node: &PlanNode) -> Vec<NodeProperty> {
    numeric_properties(node, &[("heap_fetches", keys::HEAP_FETCHES)])
}

fn bitmap_heap_scan_properties(node: &PlanNode) -> Vec<NodeProperty> {
    numeric_properties(
        node,
        &[
            ("exact_heap_blocks", keys::EXACT_HEAP_BLOCKS),
            ("lossy_heap_blocks", keys::LOSSY_HEAP_BLOCKS),
            ("rows_removed_by_index_recheck", keys::ROWS_REMOVED_BY_INDEX_RECHECK),
        ],
    )
}

fn aggregate_properties(node: &PlanNode) -> Vec<NodeProperty> {
    let mut props = numeric_properties(node, &[("hash_agg_batches", keys::HASH_AGG_BATCHES)]);
    props.extend(peak_memory(node));
    if let Some(disk) = node.extra_f64(keys::DISK_USAGE) {
        props.push(NodeProperty::kilobytes("disk_usage", keys::DISK_USAGE, disk));
    }
    props
}

fn memoize_properties(node: &PlanNode) -> Vec<NodeProperty> {
    numeric_properties(
        node,
        &[
            ("cache_hits", keys::CACHE_HITS),
            ("cache_misses", keys::CACHE_MISSES),
            ("cache_evictions", keys::CACHE_EVICTIONS),
            ("cache_overflows", keys::CACHE_OVERFLOWS),
        ],
    )
}

fn peak_memory(node: &PlanNode) -> Option<NodeProperty> {
    node.extra_f64(keys::PEAK_MEMORY_USAGE)
        .map(|peak| NodeProperty::kilobytes("peak_memory_usage", keys::PEAK_MEMORY_USAGE, peak))
}

fn numeric_properties(node: &PlanNode, fields: &[(&'static str, &'static str)]) -> Vec<NodeProperty> {
    fields
        .iter()
        .filter_map(|(id, key)| {
            node.extra_f64(key)
                .map(|value| NodeProperty::number(*id, *key, value))
        })
        .collect()
}

/// One row per entry of the node's `Workers` list
pub fn worker_rows(node: &PlanNode) -> Vec<WorkerRow> {
    node.workers
        .iter()
        .enumerate()
        .map(|(i, worker)| WorkerRow {
            worker_number: worker.worker_number.unwrap_or(i as f64),
            actual_startup_time: worker.actual_startup_time.unwrap_or(0.0),
            actual_total_time: worker.actual_total_time.unwrap_or(0.0),
            actual_rows: worker.actual_rows.unwrap_or(0.0),
            actual_loops: worker.actual_loops.unwrap_or(0.0),
        })
        .collect()
}
