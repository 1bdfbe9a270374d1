//! Plan Node Model - typed representation of one EXPLAIN operator
//!
//! A [`PlanNode`] keeps the handful of properties every analysis pass needs
//! as typed optional fields and stores everything else in an ordered
//! residual map. Derived values written by the analyzer live in
//! [`NodeAnalysis`] so the source counters are never overwritten.

use crate::ids::NodeId;
use crate::keys;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// One operator of an execution plan and its physical children
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PlanNode {
    #[serde(rename = "Node Type")]
    pub node_type: String,
    #[serde(rename = "Parent Relationship", skip_serializing_if = "Option::is_none")]
    pub parent_relationship: Option<String>,
    #[serde(rename = "Subplan Name", skip_serializing_if = "Option::is_none")]
    pub subplan_name: Option<String>,
    #[serde(rename = "Relation Name", skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,
    #[serde(rename = "Index Name", skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(rename = "CTE Name", skip_serializing_if = "Option::is_none")]
    pub cte_name: Option<String>,
    #[serde(rename = "Function Name", skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(rename = "Alias", skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "Schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(rename = "Join Type", skip_serializing_if = "Option::is_none")]
    pub join_type: Option<String>,
    #[serde(rename = "Partial Mode", skip_serializing_if = "Option::is_none")]
    pub partial_mode: Option<String>,
    #[serde(rename = "Parallel Aware")]
    pub parallel_aware: bool,

    #[serde(rename = "Startup Cost", skip_serializing_if = "Option::is_none")]
    pub startup_cost: Option<f64>,
    #[serde(rename = "Total Cost", skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(rename = "Plan Rows", skip_serializing_if = "Option::is_none")]
    pub plan_rows: Option<f64>,
    #[serde(rename = "Plan Width", skip_serializing_if = "Option::is_none")]
    pub plan_width: Option<f64>,

    #[serde(rename = "Actual Startup Time", skip_serializing_if = "Option::is_none")]
    pub actual_startup_time: Option<f64>,
    #[serde(rename = "Actual Total Time", skip_serializing_if = "Option::is_none")]
    pub actual_total_time: Option<f64>,
    #[serde(rename = "Actual Rows", skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,
    #[serde(rename = "Actual Loops", skip_serializing_if = "Option::is_none")]
    pub actual_loops: Option<f64>,
    #[serde(rename = "Rows Removed by Filter", skip_serializing_if = "Option::is_none")]
    pub rows_removed_by_filter: Option<f64>,
    #[serde(
        rename = "Rows Removed by Join Filter",
        skip_serializing_if = "Option::is_none"
    )]
    pub rows_removed_by_join_filter: Option<f64>,

    #[serde(rename = "Workers Planned", skip_serializing_if = "Option::is_none")]
    pub workers_planned: Option<f64>,
    #[serde(rename = "Workers Launched", skip_serializing_if = "Option::is_none")]
    pub workers_launched: Option<f64>,
    #[serde(rename = "Workers", skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<PlanWorker>,

    #[serde(flatten)]
    pub buffers: BufferCounters,

    #[serde(rename = "Plans", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanNode>,

    /// Properties without a typed field, in source order
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,

    /// Derived values, filled in by the analyzer
    pub analysis: NodeAnalysis,
}

impl PlanNode {
    /// Creates a new plan node with the given operator name
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            ..Self::default()
        }
    }

    /// Sets the relation/table name
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation_name = Some(relation.into());
        self
    }

    /// Sets the index name
    pub fn with_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Sets the startup and total cost
    pub fn with_cost(mut self, startup: f64, total: f64) -> Self {
        self.startup_cost = Some(startup);
        self.total_cost = Some(total);
        self
    }

    /// Sets planned and actual rows
    pub fn with_rows(mut self, planned: f64, actual: f64) -> Self {
        self.plan_rows = Some(planned);
        self.actual_rows = Some(actual);
        self
    }

    /// Sets actual timings and loop count
    pub fn with_actual_time(mut self, startup: f64, total: f64, loops: f64) -> Self {
        self.actual_startup_time = Some(startup);
        self.actual_total_time = Some(total);
        self.actual_loops = Some(loops);
        self
    }

    /// Marks this node as a child reached through the given relationship
    pub fn with_relationship(
        mut self,
        relationship: impl Into<String>,
        subplan_name: Option<&str>,
    ) -> Self {
        self.parent_relationship = Some(relationship.into());
        self.subplan_name = subplan_name.map(String::from);
        self
    }

    /// Sets a buffer or I/O counter
    pub fn with_counter(mut self, counter: Counter, value: f64) -> Self {
        self.buffers.set(counter, Some(value));
        self
    }

    /// Sets a residual property
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Adds a child node
    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    /// The identity assigned during enrichment
    pub fn id(&self) -> Option<&NodeId> {
        self.analysis.id.as_ref()
    }

    /// Returns the CTE name when this node is the root of a CTE definition
    ///
    /// A CTE definition is an `InitPlan` child whose subplan name starts
    /// with `CTE`; the returned name has the `CTE ` prefix stripped.
    pub fn cte_definition(&self) -> Option<&str> {
        if self.parent_relationship.as_deref() != Some(keys::INIT_PLAN) {
            return None;
        }
        let name = self.subplan_name.as_deref()?;
        if !name.starts_with(keys::CTE_PREFIX) {
            return None;
        }
        let stripped = name.strip_prefix(keys::CTE_PREFIX).unwrap_or(name);
        Some(stripped.trim_start())
    }

    /// Returns true when this node runs as an InitPlan or SubPlan of its
    /// parent instead of being part of the parent's main loop
    pub fn is_sub_plan(&self) -> bool {
        matches!(
            self.parent_relationship.as_deref(),
            Some(keys::INIT_PLAN) | Some(keys::SUB_PLAN)
        )
    }

    /// Looks up a scope-like property by its source key
    ///
    /// Typed target fields are consulted first, then the residual map.
    pub fn scope_value(&self, key: &str) -> Option<ScopeValue> {
        let typed = match key {
            keys::RELATION_NAME => self.relation_name.as_deref(),
            keys::INDEX_NAME => self.index_name.as_deref(),
            keys::CTE_NAME => self.cte_name.as_deref(),
            keys::FUNCTION_NAME => self.function_name.as_deref(),
            keys::ALIAS => self.alias.as_deref(),
            keys::SCHEMA => self.schema.as_deref(),
            keys::JOIN_TYPE => self.join_type.as_deref(),
            _ => None,
        };
        if let Some(text) = typed {
            return Some(ScopeValue::Text(text.to_string()));
        }
        self.extra.get(key).and_then(ScopeValue::from_json)
    }

    /// Numeric residual property (validated at ingestion)
    pub fn extra_f64(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }

    /// String residual property
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Returns an iterator over this node and all descendants (pre-order)
    pub fn iter(&self) -> PlanNodeIterator<'_> {
        PlanNodeIterator::new(self)
    }

    /// Returns the total number of nodes in this subtree (including self)
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Returns the maximum depth of this subtree
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    /// Returns true if this is a leaf node (no children)
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Per-worker figures reported under a parallel node's `Workers` key
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PlanWorker {
    #[serde(rename = "Worker Number", skip_serializing_if = "Option::is_none")]
    pub worker_number: Option<f64>,
    #[serde(rename = "Actual Startup Time", skip_serializing_if = "Option::is_none")]
    pub actual_startup_time: Option<f64>,
    #[serde(rename = "Actual Total Time", skip_serializing_if = "Option::is_none")]
    pub actual_total_time: Option<f64>,
    #[serde(rename = "Actual Rows", skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,
    #[serde(rename = "Actual Loops", skip_serializing_if = "Option::is_none")]
    pub actual_loops: Option<f64>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Buffer and I/O counters tracked per node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    SharedHit,
    SharedRead,
    SharedDirtied,
    SharedWritten,
    LocalHit,
    LocalRead,
    LocalDirtied,
    LocalWritten,
    TempRead,
    TempWritten,
    IoReadTime,
    IoWriteTime,
}

impl Counter {
    pub const ALL: [Counter; 12] = [
        Counter::SharedHit,
        Counter::SharedRead,
        Counter::SharedDirtied,
        Counter::SharedWritten,
        Counter::LocalHit,
        Counter::LocalRead,
        Counter::LocalDirtied,
        Counter::LocalWritten,
        Counter::TempRead,
        Counter::TempWritten,
        Counter::IoReadTime,
        Counter::IoWriteTime,
    ];

    /// Source property key
    pub fn key(self) -> &'static str {
        match self {
            Self::SharedHit => keys::SHARED_HIT_BLOCKS,
            Self::SharedRead => keys::SHARED_READ_BLOCKS,
            Self::SharedDirtied => keys::SHARED_DIRTIED_BLOCKS,
            Self::SharedWritten => keys::SHARED_WRITTEN_BLOCKS,
            Self::LocalHit => keys::LOCAL_HIT_BLOCKS,
            Self::LocalRead => keys::LOCAL_READ_BLOCKS,
            Self::LocalDirtied => keys::LOCAL_DIRTIED_BLOCKS,
            Self::LocalWritten => keys::LOCAL_WRITTEN_BLOCKS,
            Self::TempRead => keys::TEMP_READ_BLOCKS,
            Self::TempWritten => keys::TEMP_WRITTEN_BLOCKS,
            Self::IoReadTime => keys::IO_READ_TIME,
            Self::IoWriteTime => keys::IO_WRITE_TIME,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

/// Values of the twelve [`Counter`]s; absent counters stay `None`
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct BufferCounters {
    #[serde(rename = "Shared Hit Blocks", skip_serializing_if = "Option::is_none")]
    pub shared_hit: Option<f64>,
    #[serde(rename = "Shared Read Blocks", skip_serializing_if = "Option::is_none")]
    pub shared_read: Option<f64>,
    #[serde(rename = "Shared Dirtied Blocks", skip_serializing_if = "Option::is_none")]
    pub shared_dirtied: Option<f64>,
    #[serde(rename = "Shared Written Blocks", skip_serializing_if = "Option::is_none")]
    pub shared_written: Option<f64>,
    #[serde(rename = "Local Hit Blocks", skip_serializing_if = "Option::is_none")]
    pub local_hit: Option<f64>,
    #[serde(rename = "Local Read Blocks", skip_serializing_if = "Option::is_none")]
    pub local_read: Option<f64>,
    #[serde(rename = "Local Dirtied Blocks", skip_serializing_if = "Option::is_none")]
    pub local_dirtied: Option<f64>,
    #[serde(rename = "Local Written Blocks", skip_serializing_if = "Option::is_none")]
    pub local_written: Option<f64>,
    #[serde(rename = "Temp Read Blocks", skip_serializing_if = "Option::is_none")]
    pub temp_read: Option<f64>,
    #[serde(rename = "Temp Written Blocks", skip_serializing_if = "Option::is_none")]
    pub temp_written: Option<f64>,
    #[serde(rename = "I/O Read Time", skip_serializing_if = "Option::is_none")]
    pub io_read_time: Option<f64>,
    #[serde(rename = "I/O Write Time", skip_serializing_if = "Option::is_none")]
    pub io_write_time: Option<f64>,
}

impl BufferCounters {
    pub fn get(&self, counter: Counter) -> Option<f64> {
        match counter {
            Counter::SharedHit => self.shared_hit,
            Counter::SharedRead => self.shared_read,
            Counter::SharedDirtied => self.shared_dirtied,
            Counter::SharedWritten => self.shared_written,
            Counter::LocalHit => self.local_hit,
            Counter::LocalRead => self.local_read,
            Counter::LocalDirtied => self.local_dirtied,
            Counter::LocalWritten => self.local_written,
            Counter::TempRead => self.temp_read,
            Counter::TempWritten => self.temp_written,
            Counter::IoReadTime => self.io_read_time,
            Counter::IoWriteTime => self.io_write_time,
        }
    }

    pub fn set(&mut self, counter: Counter, value: Option<f64>) {
        let slot = match counter {
            Counter::SharedHit => &mut self.shared_hit,
            Counter::SharedRead => &mut self.shared_read,
            Counter::SharedDirtied => &mut self.shared_dirtied,
            Counter::SharedWritten => &mut self.shared_written,
            Counter::LocalHit => &mut self.local_hit,
            Counter::LocalRead => &mut self.local_read,
            Counter::LocalDirtied => &mut self.local_dirtied,
            Counter::LocalWritten => &mut self.local_written,
            Counter::TempRead => &mut self.temp_read,
            Counter::TempWritten => &mut self.temp_written,
            Counter::IoReadTime => &mut self.io_read_time,
            Counter::IoWriteTime => &mut self.io_write_time,
        };
        *slot = value;
    }

    /// Counter value with missing treated as zero
    pub fn value(&self, counter: Counter) -> f64 {
        self.get(counter).unwrap_or(0.0)
    }

    /// Blocks read across shared, local and temp storage
    pub fn blocks_read(&self) -> f64 {
        self.value(Counter::SharedRead) + self.value(Counter::LocalRead) + self.value(Counter::TempRead)
    }

    /// Blocks written across shared, local and temp storage
    pub fn blocks_written(&self) -> f64 {
        self.value(Counter::SharedWritten)
            + self.value(Counter::LocalWritten)
            + self.value(Counter::TempWritten)
    }

    /// Cache hits across shared and local storage
    pub fn blocks_hit(&self) -> f64 {
        self.value(Counter::SharedHit) + self.value(Counter::LocalHit)
    }

    pub fn is_empty(&self) -> bool {
        Counter::ALL.iter().all(|c| self.get(*c).is_none())
    }
}

/// Direction of the planner's row misestimation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateDirection {
    /// Planner expected more rows than were produced
    Over,
    /// Planner expected fewer rows than were produced
    Under,
    #[default]
    None,
}

impl EstimateDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Over => "over",
            Self::Under => "under",
            Self::None => "none",
        }
    }
}

/// Values derived by the enricher and the stats aggregator
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NodeAnalysis {
    pub id: Option<NodeId>,
    pub planner_estimate_factor: f64,
    pub planner_estimate_direction: EstimateDirection,
    /// Worker count inherited from the closest Gather-like ancestor
    pub workers_planned_by_gather: Option<f64>,
    /// Startup time scaled by loops and workers
    pub actual_startup_time: f64,
    /// Total time scaled by loops and workers
    pub actual_total_time: f64,
    pub exclusive_duration: f64,
    pub exclusive_buffers: BufferCounters,
    pub actual_rows_revised: f64,
    pub plan_rows_revised: f64,
    pub rows_removed_by_filter_revised: f64,
    pub rows_removed_by_join_filter_revised: f64,
    pub is_cte_root: bool,
    /// CTE this node belongs to (its own name for a CTE root)
    pub cte_subplan_of: Option<String>,
    /// Closest InitPlan/SubPlan this node runs under
    pub sub_plan_of: Option<String>,
    pub is_costliest: bool,
    pub is_largest: bool,
    pub is_slowest: bool,
}

/// A scope property value: plain text or a list such as a multi-column
/// sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeValue {
    Text(String),
    List(Vec<String>),
}

impl ScopeValue {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => Some(Self::List(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            other => Some(Self::Text(other.to_string())),
        }
    }

    /// Display form; lists render as a pretty-printed JSON array so the
    /// column expressions can be recovered with [`ScopeValue::parse`]
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) => {
                serde_json::to_string_pretty(items).unwrap_or_else(|_| items.join(", "))
            }
        }
    }

    /// Inverse of [`ScopeValue::render`]
    pub fn parse(rendered: &str) -> Self {
        let trimmed = rendered.trim_start();
        if trimmed.starts_with('[')
            && let Ok(items) = serde_json::from_str::<Vec<String>>(rendered)
        {
            return Self::List(items);
        }
        Self::Text(rendered.to_string())
    }
}

/// Iterator for traversing plan nodes depth-first
pub struct PlanNodeIterator<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> PlanNodeIterator<'a> {
    fn new(root: &'a PlanNode) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for PlanNodeIterator<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Push children in reverse order so we visit them in order
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}
