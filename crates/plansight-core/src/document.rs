//! EXPLAIN JSON ingestion
//!
//! Converts `EXPLAIN (FORMAT JSON)` output into a [`PlanDocument`]. Every
//! numeric field is validated here, once: numbers pass through, numeric
//! strings are converted, and anything else becomes a [`FieldIssue`]
//! instead of aborting the walk.
//!
//! # Examples
//!
//! ```
//! use plansight_core::PlanDocument;
//!
//! let json = r#"[
//!   {
//!     "Plan": {
//!       "Node Type": "Seq Scan",
//!       "Relation Name": "users",
//!       "Startup Cost": 0.0,
//!       "Total Cost": 10.0,
//!       "Plan Rows": 100,
//!       "Plan Width": 36
//!     },
//!     "Planning Time": 0.2
//!   }
//! ]"#;
//!
//! let document = PlanDocument::from_json(json).unwrap();
//! assert_eq!(document.root.relation_name.as_deref(), Some("users"));
//! assert_eq!(document.planning_time, 0.2);
//! assert!(document.issues.is_empty());
//! ```

use crate::error::{PlanError, Result};
use crate::keys;
use crate::node::{Counter, PlanNode, PlanWorker};
use serde::Serialize;
use serde_json::{Map, Value};

/// A parsed EXPLAIN document: the root node plus plan-level statistics
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanDocument {
    pub root: PlanNode,
    /// Execution time in milliseconds, 0 for estimate-only plans
    pub execution_time: f64,
    /// Planning time in milliseconds, 0 when not reported
    pub planning_time: f64,
    /// JIT compilation statistics, copied verbatim
    pub jit: Option<Value>,
    pub triggers: Vec<Trigger>,
    /// Fields that were present but could not be converted
    pub issues: Vec<FieldIssue>,
}

impl PlanDocument {
    /// Parses the textual JSON output of `EXPLAIN (FORMAT JSON)`
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json.trim())?;
        Self::from_value(&value)
    }

    /// Builds a document from an already decoded JSON value
    pub fn from_value(value: &Value) -> Result<Self> {
        // PostgreSQL JSON EXPLAIN wraps the plan in an array
        let entry = match value {
            Value::Array(entries) => entries.first().ok_or(PlanError::EmptyDocument)?,
            Value::Object(_) => value,
            _ => {
                return Err(PlanError::InvalidStructure(
                    "expected a JSON array or object".into(),
                ));
            }
        };
        let entry = entry
            .as_object()
            .ok_or_else(|| PlanError::InvalidStructure("plan entry is not an object".into()))?;
        let plan = entry
            .get(keys::PLAN)
            .filter(|plan| plan.is_object())
            .ok_or(PlanError::MissingPlan)?;

        let mut ingestor = Ingestor::default();
        let root = ingestor.node(plan, keys::PLAN);

        // Timing may be nested one level under a "plan" object; the nested
        // form wins whenever it carries a non-zero execution time
        let nested = entry.get(keys::NESTED_PLAN).and_then(Value::as_object);
        let nested_execution = nested
            .and_then(|n| ingestor.number(n, keys::EXECUTION_TIME, keys::NESTED_PLAN))
            .unwrap_or(0.0);
        let (execution_time, planning_time) = match nested {
            Some(nested) if nested_execution != 0.0 => (
                nested_execution,
                ingestor
                    .number(nested, keys::PLANNING_TIME, keys::NESTED_PLAN)
                    .unwrap_or(0.0),
            ),
            _ => (
                ingestor
                    .number(entry, keys::EXECUTION_TIME, "")
                    .or_else(|| ingestor.number(entry, keys::TOTAL_RUNTIME, ""))
                    .unwrap_or(0.0),
                ingestor.number(entry, keys::PLANNING_TIME, "").unwrap_or(0.0),
            ),
        };

        let jit = entry.get(keys::JIT).cloned();
        let triggers = ingestor.triggers(entry.get(keys::TRIGGERS));

        tracing::debug!(
            nodes = root.node_count(),
            execution_time,
            planning_time,
            issues = ingestor.issues.len(),
            "ingested plan document"
        );

        Ok(Self {
            root,
            execution_time,
            planning_time,
            jit,
            triggers,
            issues: ingestor.issues,
        })
    }

    /// Returns true when the plan was produced by `EXPLAIN ANALYZE`
    pub fn has_execution_time(&self) -> bool {
        self.execution_time != 0.0
    }
}

/// Trigger statistics with the derived average time per call
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Trigger {
    pub name: String,
    pub relation: Option<String>,
    pub time: f64,
    pub calls: f64,
    pub avg_time: f64,
}

/// A field that was present but had an unexpected shape
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldIssue {
    /// Location of the owning object, e.g. `Plan.Plans[1]`
    pub path: String,
    pub key: String,
    /// The raw JSON value as found in the input
    pub value: String,
    pub message: String,
}

/// Converts a JSON value to a number, accepting numeric strings
///
/// `null` is treated as absent. Strings that do not parse to a finite
/// number and any other JSON type produce [`PlanError::InvalidNumber`].
pub fn parse_number(key: &str, value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_f64().map(Some).ok_or_else(|| invalid_number(key, value)),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(invalid_number(key, value)),
        },
        _ => Err(invalid_number(key, value)),
    }
}

fn invalid_number(key: &str, value: &Value) -> PlanError {
    PlanError::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[derive(Default)]
struct Ingestor {
    issues: Vec<FieldIssue>,
}

impl Ingestor {
    fn record(&mut self, path: &str, key: &str, value: &Value, error: PlanError) {
        tracing::warn!(path, key, %value, %error, "ignoring unconvertible plan field");
        self.issues.push(FieldIssue {
            path: path.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            message: error.to_string(),
        });
    }

    fn number(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<f64> {
        let value = obj.get(key)?;
        self.convert(key, value, path)
    }

    fn convert(&mut self, key: &str, value: &Value, path: &str) -> Option<f64> {
        match parse_number(key, value) {
            Ok(number) => number,
            Err(error) => {
                self.record(path, key, value, error);
                None
            }
        }
    }

    fn text(&mut self, key: &str, value: &Value, path: &str) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            other => {
                self.record(
                    path,
                    key,
                    other,
                    PlanError::InvalidStructure(format!("{key} is not a string")),
                );
                None
            }
        }
    }

    fn flag(&mut self, key: &str, value: &Value, path: &str) -> bool {
        match value {
            Value::Bool(b) => *b,
            Value::String(s) if s.eq_ignore_ascii_case("true") => true,
            Value::String(s) if s.eq_ignore_ascii_case("false") => false,
            Value::Null => false,
            other => {
                self.record(
                    path,
                    key,
                    other,
                    PlanError::InvalidStructure(format!("{key} is not a boolean")),
                );
                false
            }
        }
    }

    /// Parses a single plan node; never fails, malformed fields are skipped
    fn node(&mut self, value: &Value, path: &str) -> PlanNode {
        let mut node = PlanNode::default();
        let Some(obj) = value.as_object() else {
            self.record(
                path,
                keys::PLANS,
                value,
                PlanError::InvalidStructure("plan node is not an object".into()),
            );
            return node;
        };

        for (key, val) in obj {
            match key.as_str() {
                keys::NODE_TYPE => node.node_type = self.text(key, val, path).unwrap_or_default(),
                keys::PARENT_RELATIONSHIP => node.parent_relationship = self.text(key, val, path),
                keys::SUBPLAN_NAME => node.subplan_name = self.text(key, val, path),
                keys::RELATION_NAME => node.relation_name = self.text(key, val, path),
                keys::INDEX_NAME => node.index_name = self.text(key, val, path),
                keys::CTE_NAME => node.cte_name = self.text(key, val, path),
                keys::FUNCTION_NAME => node.function_name = self.text(key, val, path),
                keys::ALIAS => node.alias = self.text(key, val, path),
                keys::SCHEMA => node.schema = self.text(key, val, path),
                keys::JOIN_TYPE => node.join_type = self.text(key, val, path),
                keys::PARTIAL_MODE => node.partial_mode = self.text(key, val, path),
                keys::PARALLEL_AWARE => node.parallel_aware = self.flag(key, val, path),
                keys::STARTUP_COST => node.startup_cost = self.convert(key, val, path),
                keys::TOTAL_COST => node.total_cost = self.convert(key, val, path),
                keys::PLAN_ROWS => node.plan_rows = self.convert(key, val, path),
                keys::PLAN_WIDTH => node.plan_width = self.convert(key, val, path),
                keys::ACTUAL_STARTUP_TIME => {
                    node.actual_startup_time = self.convert(key, val, path)
                }
                keys::ACTUAL_TOTAL_TIME => node.actual_total_time = self.convert(key, val, path),
                keys::ACTUAL_ROWS => node.actual_rows = self.convert(key, val, path),
                keys::ACTUAL_LOOPS => node.actual_loops = self.convert(key, val, path),
                keys::ROWS_REMOVED_BY_FILTER => {
                    node.rows_removed_by_filter = self.convert(key, val, path)
                }
                keys::ROWS_REMOVED_BY_JOIN_FILTER => {
                    node.rows_removed_by_join_filter = self.convert(key, val, path)
                }
                keys::WORKERS_PLANNED => node.workers_planned = self.convert(key, val, path),
                keys::WORKERS_LAUNCHED => node.workers_launched = self.convert(key, val, path),
                keys::WORKERS => node.workers = self.workers(val, path),
                keys::PLANS => node.children = self.children(val, path),
                other => {
                    if let Some(counter) = Counter::from_key(other) {
                        let number = self.convert(key, val, path);
                        node.buffers.set(counter, number);
                    } else if keys::NUMERIC_EXTRAS.contains(&other) {
                        if let Some(number) = self.convert(key, val, path) {
                            node.extra.insert(key.clone(), Value::from(number));
                        }
                    } else {
                        node.extra.insert(key.clone(), val.clone());
                    }
                }
            }
        }

        if node.node_type.is_empty() {
            tracing::debug!(path, "plan node without Node Type");
        }
        node
    }

    fn children(&mut self, value: &Value, path: &str) -> Vec<PlanNode> {
        let Some(plans) = value.as_array() else {
            self.record(
                path,
                keys::PLANS,
                value,
                PlanError::InvalidStructure("Plans is not an array".into()),
            );
            return Vec::new();
        };
        plans
            .iter()
            .enumerate()
            .filter(|(_, child)| child.is_object())
            .map(|(i, child)| self.node(child, &format!("{path}.Plans[{i}]")))
            .collect()
    }

    fn workers(&mut self, value: &Value, path: &str) -> Vec<PlanWorker> {
        let Some(entries) = value.as_array() else {
            self.record(
                path,
                keys::WORKERS,
                value,
                PlanError::InvalidStructure("Workers is not an array".into()),
            );
            return Vec::new();
        };

        let mut workers = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let Some(obj) = entry.as_object() else {
                continue;
            };
            let worker_path = format!("{path}.Workers[{i}]");
            let mut worker = PlanWorker::default();
            for (key, val) in obj {
                match key.as_str() {
                    keys::WORKER_NUMBER => worker.worker_number = self.convert(key, val, &worker_path),
                    keys::ACTUAL_STARTUP_TIME => {
                        worker.actual_startup_time = self.convert(key, val, &worker_path)
                    }
                    keys::ACTUAL_TOTAL_TIME => {
                        worker.actual_total_time = self.convert(key, val, &worker_path)
                    }
                    keys::ACTUAL_ROWS => worker.actual_rows = self.convert(key, val, &worker_path),
                    keys::ACTUAL_LOOPS => worker.actual_loops = self.convert(key, val, &worker_path),
                    other if keys::NUMERIC_EXTRAS.contains(&other) => {
                        if let Some(number) = self.convert(key, val, &worker_path) {
                            worker.extra.insert(key.clone(), Value::from(number));
                        }
                    }
                    _ => {
                        worker.extra.insert(key.clone(), val.clone());
                    }
                }
            }
            workers.push(worker);
        }
        workers
    }

    fn triggers(&mut self, value: Option<&Value>) -> Vec<Trigger> {
        let Some(entries) = value.and_then(Value::as_array) else {
            return Vec::new();
        };

        let mut triggers = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let Some(obj) = entry.as_object() else {
                continue;
            };
            let path = format!("{}[{i}]", keys::TRIGGERS);
            let name = obj
                .get(keys::TRIGGER_NAME)
                .and_then(|v| self.text(keys::TRIGGER_NAME, v, &path))
                .unwrap_or_default();
            let relation = obj
                .get(keys::TRIGGER_RELATION)
                .and_then(|v| self.text(keys::TRIGGER_RELATION, v, &path));
            let time = self.number(obj, keys::TRIGGER_TIME, &path).unwrap_or(0.0);
            let calls = self.number(obj, keys::TRIGGER_CALLS, &path).unwrap_or(0.0);
            let avg_time = if calls > 0.0 { time / calls } else { 0.0 };

            triggers.push(Trigger {
                name,
                relation,
                time,
                calls,
                avg_time,
            });
        }
        triggers
    }
}
