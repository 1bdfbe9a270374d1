//! Property keys used by PostgreSQL's JSON EXPLAIN format
//!
//! The strings are case- and spacing-sensitive and must match the server
//! output exactly.

// Document level
pub const PLAN: &str = "Plan";
pub const NESTED_PLAN: &str = "plan";
pub const EXECUTION_TIME: &str = "Execution Time";
pub const PLANNING_TIME: &str = "Planning Time";
pub const TOTAL_RUNTIME: &str = "Total Runtime";
pub const JIT: &str = "JIT";
pub const TRIGGERS: &str = "Triggers";
pub const TRIGGER_NAME: &str = "Trigger Name";
pub const TRIGGER_RELATION: &str = "Relation";
pub const TRIGGER_TIME: &str = "Time";
pub const TRIGGER_CALLS: &str = "Calls";

// Shape
pub const NODE_TYPE: &str = "Node Type";
pub const PLANS: &str = "Plans";
pub const PARENT_RELATIONSHIP: &str = "Parent Relationship";
pub const SUBPLAN_NAME: &str = "Subplan Name";
pub const PARALLEL_AWARE: &str = "Parallel Aware";
pub const PARTIAL_MODE: &str = "Partial Mode";
pub const JOIN_TYPE: &str = "Join Type";

// Targets
pub const RELATION_NAME: &str = "Relation Name";
pub const INDEX_NAME: &str = "Index Name";
pub const CTE_NAME: &str = "CTE Name";
pub const FUNCTION_NAME: &str = "Function Name";
pub const ALIAS: &str = "Alias";
pub const SCHEMA: &str = "Schema";

// Estimates
pub const STARTUP_COST: &str = "Startup Cost";
pub const TOTAL_COST: &str = "Total Cost";
pub const PLAN_ROWS: &str = "Plan Rows";
pub const PLAN_WIDTH: &str = "Plan Width";

// Actuals
pub const ACTUAL_STARTUP_TIME: &str = "Actual Startup Time";
pub const ACTUAL_TOTAL_TIME: &str = "Actual Total Time";
pub const ACTUAL_ROWS: &str = "Actual Rows";
pub const ACTUAL_LOOPS: &str = "Actual Loops";
pub const ROWS_REMOVED_BY_FILTER: &str = "Rows Removed by Filter";
pub const ROWS_REMOVED_BY_JOIN_FILTER: &str = "Rows Removed by Join Filter";

// Parallelism
pub const WORKERS: &str = "Workers";
pub const WORKER_NUMBER: &str = "Worker Number";
pub const WORKERS_PLANNED: &str = "Workers Planned";
pub const WORKERS_LAUNCHED: &str = "Workers Launched";

// Buffers and I/O
pub const SHARED_HIT_BLOCKS: &str = "Shared Hit Blocks";
pub const SHARED_READ_BLOCKS: &str = "Shared Read Blocks";
pub const SHARED_DIRTIED_BLOCKS: &str = "Shared Dirtied Blocks";
pub const SHARED_WRITTEN_BLOCKS: &str = "Shared Written Blocks";
pub const LOCAL_HIT_BLOCKS: &str = "Local Hit Blocks";
pub const LOCAL_READ_BLOCKS: &str = "Local Read Blocks";
pub const LOCAL_DIRTIED_BLOCKS: &str = "Local Dirtied Blocks";
pub const LOCAL_WRITTEN_BLOCKS: &str = "Local Written Blocks";
pub const TEMP_READ_BLOCKS: &str = "Temp Read Blocks";
pub const TEMP_WRITTEN_BLOCKS: &str = "Temp Written Blocks";
pub const IO_READ_TIME: &str = "I/O Read Time";
pub const IO_WRITE_TIME: &str = "I/O Write Time";

// Scopes
pub const FILTER: &str = "Filter";
pub const JOIN_FILTER: &str = "Join Filter";
pub const INDEX_COND: &str = "Index Cond";
pub const HASH_COND: &str = "Hash Cond";
pub const MERGE_COND: &str = "Merge Cond";
pub const RECHECK_COND: &str = "Recheck Cond";
pub const TID_COND: &str = "TID Cond";
pub const GROUP_KEY: &str = "Group Key";
pub const SORT_KEY: &str = "Sort Key";
pub const PRESORTED_KEY: &str = "Presorted Key";
pub const CACHE_KEY: &str = "Cache Key";
pub const STRATEGY: &str = "Strategy";
pub const COMMAND: &str = "Command";
pub const OPERATION: &str = "Operation";

// Operator specific
pub const SORT_METHOD: &str = "Sort Method";
pub const SORT_SPACE_TYPE: &str = "Sort Space Type";
pub const SORT_SPACE_USED: &str = "Sort Space Used";
pub const HASH_BUCKETS: &str = "Hash Buckets";
pub const HASH_BATCHES: &str = "Hash Batches";
pub const ORIGINAL_HASH_BUCKETS: &str = "Original Hash Buckets";
pub const ORIGINAL_HASH_BATCHES: &str = "Original Hash Batches";
pub const PEAK_MEMORY_USAGE: &str = "Peak Memory Usage";
pub const DISK_USAGE: &str = "Disk Usage";
pub const HASH_AGG_BATCHES: &str = "HashAgg Batches";
pub const HEAP_FETCHES: &str = "Heap Fetches";
pub const EXACT_HEAP_BLOCKS: &str = "Exact Heap Blocks";
pub const LOSSY_HEAP_BLOCKS: &str = "Lossy Heap Blocks";
pub const ROWS_REMOVED_BY_INDEX_RECHECK: &str = "Rows Removed by Index Recheck";
pub const CACHE_HITS: &str = "Cache Hits";
pub const CACHE_MISSES: &str = "Cache Misses";
pub const CACHE_EVICTIONS: &str = "Cache Evictions";
pub const CACHE_OVERFLOWS: &str = "Cache Overflows";

// Relationship values
pub const INIT_PLAN: &str = "InitPlan";
pub const SUB_PLAN: &str = "SubPlan";
pub const CTE_PREFIX: &str = "CTE";

/// Residual keys whose values are numeric even though the node model keeps
/// them in the residual map. Some server versions emit them as strings.
pub const NUMERIC_EXTRAS: &[&str] = &[
    SORT_SPACE_USED,
    HASH_BUCKETS,
    HASH_BATCHES,
    ORIGINAL_HASH_BUCKETS,
    ORIGINAL_HASH_BATCHES,
    PEAK_MEMORY_USAGE,
    DISK_USAGE,
    HASH_AGG_BATCHES,
    HEAP_FETCHES,
    EXACT_HEAP_BLOCKS,
    LOSSY_HEAP_BLOCKS,
    ROWS_REMOVED_BY_INDEX_RECHECK,
    CACHE_HITS,
    CACHE_MISSES,
    CACHE_EVICTIONS,
    CACHE_OVERFLOWS,
];
