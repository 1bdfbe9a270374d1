//! Analyzer configuration
//!
//! Every field has a default, so an empty TOML document yields the default
//! configuration:
//!
//! ```toml
//! ids = "sequential"
//!
//! [comparison]
//! similarity_threshold = 0.5
//! match_nodes = true
//! strictness = "lenient"
//!
//! [comparison.senses]
//! max_blocks_hit = "higher_is_better"
//! ```

use plansight_core::{IdSource, PlanError, RandomIds, Result, SequentialIds};
use serde::{Deserialize, Serialize};

/// Top-level analyzer settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// How node identities are generated
    pub ids: IdStrategy,
    pub comparison: ComparisonConfig,
}

impl AnalyzerConfig {
    /// Parses and validates a TOML configuration
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| PlanError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the analyzer cannot work with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.comparison.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PlanError::InvalidConfig(format!(
                "similarity_threshold must be within [0, 1], got {threshold}"
            )));
        }
        Ok(())
    }
}

/// Node identity generation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// `1`, `2`, `3`, ... in pre-order
    #[default]
    Sequential,
    /// Random UUIDv4 values
    Random,
}

impl IdStrategy {
    pub fn source(&self) -> Box<dyn IdSource> {
        match self {
            Self::Sequential => Box::new(SequentialIds::new()),
            Self::Random => Box::new(RandomIds),
        }
    }
}

/// How mismatching nodes are treated when compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Differences are reported as warnings on the comparison
    #[default]
    Lenient,
    /// Differences fail the comparison with `PlanError::IncompatibleNodes`
    Strict,
}

/// Whether a metric improves when it goes down or up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementSense {
    #[default]
    LowerIsBetter,
    HigherIsBetter,
}

impl ImprovementSense {
    pub fn has_improved(&self, original: f64, to_compare: f64) -> bool {
        match self {
            Self::LowerIsBetter => to_compare < original,
            Self::HigherIsBetter => to_compare > original,
        }
    }
}

/// Improvement sense of each plan-level statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSenses {
    pub execution_time: ImprovementSense,
    pub planning_time: ImprovementSense,
    pub max_duration: ImprovementSense,
    pub max_cost: ImprovementSense,
    pub max_blocks_read: ImprovementSense,
    pub max_blocks_written: ImprovementSense,
    pub max_blocks_hit: ImprovementSense,
}

impl Default for MetricSenses {
    fn default() -> Self {
        Self {
            execution_time: ImprovementSense::LowerIsBetter,
            planning_time: ImprovementSense::LowerIsBetter,
            max_duration: ImprovementSense::LowerIsBetter,
            max_cost: ImprovementSense::LowerIsBetter,
            max_blocks_read: ImprovementSense::LowerIsBetter,
            max_blocks_written: ImprovementSense::LowerIsBetter,
            // more cache hits means fewer reads from disk
            max_blocks_hit: ImprovementSense::HigherIsBetter,
        }
    }
}

/// Plan comparison settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Minimum weighted similarity (exclusive) for two nodes to be paired
    pub similarity_threshold: f64,
    /// Pair nodes across plans and compare them individually
    pub match_nodes: bool,
    pub strictness: Strictness,
    pub senses: MetricSenses,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            match_nodes: true,
            strictness: Strictness::Lenient,
            senses: MetricSenses::default(),
        }
    }
}

#[cfg(test)]
mod tests;
