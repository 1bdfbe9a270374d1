//! Node identity
//!
//! Identities are handed out by an [`IdSource`] so callers can choose
//! between deterministic ids (tests, snapshots) and random ones.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a plan node, shared by the enriched tree and every
/// row derived from it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Source of node identities
pub trait IdSource {
    fn next_id(&mut self) -> NodeId;
}

/// Hands out `1`, `2`, `3`, ... in visiting order
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts counting after `offset`, useful when two plans share a view
    pub fn starting_at(offset: u64) -> Self {
        Self { next: offset }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> NodeId {
        self.next += 1;
        NodeId(self.next.to_string())
    }
}

/// Random UUIDv4 identities
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&mut self) -> NodeId {
        NodeId(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids_are_deterministic() {
        let mut ids = SequentialIds::new();
        assert_eq!(ids.next_id(), NodeId::from("1"));
        assert_eq!(ids.next_id(), NodeId::from("2"));

        let mut offset = SequentialIds::starting_at(10);
        assert_eq!(offset.next_id().as_str(), "11");
    }

    #[test]
    fn test_random_ids_are_unique() {
        let mut ids = RandomIds;
        let first = ids.next_id();
        let second = ids.next_id();
        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 36);
    }
}
