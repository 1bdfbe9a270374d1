//! Weighted node similarity
//!
//! Each row is reduced to a weighted token multiset (operator words, table,
//! depth) and two rows are scored with the weighted Jaccard index. Table
//! and depth tokens weigh more than words so that `Parallel Bitmap Index
//! Scan` still pairs with `Bitmap Index Scan` on the same table.

use crate::summary::PlanRow;
use indexmap::IndexMap;
use serde::Serialize;

const WORD_WEIGHT: f64 = 1.0;
const TABLE_WEIGHT: f64 = 5.0;
const DEPTH_WEIGHT: f64 = 2.0;

/// A token of a node signature; kinds never collide with each other
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Token {
    Word(String),
    Table(String),
    Depth(usize),
}

impl Token {
    fn weight(&self) -> f64 {
        match self {
            Self::Word(_) => WORD_WEIGHT,
            Self::Table(_) => TABLE_WEIGHT,
            Self::Depth(_) => DEPTH_WEIGHT,
        }
    }
}

/// Weighted token multiset describing one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSignature {
    tokens: IndexMap<Token, f64>,
}

impl NodeSignature {
    pub fn new(operation: &str, table: &str, depth: usize) -> Self {
        let mut signature = Self {
            tokens: IndexMap::new(),
        };
        for word in operation.split_whitespace() {
            signature.add(Token::Word(word.to_string()));
        }
        if !table.is_empty() {
            signature.add(Token::Table(table.to_string()));
        }
        signature.add(Token::Depth(depth));
        signature
    }

    pub fn from_row(row: &PlanRow) -> Self {
        Self::new(&row.operation, &row.scopes.table, row.level)
    }

    fn add(&mut self, token: Token) {
        let weight = token.weight();
        *self.tokens.entry(token).or_insert(0.0) += weight;
    }

    /// Weighted Jaccard index: Σ min(weights) / Σ max(weights)
    pub fn similarity(&self, other: &NodeSignature) -> f64 {
        let mut shared = 0.0;
        let mut total = 0.0;
        for (token, weight) in &self.tokens {
            let theirs = other.tokens.get(token).copied().unwrap_or(0.0);
            shared += weight.min(theirs);
            total += weight.max(theirs);
        }
        total += other
            .tokens
            .iter()
            .filter(|(token, _)| !self.tokens.contains_key(*token))
            .map(|(_, weight)| weight)
            .sum::<f64>();

        if total == 0.0 {
            return 0.0;
        }
        shared / total
    }
}

/// Similarity of two flattened rows
pub fn similarity(a: &PlanRow, b: &PlanRow) -> f64 {
    NodeSignature::from_row(a).similarity(&NodeSignature::from_row(b))
}

/// A pairing between a row of each plan, by position in the row lists
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMatch {
    pub original: usize,
    pub to_compare: usize,
    pub similarity: f64,
}

/// Pairs rows one-to-one, best similarity first
///
/// Only pairs scoring strictly above `threshold` are candidates. Ties keep
/// the earlier original row, then the earlier row to compare. The result is
/// ordered by original row position.
pub fn match_rows(original: &[PlanRow], to_compare: &[PlanRow], threshold: f64) -> Vec<NodeMatch> {
    match_rows_where(original, to_compare, threshold, |_, _| true)
}

/// Like [`match_rows`], but only pairs accepted by `accept` are candidates
///
/// A row whose best partner is rejected may still pair with its next best
/// accepted partner.
#[tracing::instrument(skip_all, fields(original = original.len(), to_compare = to_compare.len()))]
pub fn match_rows_where<F>(
    original: &[PlanRow],
    to_compare: &[PlanRow],
    threshold: f64,
    accept: F,
) -> Vec<NodeMatch>
where
    F: Fn(&PlanRow, &PlanRow) -> bool,
{
    let right: Vec<NodeSignature> = to_compare.iter().map(NodeSignature::from_row).collect();

    let mut candidates = Vec::new();
    for (i, row) in original.iter().enumerate() {
        let left = NodeSignature::from_row(row);
        for (j, signature) in right.iter().enumerate() {
            let similarity = left.similarity(signature);
            if similarity > threshold && accept(row, &to_compare[j]) {
                candidates.push(NodeMatch {
                    original: i,
                    to_compare: j,
                    similarity,
                });
            }
        }
    }
    // stable: equal scores stay in (original, to_compare) order
    candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    let mut used_original = vec![false; original.len()];
    let mut used_to_compare = vec![false; to_compare.len()];
    let mut matches = Vec::new();
    for candidate in candidates {
        if used_original[candidate.original] || used_to_compare[candidate.to_compare] {
            continue;
        }
        used_original[candidate.original] = true;
        used_to_compare[candidate.to_compare] = true;
        matches.push(candidate);
    }
    matches.sort_by_key(|m| m.original);

    tracing::debug!(matched = matches.len(), "rows matched");
    matches
}
