//! Core type definitions shared across the Reverie crates.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Identifier of a node inside one persona's associative memory.
///
/// Ids are allocated from a counter owned by the memory instance, start at 1
/// and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// A tile coordinate in `(x, y)` order: x is the column, y the row.
pub type Coord = (usize, usize);

/// Euclidean distance between two tiles.
#[must_use]
pub fn tile_distance(a: Coord, b: Coord) -> f64 {
    let dx = a.0 as f64 - b.0 as f64;
    let dy = a.1 as f64 - b.1 as f64;
    (dx * dx + dy * dy).sqrt()
}

// ---------------------------------------------------------------------------
// Event triples
// ---------------------------------------------------------------------------

/// A subject / predicate / object statement, e.g.
/// `("Isabella Rodriguez", "is", "brewing coffee")`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Who or what the statement is about.
    pub subject: String,
    /// The relation.
    pub predicate: String,
    /// The object of the relation.
    pub object: String,
}

impl Triple {
    /// Build a triple from anything string-like.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// The canonical idle statement for `subject`.
    #[must_use]
    pub fn idle(subject: impl Into<String>) -> Self {
        Self::new(subject, "is", "idle")
    }

    /// Whether predicate + object read "is idle".
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.predicate == "is" && self.object == "idle"
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.predicate, self.object)
    }
}

// ---------------------------------------------------------------------------
// Memory Embedding Vector
// ---------------------------------------------------------------------------

/// A dense vector embedding for semantic similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    /// A zero vector of the given dimensionality.
    #[must_use]
    pub fn zeros(dimensions: usize) -> Self {
        Self(vec![0.0; dimensions])
    }

    /// Dimensionality of the embedding.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    /// L2 norm.
    #[must_use]
    pub fn norm(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}

// ---------------------------------------------------------------------------
// Retrieval Score
// ---------------------------------------------------------------------------

/// Composite score used to rank memories during retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RetrievalScore(pub OrderedFloat<f64>);

impl RetrievalScore {
    /// Create a retrieval score from a raw f64.
    #[must_use]
    pub fn new(score: f64) -> Self {
        Self(OrderedFloat(score))
    }

    /// Get the raw score value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_displays_with_prefix() {
        assert_eq!(NodeId(12).to_string(), "node_12");
    }

    #[test]
    fn idle_triple_is_idle() {
        assert!(Triple::idle("Klaus Mueller").is_idle());
        assert!(!Triple::new("Klaus Mueller", "is", "reading").is_idle());
    }

    #[test]
    fn tile_distance_is_euclidean() {
        assert!((tile_distance((0, 0), (3, 4)) - 5.0).abs() < 1e-9);
    }
}
