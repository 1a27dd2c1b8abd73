//! Focal-point retrieval with embeddings resolved through cognition.

use std::collections::HashSet;

use reverie_core::memory::{AssociativeMemory, MemoryBank};
use reverie_core::retrieval::{FocalRetrieval, RetrievalEngine};
use reverie_core::types::NodeId;
use reverie_core::Result;

use crate::cognition::Cognition;

/// Ranked retrieval for each focal point.
///
/// A focal point's embedding comes from the memory's own table when it
/// was embedded before, otherwise from `cognition`.
///
/// # Errors
///
/// Propagates retrieval errors (missing node embeddings, dimension
/// mismatches).
pub async fn focal_retrieve<C: Cognition>(
    bank: &mut MemoryBank,
    cognition: &C,
    engine: &RetrievalEngine,
    focal_points: &[String],
    n: Option<usize>,
) -> Result<Vec<FocalRetrieval>> {
    let mut focal = Vec::with_capacity(focal_points.len());
    for point in focal_points {
        let embedding = match bank.associative.embedding(point) {
            Some(known) => known.clone(),
            None => cognition.embedding(point).await,
        };
        focal.push((point.clone(), embedding));
    }
    let now = bank.scratch.curr_time.unwrap_or_default();
    let params = bank.scratch.params.clone();
    engine.new_retrieve(&mut bank.associative, &params, &focal, n, now)
}

/// Distinct retrieved node ids across focal points, first-seen order.
#[must_use]
pub fn distinct_nodes(retrieved: &[FocalRetrieval]) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    retrieved
        .iter()
        .flat_map(|f| f.results.iter().map(|r| r.node_id))
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Embedding keys of `ids`, the statement form used in prompts.
///
/// # Errors
///
/// Returns `NodeNotFound` for unknown ids.
pub fn statements(memory: &AssociativeMemory, ids: &[NodeId]) -> Result<Vec<String>> {
    ids.iter()
        .map(|id| memory.node(*id).map(|n| n.embedding_key.clone()))
        .collect()
}
