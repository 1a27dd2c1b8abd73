//! Per-factor scoring and score-table helpers for ranked retrieval.
//!
//! Score = w_rec·g_rec·Recency + w_rel·g_rel·Relevance + w_imp·g_imp·Importance
//!
//! Where (after independent min–max normalization of each factor):
//!   Recency(m)    = decay^rank, rank counted from the most recently accessed node (1)
//!   Relevance(m)  = cosine_similarity(focal_embedding, node_embedding)
//!   Importance(m) = poignancy
//!
//! `w_*` are per-persona weights, `g_*` the global multipliers.

use crate::embedding::cosine_similarity;
use crate::error::{ReverieError, Result};
use crate::memory::{AssociativeMemory, ConceptNode};
use crate::types::Embedding;

/// Min–max normalize `scores` into `[target_min, target_max]` in place.
///
/// When every value is equal there is no spread to scale, and every entry
/// maps to the midpoint of the target range.
pub fn normalize_dict_floats<K>(scores: &mut [(K, f64)], target_min: f64, target_max: f64) {
    let Some(min) = scores.iter().map(|(_, v)| *v).reduce(f64::min) else {
        return;
    };
    let max = scores.iter().map(|(_, v)| *v).fold(min, f64::max);
    let range = max - min;
    for (_, value) in scores.iter_mut() {
        *value = if range == 0.0 {
            (target_min + target_max) / 2.0
        } else {
            (*value - min) * (target_max - target_min) / range + target_min
        };
    }
}

/// The `x` highest-scoring entries, best first. Ties keep input order.
#[must_use]
pub fn top_highest_x_values<K: Clone>(scores: &[(K, f64)], x: usize) -> Vec<(K, f64)> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    sorted.truncate(x);
    sorted
}

/// Recency factor for candidates sorted oldest-access first: the most
/// recently accessed candidate gets `decay^1`, the next `decay^2`, and so on.
#[must_use]
pub fn recency_scores(candidates: &[&ConceptNode], decay: f64) -> Vec<f64> {
    let len = candidates.len();
    (0..len)
        .map(|i| decay.powi(i32::try_from(len - i).unwrap_or(i32::MAX)))
        .collect()
}

/// Importance factor: raw poignancy.
#[must_use]
pub fn importance_scores(candidates: &[&ConceptNode]) -> Vec<f64> {
    candidates.iter().map(|n| f64::from(n.poignancy)).collect()
}

/// Relevance factor: cosine similarity to the focal embedding.
///
/// # Errors
///
/// Returns [`ReverieError::EmbeddingMissing`] for nodes whose embedding key
/// has no stored vector and [`ReverieError::EmbeddingDimensionMismatch`]
/// when vector lengths differ.
pub fn relevance_scores(
    memory: &AssociativeMemory,
    candidates: &[&ConceptNode],
    focal: &Embedding,
) -> Result<Vec<f64>> {
    candidates
        .iter()
        .map(|n| {
            let emb = memory
                .embedding(&n.embedding_key)
                .ok_or_else(|| ReverieError::EmbeddingMissing(n.embedding_key.clone()))?;
            cosine_similarity(emb, focal)
        })
        .collect()
}
