//! Memory retrieval: keyword recall for perceived events and ranked
//! retrieval for focal points.
//!
//! Ranked retrieval combines three factors per node:
//!   Score = w_rec·0.5·Recency + w_rel·3·Relevance + w_imp·2·Importance
//!
//! Every node it returns is touched (its `last_accessed` set to the query
//! time), so retrieval feeds back into future recency rankings.

pub mod scoring;

use chrono::NaiveDateTime;
use std::time::Instant;
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::memory::{AssociativeMemory, ConceptNode, PersonaParams};
use crate::types::{Embedding, NodeId, RetrievalScore};

/// Keyword recall for one perceived event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecallContext {
    /// The perceived event node.
    pub curr_event: NodeId,
    /// Events sharing a keyword with it.
    pub events: Vec<NodeId>,
    /// Thoughts sharing a keyword with it.
    pub thoughts: Vec<NodeId>,
}

/// Breakdown of a retrieval score into its weighted factors.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    /// Recency contribution.
    pub recency: f64,
    /// Relevance contribution.
    pub relevance: f64,
    /// Importance contribution.
    pub importance: f64,
}

/// A scored node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalResult {
    /// The node.
    pub node_id: NodeId,
    /// Combined score.
    pub score: RetrievalScore,
    /// Per-factor contributions.
    pub breakdown: ScoreBreakdown,
}

/// Ranked results for one focal point.
#[derive(Debug, Clone, PartialEq)]
pub struct FocalRetrieval {
    /// The focal point text.
    pub focal_point: String,
    /// Best first.
    pub results: Vec<RetrievalResult>,
}

impl FocalRetrieval {
    /// Node ids, best first.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.results.iter().map(|r| r.node_id).collect()
    }
}

/// The retrieval engine.
#[derive(Debug, Clone, Default)]
pub struct RetrievalEngine {
    config: RetrievalConfig,
}

impl RetrievalEngine {
    /// Create a retrieval engine.
    #[must_use]
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Exact keyword recall: for each perceived event, the events and
    /// thoughts indexed under its subject, predicate or object.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReverieError::NodeNotFound`] for unknown ids.
    pub fn recall(&self, memory: &AssociativeMemory, perceived: &[NodeId]) -> Result<Vec<RecallContext>> {
        perceived
            .iter()
            .map(|id| {
                let node = memory.node(*id)?;
                Ok(RecallContext {
                    curr_event: *id,
                    events: memory.retrieve_relevant_events(&node.subject, &node.predicate, &node.object),
                    thoughts: memory.retrieve_relevant_thoughts(&node.subject, &node.predicate, &node.object),
                })
            })
            .collect()
    }

    /// Score every non-idle event and thought against one focal embedding,
    /// without touching anything. Results are best first, at most `n`.
    ///
    /// # Errors
    ///
    /// Propagates missing-embedding and dimension-mismatch errors.
    pub fn rank(
        &self,
        memory: &AssociativeMemory,
        params: &PersonaParams,
        focal: &Embedding,
        n: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let mut candidates: Vec<&ConceptNode> =
            memory.events_and_thoughts().filter(|n| !n.is_idle()).collect();
        candidates.sort_by_key(|n| n.last_accessed);

        let ids: Vec<NodeId> = candidates.iter().map(|n| n.node_id).collect();
        let zip = |values: Vec<f64>| -> Vec<(NodeId, f64)> { ids.iter().copied().zip(values).collect() };

        let mut recency = zip(scoring::recency_scores(&candidates, params.recency_decay));
        let mut importance = zip(scoring::importance_scores(&candidates));
        let mut relevance = zip(scoring::relevance_scores(memory, &candidates, focal)?);
        scoring::normalize_dict_floats(&mut recency, 0.0, 1.0);
        scoring::normalize_dict_floats(&mut importance, 0.0, 1.0);
        scoring::normalize_dict_floats(&mut relevance, 0.0, 1.0);

        let breakdowns: Vec<ScoreBreakdown> = (0..ids.len())
            .map(|i| ScoreBreakdown {
                recency: params.recency_weight * recency[i].1 * self.config.recency_multiplier,
                relevance: params.relevance_weight * relevance[i].1 * self.config.relevance_multiplier,
                importance: params.importance_weight * importance[i].1 * self.config.importance_multiplier,
            })
            .collect();
        let master: Vec<(usize, f64)> = breakdowns
            .iter()
            .enumerate()
            .map(|(i, b)| (i, b.recency + b.relevance + b.importance))
            .collect();

        Ok(scoring::top_highest_x_values(&master, n)
            .into_iter()
            .map(|(i, score)| RetrievalResult {
                node_id: ids[i],
                score: RetrievalScore::new(score),
                breakdown: breakdowns[i],
            })
            .collect())
    }

    /// Ranked retrieval for each focal point, touching every returned node.
    ///
    /// Focal points are processed in order and each one's touches are
    /// visible to the next. `n` defaults to the configured count.
    ///
    /// # Errors
    ///
    /// Propagates missing-embedding and dimension-mismatch errors.
    pub fn new_retrieve(
        &self,
        memory: &mut AssociativeMemory,
        params: &PersonaParams,
        focal_points: &[(String, Embedding)],
        n: Option<usize>,
        now: NaiveDateTime,
    ) -> Result<Vec<FocalRetrieval>> {
        let n = n.unwrap_or(self.config.default_count);
        let mut out = Vec::with_capacity(focal_points.len());
        for (focal_point, embedding) in focal_points {
            let start = Instant::now();
            let results = self.rank(memory, params, embedding, n)?;
            for r in &results {
                memory.touch(r.node_id, now)?;
            }
            debug!(
                focal_point = %focal_point,
                returned = results.len(),
                elapsed_us = start.elapsed().as_micros() as u64,
                "Ranked retrieval complete"
            );
            out.push(FocalRetrieval {
                focal_point: focal_point.clone(),
                results,
            });
        }
        Ok(out)
    }
}
