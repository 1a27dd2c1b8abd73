//! Vector embedding abstraction layer.
//!
//! Provides a trait-based interface for generating text embeddings used by
//! ranked retrieval. The network-backed provider lives in `reverie-llm`;
//! this module holds the similarity function and two offline providers.

use crate::error::{ReverieError, Result};
use crate::types::Embedding;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Generate vector embeddings from text.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Serialization`] if the model fails to
    /// produce an embedding.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embed a batch of texts.
    ///
    /// # Errors
    ///
    /// Returns an error if any embedding in the batch fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// The dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A human-readable name for the model.
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Cosine similarity
// ---------------------------------------------------------------------------

/// Cosine similarity between two embedding vectors.
///
/// Returns `0.0` when either vector has zero magnitude, whatever its
/// length; a zero vector is a fallback and carries no direction.
///
/// # Errors
///
/// Non-zero vectors of different length are a structural bug (two
/// embedding models mixed in one memory) and yield
/// [`ReverieError::EmbeddingDimensionMismatch`].
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> Result<f64> {
    if a.norm() == 0.0 || b.norm() == 0.0 {
        return Ok(0.0);
    }
    if a.0.len() != b.0.len() {
        return Err(ReverieError::EmbeddingDimensionMismatch {
            left: a.0.len(),
            right: b.0.len(),
        });
    }

    let mut dot = 0.0_f64;
    let mut mag_a = 0.0_f64;
    let mut mag_b = 0.0_f64;

    for (x, y) in a.0.iter().zip(b.0.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    if mag_a == 0.0 || mag_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (mag_a.sqrt() * mag_b.sqrt()))
}

// ---------------------------------------------------------------------------
// Stub / Zero-cost provider
// ---------------------------------------------------------------------------

/// A stub embedding provider that returns zero-vectors.
///
/// Every relevance score against a zero vector is 0, so ranking falls back
/// to recency and importance.
pub struct StubEmbeddingProvider {
    dims: usize,
}

impl StubEmbeddingProvider {
    /// Create a new stub provider with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dims: dimensions }
    }
}

impl Default for StubEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingProvider for StubEmbeddingProvider {
    fn embed(&self, _text: &str) -> Result<Embedding> {
        Ok(Embedding::zeros(self.dims))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "stub-zero-vector"
    }
}

// ---------------------------------------------------------------------------
// Feature-hashing provider
// ---------------------------------------------------------------------------

/// Deterministic bag-of-words embeddings via feature hashing.
///
/// Each lower-cased alphanumeric token is hashed (FNV-1a) into one of
/// `dims` buckets with a hash-derived sign, then the vector is
/// L2-normalized. Texts sharing words score a positive cosine similarity,
/// which is enough for offline runs and tests.
pub struct HashingEmbeddingProvider {
    dims: usize,
}

impl HashingEmbeddingProvider {
    /// Create a new hashing provider.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dims: dimensions.max(1),
        }
    }
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

impl EmbeddingProvider for HashingEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut raw = vec![0.0_f32; self.dims];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(token);
            let bucket = (h % self.dims as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            raw[bucket] += sign;
        }

        let mag: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        if mag > 0.0 {
            for x in &mut raw {
                *x /= mag;
            }
        }
        Ok(Embedding(raw))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "feature-hashing-bow"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors() {
        let a = Embedding(vec![1.0, 0.0, 0.0]);
        let b = Embedding(vec![1.0, 0.0, 0.0]);
        let sim = cosine_similarity(&a, &b).expect("same dims");
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = Embedding(vec![1.0, 0.0]);
        let b = Embedding(vec![0.0, 1.0]);
        let sim = cosine_similarity(&a, &b).expect("same dims");
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_norm_is_zero() {
        let a = Embedding(vec![0.0, 0.0]);
        let b = Embedding(vec![0.3, 0.4]);
        assert_eq!(cosine_similarity(&a, &b).expect("same dims"), 0.0);
    }

    #[test]
    fn zero_fallback_of_another_length_scores_zero() {
        let fallback = Embedding::zeros(768);
        let real = Embedding(vec![0.3, 0.4]);
        assert_eq!(cosine_similarity(&fallback, &real).expect("zero vector"), 0.0);
        assert_eq!(cosine_similarity(&real, &fallback).expect("zero vector"), 0.0);
    }

    #[test]
    fn cosine_mismatched_dimensions_is_fatal() {
        let a = Embedding(vec![1.0, 0.0]);
        let b = Embedding(vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            cosine_similarity(&a, &b),
            Err(ReverieError::EmbeddingDimensionMismatch { left: 2, right: 3 })
        ));
    }

    #[test]
    fn stub_provider_returns_zeros() {
        let provider = StubEmbeddingProvider::new(4);
        let emb = provider.embed("hello").expect("embed");
        assert_eq!(emb.0.len(), 4);
        assert!(emb.0.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn hashing_provider_is_deterministic_and_unit_length() {
        let provider = HashingEmbeddingProvider::new(64);
        let a = provider.embed("Isabella is brewing coffee").expect("embed");
        let b = provider.embed("Isabella is brewing coffee").expect("embed");
        assert_eq!(a, b);
        assert!((a.norm() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn hashing_provider_shared_words_score_higher() {
        let provider = HashingEmbeddingProvider::new(256);
        let coffee = provider.embed("brewing coffee at the cafe").expect("embed");
        let coffee2 = provider.embed("coffee at the cafe counter").expect("embed");
        let garden = provider.embed("watering tulips").expect("embed");
        let near = cosine_similarity(&coffee, &coffee2).expect("dims");
        let far = cosine_similarity(&coffee, &garden).expect("dims");
        assert!(near > far);
    }

    #[test]
    fn batch_embed_works() {
        let provider = StubEmbeddingProvider::new(8);
        let results = provider.embed_batch(&["hello", "world", "test"]).expect("batch");
        assert_eq!(results.len(), 3);
    }
}
