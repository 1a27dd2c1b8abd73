//! The Cognition Oracle: bounded retries around a [`TextGenerator`] with a
//! typed fail-safe.
//!
//! Every query states how the answer is carried ([`OutputFormat`]), how to
//! accept it and how to turn it into a value. When the budget runs out the
//! caller's fail-safe is returned, so planners never see an LLM error.

use std::sync::atomic::{AtomicUsize, Ordering};

use reverie_core::types::Embedding;
use tracing::{debug, warn};

use crate::client::TextGenerator;
use crate::error::LlmError;
use crate::types::{LlmRequest, OutputFormat};

/// Placeholder text embedded instead of an empty string.
const BLANK_TEXT: &str = "this is blank";

/// Retry/fail-safe wrapper around a generator.
pub struct Oracle<G> {
    generator: G,
    retry_budget: u32,
    /// Length of the zero-vector fallback: the configured size until the
    /// backend answers, then the length of its last embedding.
    embedding_dimensions: AtomicUsize,
}

impl<G: TextGenerator> Oracle<G> {
    /// Wrap a generator.
    #[must_use]
    pub fn new(generator: G, retry_budget: u32, embedding_dimensions: usize) -> Self {
        Self {
            generator,
            retry_budget,
            embedding_dimensions: AtomicUsize::new(embedding_dimensions),
        }
    }

    /// The wrapped generator.
    #[must_use]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Default attempts per query.
    #[must_use]
    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    /// Length of the vector [`Oracle::embed`] falls back to.
    #[must_use]
    pub fn embedding_dimensions(&self) -> usize {
        self.embedding_dimensions.load(Ordering::Relaxed)
    }

    /// Ask with a validator and a cleanup step.
    ///
    /// `cleanup` only ever sees output that `validate` accepted.
    pub async fn query<T>(
        &self,
        request: &LlmRequest,
        format: &OutputFormat,
        validate: impl Fn(&str) -> bool,
        cleanup: impl Fn(&str) -> T,
        fail_safe: T,
    ) -> T {
        self.query_with(request, format, |output| validate(output).then(|| cleanup(output)), fail_safe)
            .await
    }

    /// Ask with a single parse step; `None` counts as a rejected attempt.
    pub async fn query_with<T>(
        &self,
        request: &LlmRequest,
        format: &OutputFormat,
        parse: impl Fn(&str) -> Option<T>,
        fail_safe: T,
    ) -> T {
        self.query_with_budget(request, format, parse, self.retry_budget, fail_safe)
            .await
    }

    /// [`Oracle::query_with`] with its own attempt budget instead of the
    /// configured one.
    pub async fn query_with_budget<T>(
        &self,
        request: &LlmRequest,
        format: &OutputFormat,
        parse: impl Fn(&str) -> Option<T>,
        retry_budget: u32,
        fail_safe: T,
    ) -> T {
        let request = format.apply(request);
        for attempt in 1..=retry_budget {
            let response = match self.generator.generate(&request).await {
                Ok(response) => response,
                Err(LlmError::Unavailable(reason)) => {
                    debug!(purpose = %request.purpose, %reason, "No LLM backend, using fail-safe");
                    return fail_safe;
                }
                Err(e) => {
                    warn!(purpose = %request.purpose, attempt, error = %e, "Oracle call failed");
                    continue;
                }
            };

            let Some(output) = format.extract(&response.text) else {
                debug!(purpose = %request.purpose, attempt, "Oracle output missing or malformed");
                continue;
            };
            if let Some(value) = parse(&output) {
                debug!(
                    purpose = %request.purpose,
                    attempt,
                    latency_ms = response.latency_ms,
                    "Oracle answered"
                );
                return value;
            }
            debug!(purpose = %request.purpose, attempt, output = %output, "Oracle output rejected");
        }

        warn!(
            purpose = %request.purpose,
            budget = retry_budget,
            "Oracle retry budget exhausted, using fail-safe"
        );
        fail_safe
    }

    /// Embed a string, falling back to a zero vector as long as the last
    /// embedding the backend produced.
    pub async fn embed(&self, text: &str) -> Embedding {
        let text = if text.trim().is_empty() { BLANK_TEXT } else { text };
        match self.generator.embed(text).await {
            Ok(embedding) => {
                if !embedding.0.is_empty() {
                    self.embedding_dimensions.store(embedding.0.len(), Ordering::Relaxed);
                }
                embedding
            }
            Err(e) => {
                if self.generator.is_available() {
                    warn!(error = %e, "Embedding failed, using zero vector");
                }
                Embedding::zeros(self.embedding_dimensions())
            }
        }
    }
}
