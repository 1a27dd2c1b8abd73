//! Core types for LLM requests and responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// Which cognition query this is, for logs.
    pub purpose: String,
    /// System prompt.
    pub system: String,
    /// User prompt (identity, memories, instructions).
    pub user: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LlmRequest {
    /// Create a request with short-answer defaults.
    #[must_use]
    pub fn new(purpose: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            system: system.into(),
            user: user.into(),
            max_tokens: 150,
            temperature: 0.5,
            timeout_ms: 30_000,
        }
    }

    /// Set the token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A response from the LLM.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,
    /// How many tokens were generated.
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model was used.
    pub model: String,
}

/// How the answer is carried in the model output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    /// The whole completion, trimmed.
    Plain,
    /// A JSON object whose `"output"` field carries the answer.
    Json {
        /// Example value shown to the model.
        example: Value,
        /// Extra instruction appended before the example.
        instruction: String,
    },
}

impl OutputFormat {
    /// JSON output with an example and no extra instruction.
    #[must_use]
    pub fn json(example: Value) -> Self {
        Self::Json {
            example,
            instruction: String::new(),
        }
    }

    /// Append the output contract to a request's user prompt.
    #[must_use]
    pub fn apply(&self, request: &LlmRequest) -> LlmRequest {
        let mut request = request.clone();
        if let Self::Json { example, instruction } = self {
            let example = serde_json::json!({ "output": example });
            request.user.push_str("\n\nOutput format: a JSON object with a single \"output\" field.");
            if !instruction.is_empty() {
                request.user.push(' ');
                request.user.push_str(instruction);
            }
            request.user.push_str("\nExample output json:\n");
            request.user.push_str(&example.to_string());
        }
        request
    }

    /// Pull the answer out of raw completion text.
    ///
    /// JSON answers that are strings come back unquoted; any other JSON
    /// value comes back as its compact JSON text.
    #[must_use]
    pub fn extract(&self, text: &str) -> Option<String> {
        match self {
            Self::Plain => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Self::Json { .. } => {
                let start = text.find('{')?;
                let end = text.rfind('}')?;
                if end < start {
                    return None;
                }
                let value: Value = serde_json::from_str(&text[start..=end]).ok()?;
                match value.get("output")? {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                }
            }
        }
    }
}
