//! LLM client: one interface over Ollama and OpenAI-compatible backends.

use std::time::{Duration, Instant};

use reqwest::Client;
use reverie_core::config::LlmConfig;
use reverie_core::types::Embedding;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse};

/// Anything that can complete a prompt and embed a string.
///
/// [`LlmClient`] is the production implementation; tests script one.
#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    /// Complete a prompt.
    ///
    /// # Errors
    /// Returns an [`LlmError`] if the backend fails.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Embed a string.
    ///
    /// # Errors
    /// Returns an [`LlmError`] if the backend fails.
    async fn embed(&self, text: &str) -> Result<Embedding, LlmError>;

    /// Whether a backend is configured at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally (recommended).
    Ollama {
        /// Server root, e.g. `http://localhost:11434`.
        base_url: String,
    },
    /// OpenAI-compatible API.
    OpenAiCompatible {
        /// Server root, without `/v1`.
        base_url: String,
        /// Bearer token.
        api_key: String,
    },
    /// No LLM available; every call fails and the Oracle uses its fail-safes.
    None,
}

/// The main LLM client that routes requests to the configured backend.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    embedding_model: String,
    max_retries: u32,
    timeout_ms: u64,
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(
        provider: LlmProvider,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            embedding_model: embedding_model.into(),
            max_retries,
            timeout_ms: 30_000,
        }
    }

    /// Build a client from the `[llm]` config section.
    ///
    /// Transport retries are kept to one; the Oracle owns the real retry budget.
    ///
    /// # Errors
    /// Returns `LlmError::ConfigError` for an unknown provider or an
    /// OpenAI-compatible provider without an API key.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = match config.provider.as_str() {
            "ollama" => LlmProvider::Ollama {
                base_url: config.base_url.trim_end_matches('/').to_string(),
            },
            "openai" => LlmProvider::OpenAiCompatible {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_key: config
                    .api_key
                    .clone()
                    .ok_or_else(|| LlmError::ConfigError("openai provider needs llm.api_key".into()))?,
            },
            "none" => LlmProvider::None,
            other => return Err(LlmError::ConfigError(format!("unknown llm provider '{other}'"))),
        };
        let mut client = Self::new(provider, &config.model, &config.embedding_model, 1);
        client.timeout_ms = config.request_timeout_ms;
        Ok(client)
    }

    /// Create a client with no LLM backend (all calls fail → fail-safes).
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new(), String::new(), 0)
    }

    /// The configured backend.
    #[must_use]
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Generate using Ollama's API.
    async fn generate_ollama(&self, base_url: &str, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{base_url}/api/generate");
        let body = json!({
            "model": self.model,
            "system": request.system,
            "prompt": request.user,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        });

        let (json, latency_ms) = self.post_with_retries(&url, None, &body, request.timeout_ms).await?;
        Ok(LlmResponse {
            text: json["response"].as_str().unwrap_or_default().to_string(),
            tokens_generated: json["eval_count"].as_u64().unwrap_or(0) as u32,
            latency_ms,
            model: self.model.clone(),
        })
    }

    /// Generate using an OpenAI-compatible API.
    async fn generate_openai(
        &self,
        base_url: &str,
        api_key: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let url = format!("{base_url}/v1/chat/completions");
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let (json, latency_ms) = self
            .post_with_retries(&url, Some(api_key), &body, request.timeout_ms)
            .await?;
        Ok(LlmResponse {
            text: json["choices"][0]["message"]["content"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            tokens_generated: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
            latency_ms,
            model: self.model.clone(),
        })
    }

    /// POST a JSON body, retrying transport and HTTP failures.
    async fn post_with_retries(
        &self,
        url: &str,
        api_key: Option<&str>,
        body: &Value,
        timeout_ms: u64,
    ) -> Result<(Value, u64), LlmError> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(url, attempt = attempt + 1, max = self.max_retries + 1, "Retrying LLM call");
            }

            let start = Instant::now();
            let mut builder = self
                .http
                .post(url)
                .json(body)
                .timeout(Duration::from_millis(timeout_ms));
            if let Some(key) = api_key {
                builder = builder.header("Authorization", format!("Bearer {key}"));
            }

            match builder.send().await {
                Ok(resp) if resp.status().is_success() => {
                    let json: Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::ParseError(e.to_string()))?;
                    return Ok((json, start.elapsed().as_millis() as u64));
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}: {}", resp.status(), resp.text().await.unwrap_or_default());
                    warn!(url, error = %last_error, "LLM backend returned error");
                }
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() {
                        warn!(url, timeout_ms, "LLM request timed out");
                    } else {
                        warn!(url, error = %last_error, "LLM request failed");
                    }
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}

impl TextGenerator for LlmClient {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => self.generate_ollama(base_url, request).await,
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                self.generate_openai(base_url, api_key, request).await
            }
        }
    }

    async fn embed(&self, text: &str) -> Result<Embedding, LlmError> {
        let (url, api_key, body) = match &self.provider {
            LlmProvider::None => {
                return Err(LlmError::Unavailable("No LLM provider configured".into()));
            }
            LlmProvider::Ollama { base_url } => (
                format!("{base_url}/api/embeddings"),
                None,
                json!({ "model": self.embedding_model, "prompt": text }),
            ),
            LlmProvider::OpenAiCompatible { base_url, api_key } => (
                format!("{base_url}/v1/embeddings"),
                Some(api_key.as_str()),
                json!({ "model": self.embedding_model, "input": text }),
            ),
        };

        let (json, _) = self.post_with_retries(&url, api_key, &body, self.timeout_ms).await?;
        let vector = json
            .get("embedding")
            .or_else(|| json.pointer("/data/0/embedding"))
            .and_then(Value::as_array)
            .ok_or_else(|| LlmError::ParseError("response carries no embedding".into()))?;
        let values = vector
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| LlmError::ParseError("non-numeric embedding component".into()))
            })
            .collect::<Result<Vec<f32>, LlmError>>()?;
        Ok(Embedding(values))
    }

    fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }
}
