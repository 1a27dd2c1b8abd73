//! Configuration for a Reverie simulation.
//!
//! Maps directly to `reverie.toml`. Every section and field is optional;
//! missing values fall back to the defaults below.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::clock::TIME_FORMAT;
use crate::error::{ReverieError, Result};
use crate::memory::PersonaParams;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReverieConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Clock and randomness.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Default per-persona tuning.
    #[serde(default)]
    pub persona: PersonaParams,
    /// Ranked retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Planner settings.
    #[serde(default)]
    pub planning: PlanningConfig,
    /// LLM integration settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Persistence / save settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl ReverieConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ReverieError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| ReverieError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Simulation clock and randomness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Simulated seconds per tick.
    #[serde(default = "default_10_u32")]
    pub seconds_per_step: u32,
    /// RNG seed for focal-event choice and target sampling.
    #[serde(default)]
    pub seed: u64,
    /// Simulation start, `YYYY-MM-DD HH:MM:SS`.
    #[serde(default = "default_start_time")]
    pub start_time: String,
}

impl SimulationConfig {
    /// Parsed start time.
    ///
    /// # Errors
    /// Returns `ReverieError::Config` for malformed timestamps.
    pub fn start(&self) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.start_time, TIME_FORMAT)
            .map_err(|e| ReverieError::Config(format!("start_time '{}': {e}", self.start_time)))
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seconds_per_step: 10,
            seed: 0,
            start_time: default_start_time(),
        }
    }
}

/// Ranked retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Global recency multiplier.
    #[serde(default = "default_0_5")]
    pub recency_multiplier: f64,
    /// Global relevance multiplier.
    #[serde(default = "default_3_0")]
    pub relevance_multiplier: f64,
    /// Global importance multiplier.
    #[serde(default = "default_2_0")]
    pub importance_multiplier: f64,
    /// Nodes returned per focal point.
    #[serde(default = "default_30_usize")]
    pub default_count: usize,
    /// Nodes retrieved about a conversation partner.
    #[serde(default = "default_50_usize")]
    pub partner_count: usize,
    /// Nodes retrieved as context for each utterance.
    #[serde(default = "default_15_usize")]
    pub utterance_context_count: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            recency_multiplier: 0.5,
            relevance_multiplier: 3.0,
            importance_multiplier: 2.0,
            default_count: 30,
            partner_count: 50,
            utterance_context_count: 15,
        }
    }
}

/// Planner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningConfig {
    /// Hourly schedule generation passes.
    #[serde(default = "default_3_usize")]
    pub diversity_passes: usize,
    /// Distinct activities that end generation early.
    #[serde(default = "default_5_usize")]
    pub min_distinct_activities: usize,
    /// Maximum utterances per conversation.
    #[serde(default = "default_8_usize")]
    pub max_utterances: usize,
    /// Ticks before the same pair may chat again.
    #[serde(default = "default_800")]
    pub chat_cooldown_ticks: u32,
    /// Days a daily plan thought stays relevant.
    #[serde(default = "default_30_i64")]
    pub plan_thought_expiration_days: i64,
    /// Poignancy of the daily plan thought.
    #[serde(default = "default_5_u8")]
    pub plan_poignancy: u8,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            diversity_passes: 3,
            min_distinct_activities: 5,
            max_utterances: 8,
            chat_cooldown_ticks: 800,
            plan_thought_expiration_days: 30,
            plan_poignancy: 5,
        }
    }
}

/// LLM integration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_ollama")]
    pub provider: String,
    /// Base URL for the LLM API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// API key for OpenAI-compatible endpoints.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Completion model.
    #[serde(default = "default_model")]
    pub model: String,
    /// Embedding model.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Embedding vector dimensions.
    #[serde(default = "default_768")]
    pub embedding_dimensions: usize,
    /// Hard timeout for any LLM call in milliseconds.
    #[serde(default = "default_30000")]
    pub request_timeout_ms: u64,
    /// Attempts per Oracle query before the fail-safe is used.
    #[serde(default = "default_5_u32")]
    pub retry_budget: u32,
    /// Sampling temperature.
    #[serde(default = "default_0_5")]
    pub temperature: f64,
    /// Directory of TOML prompt overrides.
    #[serde(default)]
    pub prompt_dir: Option<String>,
    /// Embedding cache capacity.
    #[serde(default = "default_4096")]
    pub embedding_cache_size: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            model: default_model(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: 768,
            request_timeout_ms: 30_000,
            retry_budget: 5,
            temperature: 0.5,
            prompt_dir: None,
            embedding_cache_size: 4096,
        }
    }
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Backend: "sqlite" or "json" (debug).
    #[serde(default = "default_sqlite")]
    pub backend: String,
    /// Database file or JSON directory.
    #[serde(default = "default_save_path")]
    pub path: String,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Number of save backups to keep.
    #[serde(default = "default_3_u32")]
    pub backup_count: u32,
    /// Detect save corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: default_save_path(),
            wal_mode: true,
            backup_count: 3,
            checksum_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_start_time() -> String { "2023-02-13 00:00:00".to_string() }
fn default_ollama() -> String { "ollama".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "llama3.1:8b".to_string() }
fn default_embedding_model() -> String { "nomic-embed-text".to_string() }
fn default_sqlite() -> String { "sqlite".to_string() }
fn default_save_path() -> String { "reverie.db".to_string() }
fn default_0_5() -> f64 { 0.5 }
fn default_2_0() -> f64 { 2.0 }
fn default_3_0() -> f64 { 3.0 }
fn default_3_u32() -> u32 { 3 }
fn default_3_usize() -> usize { 3 }
fn default_5_u8() -> u8 { 5 }
fn default_5_u32() -> u32 { 5 }
fn default_5_usize() -> usize { 5 }
fn default_8_usize() -> usize { 8 }
fn default_10_u32() -> u32 { 10 }
fn default_15_usize() -> usize { 15 }
fn default_30_i64() -> i64 { 30 }
fn default_30_usize() -> usize { 30 }
fn default_50_usize() -> usize { 50 }
fn default_768() -> usize { 768 }
fn default_800() -> u32 { 800 }
fn default_4096() -> usize { 4096 }
fn default_30000() -> u64 { 30_000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = ReverieConfig::from_toml("").expect("parse");
        assert_eq!(cfg.simulation.seconds_per_step, 10);
        assert_eq!(cfg.retrieval.default_count, 30);
        assert_eq!(cfg.planning.max_utterances, 8);
        assert_eq!(cfg.persona.vision_radius, 4);
        assert!((cfg.persona.recency_decay - 0.99).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = ReverieConfig::from_toml(
            r#"
            [simulation]
            seconds_per_step = 60
            seed = 7

            [persona]
            attention_bandwidth = 8

            [llm]
            provider = "openai"
            base_url = "http://localhost:8080"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.simulation.seconds_per_step, 60);
        assert_eq!(cfg.simulation.seed, 7);
        assert_eq!(cfg.persona.attention_bandwidth, 8);
        assert_eq!(cfg.persona.retention, 5);
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.retry_budget, 5);
    }

    #[test]
    fn start_time_parses() {
        let cfg = SimulationConfig::default();
        let start = cfg.start().expect("start");
        assert_eq!(start.format(TIME_FORMAT).to_string(), "2023-02-13 00:00:00");
        let bad = SimulationConfig {
            start_time: "tomorrow".into(),
            ..SimulationConfig::default()
        };
        assert!(matches!(bad.start(), Err(ReverieError::Config(_))));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(matches!(
            ReverieConfig::from_toml("[simulation\nseed = 1"),
            Err(ReverieError::Config(_))
        ));
    }
}
