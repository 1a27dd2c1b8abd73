//! # reverie-llm: Cognition Oracle for Reverie
//!
//! Every natural-language judgement a persona makes (what to do this hour,
//! where to go, what to say, how poignant an event was) goes through this
//! crate:
//!   - **`LlmClient`** talks to Ollama or any OpenAI-compatible endpoint
//!   - **`Oracle`** retries a query within a budget and falls back to a
//!     caller-supplied value, so a flaky model never stops the simulation
//!   - **`PromptEngine`** holds one template per cognition query, with
//!     optional TOML overrides
//!
//! # Architecture
//!
//! ```text
//! Cognition (reverie-town) ──▶ PromptEngine ──▶ LlmRequest
//!                                                  │
//!                          Oracle::query ◀─────────┘
//!                            │  retry · extract · validate · cleanup
//!                            ▼
//!                     TextGenerator (LlmClient / scripted)
//! ```

#![deny(clippy::unwrap_used)]

pub mod client;
pub mod error;
pub mod oracle;
pub mod prompt;
pub mod types;

pub use client::{LlmClient, LlmProvider, TextGenerator};
pub use error::LlmError;
pub use oracle::Oracle;
pub use prompt::{PromptEngine, PromptId};
pub use types::{LlmRequest, LlmResponse, OutputFormat};
