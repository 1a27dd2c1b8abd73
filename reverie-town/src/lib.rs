//! # reverie-town: the persona cognition loop
//!
//! Drives personas living in a `reverie-core` maze. Each step, every
//! persona perceives the tiles around it, recalls related memories, plans,
//! reflects and picks its next tile:
//!
//! ```text
//! ┌──────────────────────────── Town::step ─────────────────────────────┐
//! │  sync tiles ─► for each persona:                                    │
//! │     perceive ─► recall ─► plan ─► reflect ─► execute ─► movement    │
//! │                              │                                      │
//! │                              ▼                                      │
//! │                    Cognition (LLM or rule-based)                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `cognition`: the judgement seam, `LlmCognition` and `RuleBasedCognition`
//! - `perceive` / `retrieve` / `reflect`: memory in and out
//! - `plan`: day plans, action choice, chat and wait reactions
//! - `converse`: turn-by-turn conversations
//! - `execute`: addresses to tiles to paths
//! - `town` / `sync`: the step driver and its JSON exchange
//! - `logging`: tracing subscriber setup

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

pub mod cognition;
pub mod converse;
pub mod execute;
pub mod logging;
pub mod perceive;
pub mod persona;
pub mod plan;
pub mod reflect;
pub mod retrieve;
pub mod sync;
pub mod town;

#[cfg(test)]
mod testing;

pub use cognition::{Cognition, LlmCognition, RuleBasedCognition};
pub use execute::Execution;
pub use persona::{Persona, TickContext};
pub use sync::{StepInput, StepOutput};
pub use town::Town;
