//! Step exchange with a front end: tiles in, movements out.

use std::collections::BTreeMap;

use reverie_core::memory::Utterance;
use reverie_core::types::Coord;
use reverie_core::{ReverieError, Result};
use serde::{Deserialize, Serialize};

use crate::execute::Execution;

/// Where a persona stands, as reported by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePosition {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

impl From<Coord> for TilePosition {
    fn from((x, y): Coord) -> Self {
        Self { x, y }
    }
}

impl From<TilePosition> for Coord {
    fn from(p: TilePosition) -> Self {
        (p.x, p.y)
    }
}

/// Environment state for one step, keyed by persona name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepInput(pub BTreeMap<String, TilePosition>);

impl StepInput {
    /// Parse an environment file.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Serialization`] for malformed JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ReverieError::Serialization(e.to_string()))
    }

    /// Reported tile for `name`, if any.
    #[must_use]
    pub fn tile(&self, name: &str) -> Option<Coord> {
        self.0.get(name).copied().map(Coord::from)
    }
}

/// One persona's output for a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaMovement {
    /// Next tile, `[x, y]`.
    pub movement: Coord,
    /// Emoji for the current action.
    pub pronunciatio: String,
    /// `"{description} @ {address}"`.
    pub description: String,
    /// Conversation in progress as `[speaker, line]` pairs.
    pub chat: Option<Vec<(String, String)>>,
}

impl PersonaMovement {
    /// Movement from an execution and the persona's current conversation.
    #[must_use]
    pub fn new(execution: Execution, transcript: &[Utterance]) -> Self {
        let chat = (!transcript.is_empty()).then(|| {
            transcript
                .iter()
                .map(|u| (u.speaker.clone(), u.text.clone()))
                .collect()
        });
        Self {
            movement: execution.next_tile,
            pronunciatio: execution.pronunciatio,
            description: execution.description,
            chat,
        }
    }
}

/// Step-wide metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMeta {
    /// Simulated time of the step, `"February 13, 2023, 00:00:10"`.
    pub curr_time: String,
}

/// Everything the front end needs to draw one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    /// Per-persona movement.
    pub persona: BTreeMap<String, PersonaMovement>,
    /// Step metadata.
    pub meta: StepMeta,
}

impl StepOutput {
    /// Serialize for the front end.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ReverieError::Serialization(e.to_string()))
    }
}
