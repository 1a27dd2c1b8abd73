//! Memory structures and the per-persona [`MemoryBank`] aggregate.
//!
//! - [`associative`]: the long-term stream of events, thoughts and chats.
//! - [`spatial`]: the tree of places the persona has seen.
//! - [`scratch`]: short-term working state (identity, schedule, action).

pub mod associative;
pub mod node;
pub mod scratch;
pub mod spatial;

pub use associative::{AssociativeMemory, NodeDraft};
pub use node::{ConceptNode, NodeKind, Utterance};
pub use scratch::{Action, ChatState, Identity, PersonaParams, Scratch};
pub use spatial::SpatialMemory;

use serde::{Deserialize, Serialize};

/// The memory bank: everything one persona knows, and the unit of
/// persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryBank {
    /// Long-term associative memory.
    pub associative: AssociativeMemory,
    /// Known places.
    pub spatial: SpatialMemory,
    /// Working state.
    pub scratch: Scratch,
}

impl MemoryBank {
    /// A fresh bank for a persona.
    #[must_use]
    pub fn new(scratch: Scratch) -> Self {
        Self {
            associative: AssociativeMemory::new(),
            spatial: SpatialMemory::new(),
            scratch,
        }
    }

    /// The owning persona's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.scratch.name()
    }

    /// Total number of associative memory nodes.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.associative.len()
    }
}
