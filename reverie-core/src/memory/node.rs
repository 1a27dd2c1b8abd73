//! Concept nodes: the atomic unit of a persona's associative memory.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::clock;
use crate::types::{NodeId, Triple};

/// What a concept node records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Something the persona perceived.
    Event,
    /// Something the persona concluded (reflection, plan, memo).
    Thought,
    /// A conversation the persona took part in.
    Chat,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Event => "event",
            Self::Thought => "thought",
            Self::Chat => "chat",
        };
        write!(f, "{name}")
    }
}

/// One line of a conversation: `(speaker, utterance)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    /// Who spoke.
    pub speaker: String,
    /// What was said.
    pub text: String,
}

impl Utterance {
    /// Create a new utterance.
    #[must_use]
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// Render a transcript as `speaker: text` lines.
#[must_use]
pub fn transcript_text(lines: &[Utterance]) -> String {
    lines
        .iter()
        .map(|u| format!("{}: {}\n", u.speaker, u.text))
        .collect()
}

/// A single memory node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptNode {
    /// Global (per memory) sequence id.
    pub node_id: NodeId,
    /// Sequence number among nodes of the same kind, starting at 1.
    pub type_count: u64,
    /// Event, thought or chat.
    pub kind: NodeKind,
    /// 0 for events and chats; 1 + deepest evidence for thoughts.
    pub depth: u32,
    /// When the node was recorded.
    #[serde(with = "clock::serde_seconds")]
    pub created: NaiveDateTime,
    /// When the node stops being relevant, if ever.
    #[serde(with = "clock::serde_seconds_option")]
    pub expiration: Option<NaiveDateTime>,
    /// Last time ranked retrieval returned this node.
    #[serde(with = "clock::serde_seconds")]
    pub last_accessed: NaiveDateTime,
    /// Subject of the statement.
    pub subject: String,
    /// Predicate of the statement.
    pub predicate: String,
    /// Object of the statement.
    pub object: String,
    /// Human-readable description.
    pub description: String,
    /// Key of this node's vector in the memory's embedding table.
    pub embedding_key: String,
    /// Importance, 1..=10.
    pub poignancy: u8,
    /// Keywords in their original case.
    pub keywords: BTreeSet<String>,
    /// Nodes this one was derived from.
    #[serde(default)]
    pub evidence: Vec<NodeId>,
    /// Conversation transcript (chat nodes only).
    #[serde(default)]
    pub transcript: Vec<Utterance>,
}

impl ConceptNode {
    /// The node's statement as a triple.
    #[must_use]
    pub fn spo_summary(&self) -> Triple {
        Triple::new(&self.subject, &self.predicate, &self.object)
    }

    /// Case-insensitive keyword membership.
    #[must_use]
    pub fn has_keyword(&self, keyword: &str) -> bool {
        let wanted = keyword.to_lowercase();
        self.keywords.iter().any(|k| k.to_lowercase() == wanted)
    }

    /// Idle nodes are skipped by ranked retrieval and focal-point generation.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.embedding_key.contains("idle")
    }
}
