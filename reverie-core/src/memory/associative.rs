//! Associative memory: the append-only, keyword-indexed stream of
//! everything a persona perceived, concluded or said.
//!
//! Nodes are never removed. Per-kind sequences and keyword lists are kept
//! most-recent-first by insertion order, so lookups naturally return the
//! newest match first.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::error::{ReverieError, Result};
use crate::memory::node::{ConceptNode, NodeKind, Utterance};
use crate::types::{Embedding, NodeId, Triple};

/// Everything needed to record a node, minus the bookkeeping the memory
/// assigns itself (ids, depth, access time).
#[derive(Debug, Clone)]
pub struct NodeDraft {
    /// Recording time.
    pub created: NaiveDateTime,
    /// Optional expiry.
    pub expiration: Option<NaiveDateTime>,
    /// Statement.
    pub triple: Triple,
    /// Human-readable description.
    pub description: String,
    /// Keywords (original case).
    pub keywords: BTreeSet<String>,
    /// Importance, 1..=10.
    pub poignancy: u8,
    /// Embedding key (usually the embedded text).
    pub embedding_key: String,
    /// Vector stored under `embedding_key`.
    pub embedding: Embedding,
    /// Evidence nodes.
    pub evidence: Vec<NodeId>,
    /// Transcript for chat nodes.
    pub transcript: Vec<Utterance>,
}

impl NodeDraft {
    /// A draft with no evidence, expiry or transcript.
    #[must_use]
    pub fn new(
        created: NaiveDateTime,
        triple: Triple,
        description: impl Into<String>,
        poignancy: u8,
        embedding_key: impl Into<String>,
        embedding: Embedding,
    ) -> Self {
        Self {
            created,
            expiration: None,
            triple,
            description: description.into(),
            keywords: BTreeSet::new(),
            poignancy,
            embedding_key: embedding_key.into(),
            embedding,
            evidence: Vec::new(),
            transcript: Vec::new(),
        }
    }

    /// Set the keyword set.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Set the expiration time.
    #[must_use]
    pub fn with_expiration(mut self, expiration: NaiveDateTime) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Set the evidence list.
    #[must_use]
    pub fn with_evidence(mut self, evidence: Vec<NodeId>) -> Self {
        self.evidence = evidence;
        self
    }

    /// Attach a conversation transcript.
    #[must_use]
    pub fn with_transcript(mut self, transcript: Vec<Utterance>) -> Self {
        self.transcript = transcript;
        self
    }
}

/// Strip a cosmetic parenthetical from an event description:
/// `"Isabella Rodriguez is having breakfast (eating toast)"` becomes
/// `"Isabella Rodriguez is eating toast"`.
#[must_use]
pub fn clean_event_description(description: &str) -> String {
    let Some(open) = description.rfind('(') else {
        return description.to_string();
    };
    let head: Vec<&str> = description.split_whitespace().take(3).collect();
    let inner = &description[open + 1..];
    let inner = inner.strip_suffix(')').unwrap_or(inner);
    format!("{} {}", head.join(" "), inner)
}

/// One persona's associative memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssociativeMemory {
    /// Last id handed out; the next node gets `next_id + 1`.
    next_id: u64,
    /// All nodes, `nodes[i]` has id `i + 1`.
    nodes: Vec<ConceptNode>,
    seq_event: VecDeque<NodeId>,
    seq_thought: VecDeque<NodeId>,
    seq_chat: VecDeque<NodeId>,
    kw_to_event: HashMap<String, VecDeque<NodeId>>,
    kw_to_thought: HashMap<String, VecDeque<NodeId>>,
    kw_to_chat: HashMap<String, VecDeque<NodeId>>,
    kw_strength_event: HashMap<String, u32>,
    kw_strength_thought: HashMap<String, u32>,
    embeddings: HashMap<String, Embedding>,
}

impl AssociativeMemory {
    /// Create an empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes of every kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node was ever recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Record a perceived event.
    pub fn add_event(&mut self, draft: NodeDraft) -> NodeId {
        let mut draft = draft;
        if draft.description.contains('(') {
            draft.description = clean_event_description(&draft.description);
        }
        self.insert(NodeKind::Event, 0, draft)
    }

    /// Record a thought. Depth is one more than the deepest evidence node.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::NodeNotFound`] if an evidence id is unknown.
    pub fn add_thought(&mut self, draft: NodeDraft) -> Result<NodeId> {
        let mut depth = 1;
        if !draft.evidence.is_empty() {
            let deepest = draft
                .evidence
                .iter()
                .map(|id| self.node(*id).map(|n| n.depth))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .max()
                .unwrap_or(0);
            depth += deepest;
        }
        Ok(self.insert(NodeKind::Thought, depth, draft))
    }

    /// Record a conversation.
    pub fn add_chat(&mut self, draft: NodeDraft) -> NodeId {
        self.insert(NodeKind::Chat, 0, draft)
    }

    fn insert(&mut self, kind: NodeKind, depth: u32, draft: NodeDraft) -> NodeId {
        self.next_id += 1;
        let node_id = NodeId(self.next_id);

        let (seq, kw_index) = match kind {
            NodeKind::Event => (&mut self.seq_event, &mut self.kw_to_event),
            NodeKind::Thought => (&mut self.seq_thought, &mut self.kw_to_thought),
            NodeKind::Chat => (&mut self.seq_chat, &mut self.kw_to_chat),
        };
        let type_count = seq.len() as u64 + 1;
        seq.push_front(node_id);

        let lowered: BTreeSet<String> = draft.keywords.iter().map(|k| k.to_lowercase()).collect();
        for kw in &lowered {
            kw_index.entry(kw.clone()).or_default().push_front(node_id);
        }

        let strength = match kind {
            NodeKind::Event => Some(&mut self.kw_strength_event),
            NodeKind::Thought => Some(&mut self.kw_strength_thought),
            NodeKind::Chat => None,
        };
        if let Some(strength) = strength {
            if format!("{} {}", draft.triple.predicate, draft.triple.object) != "is idle" {
                for kw in &lowered {
                    *strength.entry(kw.clone()).or_insert(0) += 1;
                }
            }
        }

        self.embeddings
            .insert(draft.embedding_key.clone(), draft.embedding);

        debug!(
            node = %node_id,
            kind = %kind,
            depth,
            poignancy = draft.poignancy,
            description = %draft.description,
            "Recorded memory node"
        );

        self.nodes.push(ConceptNode {
            node_id,
            type_count,
            kind,
            depth,
            created: draft.created,
            expiration: draft.expiration,
            last_accessed: draft.created,
            subject: draft.triple.subject,
            predicate: draft.triple.predicate,
            object: draft.triple.object,
            description: draft.description,
            embedding_key: draft.embedding_key,
            poignancy: draft.poignancy,
            keywords: draft.keywords,
            evidence: draft.evidence,
            transcript: draft.transcript,
        });

        node_id
    }

    /// Look up a node.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::NodeNotFound`] for ids this memory never issued.
    pub fn node(&self, id: NodeId) -> Result<&ConceptNode> {
        id.0.checked_sub(1)
            .and_then(|i| self.nodes.get(i as usize))
            .ok_or(ReverieError::NodeNotFound(id))
    }

    /// Mark a node as used by retrieval at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::NodeNotFound`] for unknown ids.
    pub fn touch(&mut self, id: NodeId, now: NaiveDateTime) -> Result<()> {
        let node = id
            .0
            .checked_sub(1)
            .and_then(|i| self.nodes.get_mut(i as usize))
            .ok_or(ReverieError::NodeNotFound(id))?;
        node.last_accessed = now;
        Ok(())
    }

    fn resolve<'a>(&'a self, ids: &'a VecDeque<NodeId>) -> impl Iterator<Item = &'a ConceptNode> + 'a {
        ids.iter().filter_map(|id| self.node(*id).ok())
    }

    /// Events, most recent first.
    pub fn seq_event(&self) -> impl Iterator<Item = &ConceptNode> + '_ {
        self.resolve(&self.seq_event)
    }

    /// Thoughts, most recent first.
    pub fn seq_thought(&self) -> impl Iterator<Item = &ConceptNode> + '_ {
        self.resolve(&self.seq_thought)
    }

    /// Chats, most recent first.
    pub fn seq_chat(&self) -> impl Iterator<Item = &ConceptNode> + '_ {
        self.resolve(&self.seq_chat)
    }

    /// Events followed by thoughts, each most recent first.
    pub fn events_and_thoughts(&self) -> impl Iterator<Item = &ConceptNode> + '_ {
        self.seq_event().chain(self.seq_thought())
    }

    /// Triples of the `retention` most recent events.
    #[must_use]
    pub fn get_summarized_latest_events(&self, retention: usize) -> HashSet<Triple> {
        self.seq_event()
            .take(retention)
            .map(ConceptNode::spo_summary)
            .collect()
    }

    fn lookup(index: &HashMap<String, VecDeque<NodeId>>, contents: [&str; 3]) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for content in contents {
            if let Some(ids) = index.get(&content.to_lowercase()) {
                for id in ids {
                    if seen.insert(*id) {
                        out.push(*id);
                    }
                }
            }
        }
        out
    }

    /// Events indexed under the subject, predicate or object (case-insensitive).
    #[must_use]
    pub fn retrieve_relevant_events(&self, subject: &str, predicate: &str, object: &str) -> Vec<NodeId> {
        Self::lookup(&self.kw_to_event, [subject, predicate, object])
    }

    /// Thoughts indexed under the subject, predicate or object (case-insensitive).
    #[must_use]
    pub fn retrieve_relevant_thoughts(&self, subject: &str, predicate: &str, object: &str) -> Vec<NodeId> {
        Self::lookup(&self.kw_to_thought, [subject, predicate, object])
    }

    /// Most recent chat whose keywords contain `name`.
    #[must_use]
    pub fn get_last_chat(&self, name: &str) -> Option<&ConceptNode> {
        self.kw_to_chat
            .get(&name.to_lowercase())
            .and_then(|ids| ids.front())
            .and_then(|id| self.node(*id).ok())
    }

    /// Stored vector for an embedding key.
    #[must_use]
    pub fn embedding(&self, key: &str) -> Option<&Embedding> {
        self.embeddings.get(key)
    }

    /// Number of stored embedding vectors.
    #[must_use]
    pub fn embedding_count(&self) -> usize {
        self.embeddings.len()
    }

    /// How often a keyword appeared in non-idle events.
    #[must_use]
    pub fn keyword_strength_event(&self, keyword: &str) -> u32 {
        self.kw_strength_event
            .get(&keyword.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// How often a keyword appeared in non-idle thoughts.
    #[must_use]
    pub fn keyword_strength_thought(&self, keyword: &str) -> u32 {
        self.kw_strength_thought
            .get(&keyword.to_lowercase())
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 2, 13)
            .and_then(|d| d.and_hms_opt(9, minute, 0))
            .expect("valid time")
    }

    fn event(mem: &mut AssociativeMemory, minute: u32, s: &str, p: &str, o: &str) -> NodeId {
        let desc = format!("{s} {p} {o}");
        mem.add_event(
            NodeDraft::new(t(minute), Triple::new(s, p, o), &desc, 3, &desc, Embedding(vec![1.0, 0.0]))
                .with_keywords([s, o]),
        )
    }

    #[test]
    fn ids_are_monotonic_across_kinds() {
        let mut mem = AssociativeMemory::new();
        let a = event(&mut mem, 0, "Klaus", "is", "reading");
        let b = mem.add_chat(NodeDraft::new(
            t(1),
            Triple::new("Klaus", "chat with", "Maria"),
            "chatting",
            4,
            "chatting",
            Embedding(vec![0.0, 1.0]),
        ));
        let c = event(&mut mem, 2, "Maria", "is", "painting");
        assert_eq!((a, b, c), (NodeId(1), NodeId(2), NodeId(3)));
        assert_eq!(mem.node(c).expect("node").type_count, 2);
    }

    #[test]
    fn sequences_are_most_recent_first() {
        let mut mem = AssociativeMemory::new();
        event(&mut mem, 0, "Klaus", "is", "reading");
        event(&mut mem, 1, "Klaus", "is", "writing");
        let latest: Vec<_> = mem.seq_event().map(|n| n.object.clone()).collect();
        assert_eq!(latest, vec!["writing", "reading"]);
    }

    #[test]
    fn event_description_parenthetical_is_cleaned() {
        assert_eq!(
            clean_event_description("Isabella Rodriguez is having breakfast (eating toast)"),
            "Isabella Rodriguez is eating toast"
        );
        assert_eq!(clean_event_description("bed is idle"), "bed is idle");
    }

    #[test]
    fn thought_depth_follows_evidence() {
        let mut mem = AssociativeMemory::new();
        let e = event(&mut mem, 0, "Klaus", "is", "reading");
        let draft = |evidence: Vec<NodeId>| {
            NodeDraft::new(t(5), Triple::new("Klaus", "likes", "books"), "Klaus likes books", 5, "Klaus likes books", Embedding(vec![1.0, 1.0]))
                .with_evidence(evidence)
        };
        let t1 = mem.add_thought(draft(vec![e])).expect("thought");
        let t2 = mem.add_thought(draft(vec![e, t1])).expect("thought");
        let t3 = mem.add_thought(draft(vec![])).expect("thought");
        assert_eq!(mem.node(e).expect("e").depth, 0);
        assert_eq!(mem.node(t1).expect("t1").depth, 1);
        assert_eq!(mem.node(t2).expect("t2").depth, 2);
        assert_eq!(mem.node(t3).expect("t3").depth, 1);
    }

    #[test]
    fn thought_with_unknown_evidence_is_rejected() {
        let mut mem = AssociativeMemory::new();
        let draft = NodeDraft::new(t(0), Triple::new("a", "b", "c"), "abc", 1, "abc", Embedding(vec![1.0]))
            .with_evidence(vec![NodeId(42)]);
        assert!(matches!(mem.add_thought(draft), Err(ReverieError::NodeNotFound(NodeId(42)))));
    }

    #[test]
    fn idle_events_do_not_change_keyword_strength() {
        let mut mem = AssociativeMemory::new();
        event(&mut mem, 0, "Klaus", "is", "idle");
        assert_eq!(mem.keyword_strength_event("klaus"), 0);
        assert_eq!(mem.retrieve_relevant_events("Klaus", "is", "idle").len(), 1);
        event(&mut mem, 1, "Klaus", "is", "reading");
        assert_eq!(mem.keyword_strength_event("Klaus"), 1);
        assert_eq!(mem.len(), 2);
    }

    #[test]
    fn keyword_lookup_is_case_insensitive_and_deduplicated() {
        let mut mem = AssociativeMemory::new();
        let id = event(&mut mem, 0, "Klaus", "is", "Klaus");
        let found = mem.retrieve_relevant_events("KLAUS", "is", "klaus");
        assert_eq!(found, vec![id]);
    }

    #[test]
    fn last_chat_is_found_by_partner_name() {
        let mut mem = AssociativeMemory::new();
        for minute in 0..2 {
            mem.add_chat(
                NodeDraft::new(t(minute), Triple::new("Klaus", "chat with", "Maria"), format!("chat {minute}"), 4, format!("chat {minute}"), Embedding(vec![1.0]))
                    .with_keywords(["Klaus", "Maria"]),
            );
        }
        let last = mem.get_last_chat("maria").expect("chat");
        assert_eq!(last.description, "chat 1");
        assert!(mem.get_last_chat("Isabella").is_none());
    }

    #[test]
    fn touch_updates_last_accessed() {
        let mut mem = AssociativeMemory::new();
        let id = event(&mut mem, 0, "Klaus", "is", "reading");
        mem.touch(id, t(30)).expect("touch");
        assert_eq!(mem.node(id).expect("node").last_accessed, t(30));
        assert!(mem.touch(NodeId(9), t(30)).is_err());
    }
}
