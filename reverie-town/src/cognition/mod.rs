//! The cognition seam: every judgement a persona needs from a language
//! model, as one async trait.
//!
//! [`LlmCognition`] answers through the Oracle; [`RuleBasedCognition`]
//! answers from fixed rules and is always available (tests, benchmarks and
//! runs without a model).

pub mod llm;
pub mod rule_based;

use reverie_core::memory::{Scratch, SpatialMemory, Utterance};
use reverie_core::schedule::{ScheduleBlock, SpliceRegion};
use reverie_core::types::{Embedding, Triple};

pub use llm::LlmCognition;
pub use rule_based::RuleBasedCognition;

/// Result of the new-day identity revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityRevision {
    /// What the persona noted about yesterday, for logs.
    pub notes: String,
    /// Revised `currently` status.
    pub currently: String,
    /// Revised daily plan requirement.
    pub daily_plan_req: String,
}

/// A line of conversation plus whether it ends the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextLine {
    /// What the speaker says.
    pub text: String,
    /// Whether this line closes the conversation.
    pub ends_conversation: bool,
}

/// Language-level judgements used by perception, planning, conversation
/// and reflection.
///
/// Implementations never fail: an answer that cannot be produced is
/// replaced by a sensible default.
#[allow(async_fn_in_trait)]
pub trait Cognition {
    /// Hour of day (0-23) the persona wakes up.
    async fn wake_up_hour(&self, scratch: &Scratch) -> u32;

    /// Broad-stroke plan items for the first day.
    async fn daily_plan(&self, scratch: &Scratch, wake_up_hour: u32) -> Vec<String>;

    /// Activity for one hour given the hours decided so far.
    async fn hourly_activity(&self, scratch: &Scratch, hour: u32, so_far: &[String]) -> String;

    /// `(subtask, minutes)` pairs for the block starting at `start_minute`.
    async fn task_decomposition(
        &self,
        scratch: &Scratch,
        task: &str,
        start_minute: u32,
        minutes: u32,
    ) -> Vec<(String, u32)>;

    /// Sector for an activity, from the sectors the persona knows.
    async fn action_sector(&self, scratch: &Scratch, spatial: &SpatialMemory, world: &str, activity: &str) -> String;

    /// Arena within `world:sector` for an activity.
    async fn action_arena(
        &self,
        scratch: &Scratch,
        spatial: &SpatialMemory,
        sector_address: &str,
        activity: &str,
    ) -> String;

    /// One of `objects` for an activity.
    async fn action_object(&self, activity: &str, objects: &[&str]) -> String;

    /// Emoji shorthand for an action.
    async fn pronunciatio(&self, description: &str) -> String;

    /// `(subject, predicate, object)` for `subject is description`.
    async fn event_triple(&self, subject: &str, description: &str) -> Triple;

    /// State of `object` while the persona does `activity` with it.
    async fn object_state(&self, scratch: &Scratch, object: &str, activity: &str) -> String;

    /// Poignancy (1-10) of a perceived event.
    async fn event_poignancy(&self, scratch: &Scratch, description: &str) -> u8;

    /// Poignancy (1-10) of a conversation.
    async fn chat_poignancy(&self, scratch: &Scratch, description: &str) -> u8;

    /// Whether `init` starts a conversation with `target`.
    async fn decide_to_talk(&self, init: &Scratch, target: &Scratch, context: &str) -> bool;

    /// Whether `init` waits for `target` to finish.
    async fn decide_to_react(&self, init: &Scratch, target: &Scratch, context: &str) -> bool;

    /// How `init` relates to `target`, given retrieved statements.
    async fn relationship_summary(&self, init: &Scratch, target: &Scratch, statements: &str) -> String;

    /// The speaker's next line.
    async fn utterance(
        &self,
        speaker: &Scratch,
        listener: &Scratch,
        relationship: &str,
        memories: &str,
        transcript: &[Utterance],
    ) -> NextLine;

    /// One-phrase summary of a conversation.
    async fn conversation_summary(&self, scratch: &Scratch, transcript: &[Utterance]) -> String;

    /// Questions worth reflecting on.
    async fn focal_points(&self, scratch: &Scratch, statements: &str, count: usize) -> Vec<String>;

    /// Insights with the indices of the statements that support them.
    async fn insights(&self, scratch: &Scratch, statements: &str, count: usize) -> Vec<(String, Vec<usize>)>;

    /// What to remember from a conversation for planning.
    async fn planning_thought(&self, scratch: &Scratch, transcript: &[Utterance]) -> String;

    /// The persona's take on a conversation, completing `"{name} ..."`.
    async fn conversation_memo(&self, scratch: &Scratch, transcript: &[Utterance]) -> String;

    /// New-day status and plan requirement.
    async fn revise_identity(&self, scratch: &Scratch, statements: &str) -> IdentityRevision;

    /// Proposed replacement for a spliced region, if any.
    async fn revise_schedule(
        &self,
        scratch: &Scratch,
        region: &SpliceRegion,
        inserted: &str,
        inserted_minutes: u32,
    ) -> Option<Vec<ScheduleBlock>>;

    /// Embedding for a string.
    async fn embedding(&self, text: &str) -> Embedding;
}

/// Numbered statement list used as prompt context: `"0. first\n1. second"`.
#[must_use]
pub fn numbered(statements: &[String]) -> String {
    statements
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{i}. {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}
