//! Prompt templates for every cognition query.
//!
//! Built-in templates are compiled in. A directory of TOML files can
//! override any of them by [`PromptId`] filename; the rest stay built in.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use crate::error::LlmError;
use crate::types::LlmRequest;

/// Shared system prompt: the model plays the persona's inner voice.
pub const PERSONA_SYSTEM: &str = r"You simulate the inner life of a character in a small town.
Answer only what is asked, in the requested format, with no commentary.";

pub const WAKE_UP_HOUR: &str = r"{identity}

In general, {lifestyle}
What hour does {first_name} wake up today? Answer with a single hour such as 7am.";

pub const DAILY_PLAN: &str = r"{identity}

In general, {lifestyle}
Today is {date}. Describe {first_name}'s plan for today in broad strokes, starting with waking up at {wake_up_hour}:00 am.
Give 4 to 8 short items, each phrased as an activity (e.g. have lunch at 12:00 pm).";

pub const HOURLY_SCHEDULE: &str = r"{identity}

Hourly schedule format:
{hour_slots}

{daily_plan}

Schedule so far:
{schedule_so_far}

What is {first_name} doing during the hour starting at {hour}? Answer with one short activity phrase.";

pub const TASK_DECOMPOSITION: &str = r"{identity}

Today is {date}. {first_name}'s schedule around this time:
{surrounding}

Break the task below into subtasks in 5 minute increments. The durations must add up to {minutes} minutes.
Task: {first_name} is {task} from {start} to {end}.";

pub const ACTION_SECTOR: &str = r"{name} lives in {living_sector}, which has {living_arenas}.
{name} is currently in {current_sector}, which has {current_arenas}.
{daily_plan}
Area options: {sectors}.
* Stay in the current area if the activity can be done there. Only go out if the activity needs to take place elsewhere.
* The answer must be one of the area options, verbatim.
{name} is {activity}. For {detail}, which area should {name} go to?";

pub const ACTION_ARENA: &str = r"{name} is going to {sector}, which has the following rooms: {arenas}.
* The answer must be one of the rooms, verbatim.
* Stay in the current room if the activity can be done there.
{name} is {activity}. For {detail}, which room in {sector} should {name} go to?";

pub const ACTION_OBJECT: &str = r"Current activity: {activity}
Objects available: {objects}
Pick the one object from the list that is most relevant to the activity.";

pub const PRONUNCIATIO: &str = r"Convert an action description to an emoji (use two or fewer emojis).
Action description: {description}";

pub const EVENT_TRIPLE: &str = r"Turn the input into (subject, predicate, object). The subject is fixed.
Input: {subject} is {description}.
Give the predicate and object.";

pub const OBJECT_STATE: &str = r"We want to know the state of an object that someone is using.
{name} is at or using the {object}, in order to {activity}.
Describe the {object}'s state in a few words, completing: {object} is";

pub const EVENT_POIGNANCY: &str = r"{identity}

On a scale of 1 to 10, where 1 is purely mundane (brushing teeth, making the bed) and 10 is extremely poignant (a break up, a college acceptance), rate the likely poignancy of the following event for {first_name}.
Event: {description}";

pub const CHAT_POIGNANCY: &str = r"{identity}

On a scale of 1 to 10, where 1 is purely mundane (routine small talk) and 10 is extremely poignant (a conversation about a break up, a fight), rate the likely poignancy of the following conversation for {first_name}.
Conversation: {description}";

pub const DECIDE_TO_TALK: &str = r"Given the context, decide whether the subject will start a conversation with the other person.
Context: {context}
Right now it is {time}. {init_name} is {init_activity} and {target_name} is {target_activity}.
{last_chat}
Question: would {init_name} start a conversation with {target_name}? Answer yes or no.";

pub const DECIDE_TO_REACT: &str = r"Given the context, decide what the subject does next.
Context: {context}
Right now it is {time}. {init_name} is {init_activity} and {target_name} is {target_activity}.
Both want to use {location}.
Option 1: {init_name} waits on {init_detail} until {target_name} is done {target_detail}.
Option 2: {init_name} continues on to {init_detail} now.
Answer 1 or 2.";

pub const RELATIONSHIP_SUMMARY: &str = r"[Statements]
{statements}

Based on the statements above, summarize {init_name} and {target_name}'s relationship in one or two sentences. What do they feel or know about each other?";

pub const UTTERANCE: &str = r"{identity}

Here is what {speaker} remembers about the situation:
{memories}

Relationship: {relationship}
Current context: it is {time}. {speaker} is {speaker_activity} and {listener} is {listener_activity}.
{speaker} and {listener} are chatting at {location}. Here is their conversation so far:
{transcript}

What does {speaker} say to {listener} next, and does that line end the conversation?";

pub const CONVERSATION_SUMMARY: &str = r"Conversation:
{transcript}

Summarize the conversation above in one short phrase that completes: This is a conversation about";

pub const FOCAL_POINTS: &str = r"{statements}

Given only the information above, what are the {count} most salient high-level questions we can answer about the subjects in the statements?";

pub const INSIGHTS: &str = r"Statements about {name}:
{statements}

What {count} high-level insights can you infer from the statements above? For each, cite the numbers of the statements that support it.";

pub const PLANNING_THOUGHT: &str = r"[Conversation]
{transcript}

Write down anything from the conversation that {name} needs to remember for planning, from {name}'s perspective, in one full sentence.";

pub const CONVERSATION_MEMO: &str = r"[Conversation]
{transcript}

From {name}'s perspective, what did {name} think of the conversation? Complete the sentence: {name}";

pub const IDENTITY_PLAN_NOTE: &str = r"[Statements]
{statements}

Given the statements above, is there anything {name} should remember as {name} plans for {date}? Write from {name}'s perspective in one or two sentences.";

pub const IDENTITY_THOUGHT_NOTE: &str = r"[Statements]
{statements}

Given the statements above, how might we summarize {name}'s feelings about their days up to now? Write from {name}'s perspective in one or two sentences.";

pub const IDENTITY_CURRENTLY: &str = r"{name}'s status from yesterday ({yesterday}):
{currently}

{name}'s thoughts at the end of yesterday:
{notes}

It is now {date}. Given the above, write {name}'s status for today that reflects those thoughts, in the third person.";

pub const IDENTITY_DAILY_PLAN: &str = r"{identity}

Today is {date}. Describe {name}'s broad-stroke plan requirements for today in one short paragraph (include the times when relevant).";

pub const SCHEDULE_REVISION: &str = r"{identity}

Here was {name}'s originally planned schedule from {start} to {end}:
{original}

But {name} unexpectedly ended up {inserted} for {inserted_minutes} minutes. Revise {name}'s schedule from {start} to {end} accordingly; it has to end exactly at {end}.
The revised schedule so far:
{truncated}

Give the complete revised list of activities with minutes, including the part written so far.";

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

// ---------------------------------------------------------------------------
// PromptEngine: built-ins plus TOML overrides
// ---------------------------------------------------------------------------

/// Identifies a prompt template by cognition query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Hour the persona wakes up.
    WakeUpHour,
    /// Broad-stroke plan for the first day.
    DailyPlan,
    /// One slot of the hourly schedule.
    HourlySchedule,
    /// Subtasks of a schedule block.
    TaskDecomposition,
    /// Sector for an activity.
    ActionSector,
    /// Arena within a sector.
    ActionArena,
    /// Game object within an arena.
    ActionObject,
    /// Emoji for an action.
    Pronunciatio,
    /// (subject, predicate, object) of an action or object state.
    EventTriple,
    /// State of the object being used.
    ObjectState,
    /// Poignancy of a perceived event.
    EventPoignancy,
    /// Poignancy of a conversation.
    ChatPoignancy,
    /// Whether to start a conversation.
    DecideToTalk,
    /// Whether to wait for someone.
    DecideToReact,
    /// How two personas relate.
    RelationshipSummary,
    /// Next conversation line.
    Utterance,
    /// One-phrase conversation summary.
    ConversationSummary,
    /// Questions to reflect on.
    FocalPoints,
    /// Insights with evidence.
    Insights,
    /// Planning note after a conversation.
    PlanningThought,
    /// Memo after a conversation.
    ConversationMemo,
    /// New-day note on plans.
    IdentityPlanNote,
    /// New-day note on feelings.
    IdentityThoughtNote,
    /// New-day status line.
    IdentityCurrently,
    /// New-day plan requirement.
    IdentityDailyPlan,
    /// Replacement schedule around an interruption.
    ScheduleRevision,
}

impl PromptId {
    /// Returns the TOML filename (without path) for this prompt.
    #[must_use]
    pub fn filename(self) -> String {
        format!("{self}.toml")
    }

    /// All prompt IDs.
    #[must_use]
    pub fn all() -> &'static [PromptId] {
        &[
            Self::WakeUpHour,
            Self::DailyPlan,
            Self::HourlySchedule,
            Self::TaskDecomposition,
            Self::ActionSector,
            Self::ActionArena,
            Self::ActionObject,
            Self::Pronunciatio,
            Self::EventTriple,
            Self::ObjectState,
            Self::EventPoignancy,
            Self::ChatPoignancy,
            Self::DecideToTalk,
            Self::DecideToReact,
            Self::RelationshipSummary,
            Self::Utterance,
            Self::ConversationSummary,
            Self::FocalPoints,
            Self::Insights,
            Self::PlanningThought,
            Self::ConversationMemo,
            Self::IdentityPlanNote,
            Self::IdentityThoughtNote,
            Self::IdentityCurrently,
            Self::IdentityDailyPlan,
            Self::ScheduleRevision,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            Self::WakeUpHour => "wake_up_hour",
            Self::DailyPlan => "daily_plan",
            Self::HourlySchedule => "hourly_schedule",
            Self::TaskDecomposition => "task_decomposition",
            Self::ActionSector => "action_sector",
            Self::ActionArena => "action_arena",
            Self::ActionObject => "action_object",
            Self::Pronunciatio => "pronunciatio",
            Self::EventTriple => "event_triple",
            Self::ObjectState => "object_state",
            Self::EventPoignancy => "event_poignancy",
            Self::ChatPoignancy => "chat_poignancy",
            Self::DecideToTalk => "decide_to_talk",
            Self::DecideToReact => "decide_to_react",
            Self::RelationshipSummary => "relationship_summary",
            Self::Utterance => "utterance",
            Self::ConversationSummary => "conversation_summary",
            Self::FocalPoints => "focal_points",
            Self::Insights => "insights",
            Self::PlanningThought => "planning_thought",
            Self::ConversationMemo => "conversation_memo",
            Self::IdentityPlanNote => "identity_plan_note",
            Self::IdentityThoughtNote => "identity_thought_note",
            Self::IdentityCurrently => "identity_currently",
            Self::IdentityDailyPlan => "identity_daily_plan",
            Self::ScheduleRevision => "schedule_revision",
        }
    }

    /// Built-in user template, token limit and temperature.
    fn builtin(self) -> (&'static str, u32, f32) {
        match self {
            Self::WakeUpHour => (WAKE_UP_HOUR, 10, 0.8),
            Self::DailyPlan => (DAILY_PLAN, 500, 1.0),
            Self::HourlySchedule => (HOURLY_SCHEDULE, 50, 0.5),
            Self::TaskDecomposition => (TASK_DECOMPOSITION, 1000, 0.0),
            Self::ActionSector => (ACTION_SECTOR, 30, 0.0),
            Self::ActionArena => (ACTION_ARENA, 30, 0.0),
            Self::ActionObject => (ACTION_OBJECT, 30, 0.0),
            Self::Pronunciatio => (PRONUNCIATIO, 15, 0.8),
            Self::EventTriple => (EVENT_TRIPLE, 30, 0.0),
            Self::ObjectState => (OBJECT_STATE, 30, 0.0),
            Self::EventPoignancy => (EVENT_POIGNANCY, 5, 0.0),
            Self::ChatPoignancy => (CHAT_POIGNANCY, 5, 0.0),
            Self::DecideToTalk => (DECIDE_TO_TALK, 20, 0.0),
            Self::DecideToReact => (DECIDE_TO_REACT, 20, 0.0),
            Self::RelationshipSummary => (RELATIONSHIP_SUMMARY, 150, 0.5),
            Self::Utterance => (UTTERANCE, 300, 0.7),
            Self::ConversationSummary => (CONVERSATION_SUMMARY, 50, 0.5),
            Self::FocalPoints => (FOCAL_POINTS, 150, 0.5),
            Self::Insights => (INSIGHTS, 500, 0.5),
            Self::PlanningThought => (PLANNING_THOUGHT, 150, 0.5),
            Self::ConversationMemo => (CONVERSATION_MEMO, 150, 0.5),
            Self::IdentityPlanNote => (IDENTITY_PLAN_NOTE, 300, 0.5),
            Self::IdentityThoughtNote => (IDENTITY_THOUGHT_NOTE, 300, 0.5),
            Self::IdentityCurrently => (IDENTITY_CURRENTLY, 300, 0.5),
            Self::IdentityDailyPlan => (IDENTITY_DAILY_PLAN, 300, 0.5),
            Self::ScheduleRevision => (SCHEDULE_REVISION, 1000, 0.0),
        }
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PromptId {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|id| id.name() == s)
            .ok_or_else(|| LlmError::ConfigError(format!("unknown prompt id: '{s}'")))
    }
}

/// Metadata and templates parsed from a TOML prompt file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptFile {
    prompt: TomlPromptData,
}

/// Inner `[prompt]` section of a TOML file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptData {
    version: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(default)]
    system: Option<String>,
    user: String,
}

/// A loaded, ready-to-render prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Prompt version string ("builtin" for compiled-in templates).
    pub version: String,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// System prompt template.
    pub system: String,
    /// User prompt template (contains `{key}` placeholders).
    pub user: String,
}

/// Engine that holds one template per [`PromptId`] and renders requests.
///
/// # Example
///
/// ```
/// use reverie_llm::prompt::{PromptEngine, PromptId};
///
/// let engine = PromptEngine::builtin();
/// let request = engine.request(PromptId::Pronunciatio, &[("description", "brewing coffee")], 5_000);
/// assert!(request.user.contains("brewing coffee"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptEngine {
    templates: HashMap<PromptId, PromptTemplate>,
}

impl PromptEngine {
    /// An engine holding every built-in template.
    #[must_use]
    pub fn builtin() -> Self {
        let templates = PromptId::all()
            .iter()
            .map(|id| {
                let (user, max_tokens, temperature) = id.builtin();
                (
                    *id,
                    PromptTemplate {
                        version: "builtin".into(),
                        max_tokens,
                        temperature,
                        system: PERSONA_SYSTEM.into(),
                        user: user.into(),
                    },
                )
            })
            .collect();
        Self { templates }
    }

    /// Built-ins overridden by any `<prompt_id>.toml` found in `dir`.
    ///
    /// Files that match no [`PromptId`] are ignored.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::ConfigError` if `dir` is not a directory or a
    /// matching TOML file cannot be read or parsed.
    pub fn with_overrides(dir: impl AsRef<Path>) -> Result<Self, LlmError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LlmError::ConfigError(format!(
                "prompt directory not found: {}",
                dir.display()
            )));
        }

        let mut engine = Self::builtin();
        let mut overridden = 0usize;
        for id in PromptId::all() {
            let path = dir.join(id.filename());
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .map_err(|e| LlmError::ConfigError(format!("failed to read {}: {e}", path.display())))?;
            let parsed: TomlPromptFile = toml::from_str(&content)
                .map_err(|e| LlmError::ConfigError(format!("failed to parse {}: {e}", path.display())))?;

            let d = parsed.prompt;
            engine.templates.insert(
                *id,
                PromptTemplate {
                    version: d.version,
                    max_tokens: d.max_tokens,
                    temperature: d.temperature,
                    system: d.system.unwrap_or_else(|| PERSONA_SYSTEM.into()),
                    user: d.user,
                },
            );
            overridden += 1;
        }

        info!(dir = %dir.display(), overridden, "Loaded prompt overrides");
        Ok(engine)
    }

    /// Get a template by ID.
    #[must_use]
    pub fn get(&self, id: PromptId) -> Option<&PromptTemplate> {
        self.templates.get(&id)
    }

    /// Render both system and user prompts for a given ID.
    #[must_use]
    pub fn render(&self, id: PromptId, vars: &[(&str, &str)]) -> (String, String) {
        match self.get(id) {
            Some(tpl) => (render_template(&tpl.system, vars), render_template(&tpl.user, vars)),
            None => (PERSONA_SYSTEM.to_string(), render_template(id.builtin().0, vars)),
        }
    }

    /// Render a ready-to-send request.
    #[must_use]
    pub fn request(&self, id: PromptId, vars: &[(&str, &str)], timeout_ms: u64) -> LlmRequest {
        let (system, user) = self.render(id, vars);
        let (max_tokens, temperature) = self
            .get(id)
            .map_or_else(|| (id.builtin().1, id.builtin().2), |t| (t.max_tokens, t.temperature));
        LlmRequest::new(id.to_string(), system, user)
            .with_max_tokens(max_tokens)
            .with_temperature(temperature)
            .with_timeout(timeout_ms)
    }

    /// Number of loaded templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no templates are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_rendering_works() {
        let rendered = render_template(
            "Hello {name}, you work at {place}.",
            &[("name", "Isabella"), ("place", "Hobbs Cafe")],
        );
        assert_eq!(rendered, "Hello Isabella, you work at Hobbs Cafe.");
    }

    #[test]
    fn template_handles_missing_vars() {
        let rendered = render_template("Hello {name}, {unknown}.", &[("name", "Isabella")]);
        assert_eq!(rendered, "Hello Isabella, {unknown}.");
    }

    #[test]
    fn prompt_id_from_str_round_trip() {
        for id in PromptId::all() {
            let parsed: PromptId = id.to_string().parse().expect("should parse");
            assert_eq!(*id, parsed);
        }
        assert!("nonexistent".parse::<PromptId>().is_err());
    }

    #[test]
    fn builtin_engine_covers_every_query() {
        let engine = PromptEngine::builtin();
        assert_eq!(engine.len(), PromptId::all().len());
        for id in PromptId::all() {
            assert!(engine.get(*id).is_some(), "{id} missing");
        }
    }

    #[test]
    fn request_carries_template_settings() {
        let engine = PromptEngine::builtin();
        let request = engine.request(PromptId::TaskDecomposition, &[("task", "working")], 1234);
        assert_eq!(request.purpose, "task_decomposition");
        assert_eq!(request.max_tokens, 1000);
        assert_eq!(request.timeout_ms, 1234);
        assert!(request.user.contains("is working from"));
    }

    #[test]
    fn overrides_replace_only_matching_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("pronunciatio.toml"),
            r#"
            [prompt]
            version = "2.0"
            max_tokens = 4
            temperature = 0.1
            user = "Emoji for: {description}"
            "#,
        )
        .expect("write");
        std::fs::write(dir.path().join("unrelated.toml"), "not = [valid").expect("write");

        let engine = PromptEngine::with_overrides(dir.path()).expect("load");
        let tpl = engine.get(PromptId::Pronunciatio).expect("tpl");
        assert_eq!(tpl.version, "2.0");
        assert_eq!(tpl.system, PERSONA_SYSTEM);
        assert_eq!(engine.get(PromptId::Utterance).expect("tpl").version, "builtin");
    }

    #[test]
    fn broken_override_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("utterance.toml"), "[prompt]\nversion = 1").expect("write");
        assert!(matches!(
            PromptEngine::with_overrides(dir.path()),
            Err(LlmError::ConfigError(_))
        ));
        assert!(PromptEngine::with_overrides(dir.path().join("missing")).is_err());
    }
}
