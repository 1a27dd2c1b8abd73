//! Scratch: a persona's short-term working state.
//!
//! Identity constants, per-persona tuning, reflection counters, the daily
//! schedule, the current action and chat state all live here. Everything is
//! plain data; the planner in `reverie-town` drives the transitions.

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock;
use crate::memory::node::Utterance;
use crate::schedule::DailySchedule;
use crate::types::{Coord, Triple};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Who the persona is. Only `currently` and `daily_plan_req` change, and
/// only through daily identity revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    /// Full name, also the persona key.
    pub name: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Age in years.
    pub age: u32,
    /// Innate traits, e.g. `friendly, outgoing, hospitable`.
    pub innate: String,
    /// Learned traits and background.
    pub learned: String,
    /// Current status and preoccupations.
    pub currently: String,
    /// Daily rhythm.
    pub lifestyle: String,
    /// Home address (`world:sector:arena`).
    pub living_area: String,
    /// Broad requirements for tomorrow's plan.
    pub daily_plan_req: String,
}

// ---------------------------------------------------------------------------
// Tuning
// ---------------------------------------------------------------------------

/// Per-persona hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaParams {
    /// Perception radius in tiles.
    pub vision_radius: usize,
    /// Events attended per tick.
    pub attention_bandwidth: usize,
    /// Recent events checked for duplicate suppression.
    pub retention: usize,
    /// Concept forgetting horizon.
    pub concept_forget: u32,
    /// Minutes reserved for daily reflection.
    pub daily_reflection_time: u32,
    /// Nodes considered by daily reflection.
    pub daily_reflection_size: usize,
    /// Overlap threshold for reflection.
    pub overlap_reflect_threshold: u32,
    /// Event keyword strength that invites reflection.
    pub kw_strength_event_reflect_threshold: u32,
    /// Thought keyword strength that invites reflection.
    pub kw_strength_thought_reflect_threshold: u32,
    /// Weight of recency in ranked retrieval.
    pub recency_weight: f64,
    /// Weight of relevance in ranked retrieval.
    pub relevance_weight: f64,
    /// Weight of importance in ranked retrieval.
    pub importance_weight: f64,
    /// Per-rank recency decay.
    pub recency_decay: f64,
    /// Importance budget that triggers reflection.
    pub importance_trigger_max: i32,
    /// Insights produced per reflection.
    pub thought_count: usize,
}

impl Default for PersonaParams {
    fn default() -> Self {
        Self {
            vision_radius: 4,
            attention_bandwidth: 3,
            retention: 5,
            concept_forget: 100,
            daily_reflection_time: 180,
            daily_reflection_size: 5,
            overlap_reflect_threshold: 2,
            kw_strength_event_reflect_threshold: 4,
            kw_strength_thought_reflect_threshold: 4,
            recency_weight: 1.0,
            relevance_weight: 1.0,
            importance_weight: 1.0,
            recency_decay: 0.99,
            importance_trigger_max: 150,
            thought_count: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Current action
// ---------------------------------------------------------------------------

/// The action a persona is carrying out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Target address, `None` while idle.
    pub address: Option<String>,
    /// When the action was installed.
    #[serde(with = "clock::serde_seconds_option", default)]
    pub start_time: Option<NaiveDateTime>,
    /// Duration in minutes.
    pub duration: Option<u32>,
    /// e.g. `having breakfast (eating toast)`.
    pub description: String,
    /// Display glyph.
    pub pronunciatio: String,
    /// What the persona is doing, `None` while idle.
    pub event: Option<Triple>,
    /// State of the target object.
    pub obj_description: Option<String>,
    /// Glyph for the object's state.
    pub obj_pronunciatio: Option<String>,
    /// What the object is doing.
    pub obj_event: Option<Triple>,
}

impl Action {
    /// Minutes-resolution end of the action: start rounded up to the next
    /// whole minute plus the duration.
    #[must_use]
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        let start = clock::ceil_to_minute(self.start_time?);
        Some(start + Duration::minutes(i64::from(self.duration?)))
    }
}

// ---------------------------------------------------------------------------
// Chat state
// ---------------------------------------------------------------------------

/// Conversation bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatState {
    /// Current partner.
    pub with: Option<String>,
    /// Transcript of the current conversation.
    pub transcript: Vec<Utterance>,
    /// Ticks until a persona may be engaged again, per partner.
    pub cooldown: BTreeMap<String, u32>,
    /// When the current conversation ends.
    #[serde(with = "clock::serde_seconds_option", default)]
    pub end_time: Option<NaiveDateTime>,
}

// ---------------------------------------------------------------------------
// Scratch
// ---------------------------------------------------------------------------

/// A persona's working state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scratch {
    /// Identity constants.
    pub identity: Identity,
    /// Tuning.
    #[serde(default)]
    pub params: PersonaParams,
    /// Remaining importance budget before reflecting.
    pub importance_trigger_curr: i32,
    /// Nodes accumulated since the last reflection.
    pub importance_ele_n: usize,
    /// Simulated time of the last tick this persona saw.
    #[serde(with = "clock::serde_seconds_option", default)]
    pub curr_time: Option<NaiveDateTime>,
    /// Tile the persona occupies.
    pub curr_tile: Option<Coord>,
    /// Broad daily requirements (first-day plan).
    #[serde(default)]
    pub daily_req: Vec<String>,
    /// Full-day schedule, decomposed as the day goes on.
    #[serde(default)]
    pub daily_schedule: DailySchedule,
    /// Hourly schedule as first generated.
    #[serde(default)]
    pub hourly_schedule: DailySchedule,
    /// The action in progress.
    #[serde(default)]
    pub action: Action,
    /// Conversation state.
    #[serde(default)]
    pub chat: ChatState,
    /// Remaining steps towards the action's target tile.
    #[serde(default)]
    pub planned_path: Vec<Coord>,
    /// Whether `planned_path` was computed for the current action.
    #[serde(default)]
    pub path_set: bool,
}

impl Scratch {
    /// Scratch for a persona with default tuning.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self::with_params(identity, PersonaParams::default())
    }

    /// Scratch with explicit tuning.
    #[must_use]
    pub fn with_params(identity: Identity, params: PersonaParams) -> Self {
        Self {
            identity,
            importance_trigger_curr: params.importance_trigger_max,
            params,
            ..Self::default()
        }
    }

    /// Persona name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Identity stable set, the persona's self description used in prompts.
    #[must_use]
    pub fn identity_summary(&self) -> String {
        let id = &self.identity;
        let mut out = format!(
            "Name: {}\nAge: {}\nInnate traits: {}\nLearned traits: {}\nCurrently: {}\nLifestyle: {}\nDaily plan requirement: {}\n",
            id.name, id.age, id.innate, id.learned, id.currently, id.lifestyle, id.daily_plan_req
        );
        if let Some(now) = self.curr_time {
            out.push_str(&format!("Current Date: {}\n", clock::date_label(now)));
        }
        out
    }

    /// Minute of the current day, shifted by `advance` minutes.
    #[must_use]
    pub fn minute_of_day(&self, advance: u32) -> u32 {
        self.curr_time.map_or(0, clock::minutes_into_day) + advance
    }

    /// Index of the full-day block running `advance` minutes from now.
    #[must_use]
    pub fn schedule_index(&self, advance: u32) -> usize {
        self.daily_schedule.index_at(self.minute_of_day(advance))
    }

    /// Index of the hourly block running `advance` minutes from now.
    #[must_use]
    pub fn hourly_index(&self, advance: u32) -> usize {
        self.hourly_schedule.index_at(self.minute_of_day(advance))
    }

    /// Whether the current action is over and a new one must be chosen.
    #[must_use]
    pub fn act_check_finished(&self) -> bool {
        if self.action.address.is_none() {
            return true;
        }
        let end = if self.chat.with.is_some() {
            self.chat.end_time
        } else {
            self.action.end_time()
        };
        matches!((end, self.curr_time), (Some(end), Some(now)) if end == now)
    }

    /// Install a new action starting now; the path must be recomputed.
    pub fn set_action(&mut self, action: Action) {
        self.action = Action {
            start_time: self.curr_time,
            ..action
        };
        self.path_set = false;
        self.planned_path.clear();
    }

    /// Start a conversation with `partner`.
    pub fn start_chat(&mut self, partner: &str, transcript: Vec<Utterance>, end_time: NaiveDateTime) {
        self.chat.with = Some(partner.to_string());
        self.chat.transcript = transcript;
        self.chat.end_time = Some(end_time);
    }

    /// Forget the current conversation (the cooldown buffer is kept).
    pub fn clear_chat(&mut self) {
        self.chat.with = None;
        self.chat.transcript.clear();
        self.chat.end_time = None;
    }

    /// Count every cooldown down by one tick, except `except`'s.
    pub fn decrement_cooldowns(&mut self, except: Option<&str>) {
        for (name, ticks) in &mut self.chat.cooldown {
            if Some(name.as_str()) != except {
                *ticks = ticks.saturating_sub(1);
            }
        }
    }

    /// Remaining cooldown before engaging `name` again.
    #[must_use]
    pub fn cooldown_for(&self, name: &str) -> u32 {
        self.chat.cooldown.get(name).copied().unwrap_or(0)
    }

    /// Whether the current action is waiting on someone.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.action
            .address
            .as_deref()
            .is_some_and(|a| a.contains("<waiting>"))
    }

    /// Whether the current action is sleep.
    #[must_use]
    pub fn is_sleeping(&self) -> bool {
        self.action.description.contains("sleeping")
    }

    /// Current hour of day.
    #[must_use]
    pub fn hour(&self) -> u32 {
        self.curr_time.map_or(0, |t| t.hour())
    }

    /// Reset reflection counters after reflecting.
    pub fn reset_reflection(&mut self) {
        self.importance_trigger_curr = self.params.importance_trigger_max;
        self.importance_ele_n = 0;
    }

    /// One-paragraph summary of the current action.
    #[must_use]
    pub fn action_summary(&self) -> String {
        let start = self
            .action
            .start_time
            .map(|t| t.format(clock::TIME_FORMAT).to_string())
            .unwrap_or_default();
        let event = self
            .action
            .event
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        format!(
            "[{start}]\nActivity: {} is {}\nAddress: {}\nDuration in minutes (e.g., x min): {} min\n{event}\n",
            self.identity.first_name,
            self.action.description,
            self.action.address.as_deref().unwrap_or_default(),
            self.action.duration.unwrap_or(0),
        )
    }

    /// Full-day schedule summary.
    #[must_use]
    pub fn daily_schedule_summary(&self) -> String {
        self.daily_schedule.summary()
    }

    /// Hourly schedule summary.
    #[must_use]
    pub fn hourly_schedule_summary(&self) -> String {
        self.hourly_schedule.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 2, 13)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .expect("valid time")
    }

    fn scratch() -> Scratch {
        Scratch::new(Identity {
            name: "Isabella Rodriguez".into(),
            first_name: "Isabella".into(),
            age: 34,
            ..Identity::default()
        })
    }

    #[test]
    fn idle_persona_is_finished() {
        assert!(scratch().act_check_finished());
    }

    #[test]
    fn action_finishes_at_rounded_start_plus_duration() {
        let mut s = scratch();
        s.curr_time = Some(at(8, 0, 10));
        s.set_action(Action {
            address: Some("the Ville:Hobbs Cafe:cafe:counter".into()),
            duration: Some(15),
            description: "opening the cafe".into(),
            ..Action::default()
        });
        s.curr_time = Some(at(8, 15, 0));
        assert!(!s.act_check_finished());
        s.curr_time = Some(at(8, 16, 0));
        assert!(s.act_check_finished());
    }

    #[test]
    fn chat_finishes_at_chat_end() {
        let mut s = scratch();
        s.curr_time = Some(at(9, 0, 0));
        s.set_action(Action {
            address: Some("<persona> Klaus Mueller".into()),
            duration: Some(3),
            ..Action::default()
        });
        s.start_chat("Klaus Mueller", vec![], at(9, 2, 0));
        s.curr_time = Some(at(9, 2, 0));
        assert!(s.act_check_finished());
    }

    #[test]
    fn cooldowns_skip_current_partner_and_saturate() {
        let mut s = scratch();
        s.chat.cooldown.insert("Klaus Mueller".into(), 2);
        s.chat.cooldown.insert("Maria Lopez".into(), 0);
        s.decrement_cooldowns(Some("Klaus Mueller"));
        assert_eq!(s.cooldown_for("Klaus Mueller"), 2);
        assert_eq!(s.cooldown_for("Maria Lopez"), 0);
        s.decrement_cooldowns(None);
        assert_eq!(s.cooldown_for("Klaus Mueller"), 1);
    }

    #[test]
    fn new_scratch_starts_with_full_importance_budget() {
        let mut s = scratch();
        assert_eq!(s.importance_trigger_curr, 150);
        s.importance_trigger_curr = -3;
        s.importance_ele_n = 12;
        s.reset_reflection();
        assert_eq!((s.importance_trigger_curr, s.importance_ele_n), (150, 0));
    }

    #[test]
    fn identity_summary_includes_date() {
        let mut s = scratch();
        s.curr_time = Some(at(7, 0, 0));
        let iss = s.identity_summary();
        assert!(iss.starts_with("Name: Isabella Rodriguez\nAge: 34\n"));
        assert!(iss.ends_with("Current Date: Monday February 13\n"));
    }
}
