//! Rule-based cognition: fixed answers from the persona's own data.
//!
//! Always available and deterministic. Used when no model is configured,
//! by the benchmarks and throughout the tests.

use std::collections::BTreeMap;

use reverie_core::embedding::{EmbeddingProvider, HashingEmbeddingProvider};
use reverie_core::memory::{Scratch, SpatialMemory, Utterance};
use reverie_core::schedule::{ScheduleBlock, SpliceRegion};
use reverie_core::types::{Embedding, Triple};

use super::{Cognition, IdentityRevision, NextLine};

/// Deterministic cognition driven by a routine table.
pub struct RuleBasedCognition {
    /// Wake-up hour for everyone.
    pub wake_up_hour: u32,
    /// Activity per hour of day; missing hours are `relaxing`.
    pub routine: BTreeMap<u32, String>,
    /// Poignancy of every perceived event.
    pub event_poignancy: u8,
    /// Poignancy of every conversation.
    pub chat_poignancy: u8,
    /// Whether personas start conversations.
    pub sociable: bool,
    /// Whether personas wait for one another.
    pub patient: bool,
    /// Lines per conversation before someone says goodbye.
    pub conversation_length: usize,
    pub embedder: HashingEmbeddingProvider,
}

impl Default for RuleBasedCognition {
    fn default() -> Self {
        let routine = [
            (7, "having breakfast"),
            (8, "working"),
            (9, "working"),
            (10, "working"),
            (11, "working"),
            (12, "having lunch"),
            (13, "working"),
            (14, "working"),
            (15, "working"),
            (16, "working"),
            (17, "taking a walk"),
            (18, "having dinner"),
            (23, "sleeping"),
        ]
        .into_iter()
        .map(|(h, a)| (h, a.to_string()))
        .collect();
        Self {
            wake_up_hour: 7,
            routine,
            event_poignancy: 3,
            chat_poignancy: 4,
            sociable: false,
            patient: false,
            conversation_length: 4,
            embedder: HashingEmbeddingProvider::new(64),
        }
    }
}

impl RuleBasedCognition {
    /// Default routine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn emoji(description: &str) -> &'static str {
        let d = description.to_lowercase();
        if d.contains("sleep") || d.contains("bed") {
            "😴"
        } else if d.contains("chat") || d.contains("convers") {
            "💬"
        } else if ["breakfast", "lunch", "dinner", "eat"].iter().any(|w| d.contains(w)) {
            "🍽️"
        } else if d.contains("work") {
            "💼"
        } else if d.contains("walk") {
            "🚶"
        } else {
            "🙂"
        }
    }
}

/// First entry of `options` sharing a word with `activity`, else the first.
fn closest<'a>(activity: &str, options: &[&'a str]) -> Option<&'a str> {
    let activity = activity.to_lowercase();
    let words: Vec<&str> = activity.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 2).collect();
    options
        .iter()
        .copied()
        .find(|o| {
            let o = o.to_lowercase();
            words.iter().any(|w| o.contains(w))
        })
        .or_else(|| options.first().copied())
}

impl Cognition for RuleBasedCognition {
    async fn wake_up_hour(&self, _scratch: &Scratch) -> u32 {
        self.wake_up_hour
    }

    async fn daily_plan(&self, scratch: &Scratch, wake_up_hour: u32) -> Vec<String> {
        let mut plan = vec![format!("wake up and complete the morning routine at {wake_up_hour}:00 am")];
        plan.extend(
            scratch
                .identity
                .daily_plan_req
                .split([',', ';'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        plan
    }

    async fn hourly_activity(&self, _scratch: &Scratch, hour: u32, _so_far: &[String]) -> String {
        self.routine
            .get(&hour)
            .cloned()
            .unwrap_or_else(|| "relaxing".to_string())
    }

    async fn task_decomposition(
        &self,
        _scratch: &Scratch,
        task: &str,
        _start_minute: u32,
        minutes: u32,
    ) -> Vec<(String, u32)> {
        if minutes < 30 {
            return Vec::new();
        }
        vec![
            (format!("getting ready for {task}"), 15),
            ("focusing".to_string(), minutes - 25),
            ("wrapping up".to_string(), 10),
        ]
    }

    async fn action_sector(&self, scratch: &Scratch, spatial: &SpatialMemory, world: &str, activity: &str) -> String {
        let sectors = spatial.sectors(world);
        let living = scratch.identity.living_area.split(':').nth(1).unwrap_or_default();
        let lowered = activity.to_lowercase();
        if let Some(named) = sectors.iter().find(|s| lowered.contains(&s.to_lowercase())) {
            return (*named).to_string();
        }
        if sectors.contains(&living) || sectors.is_empty() {
            return living.to_string();
        }
        closest(activity, &sectors).unwrap_or_default().to_string()
    }

    async fn action_arena(
        &self,
        scratch: &Scratch,
        spatial: &SpatialMemory,
        sector_address: &str,
        activity: &str,
    ) -> String {
        let mut parts = sector_address.splitn(2, ':');
        let world = parts.next().unwrap_or_default();
        let sector = parts.next().unwrap_or_default();
        let arenas = spatial.arenas(world, sector);
        let mut living = scratch.identity.living_area.split(':').skip(1);
        if living.next() == Some(sector) {
            if let Some(arena) = living.next().filter(|a| arenas.contains(a)) {
                return arena.to_string();
            }
        }
        closest(activity, &arenas).unwrap_or_default().to_string()
    }

    async fn action_object(&self, activity: &str, objects: &[&str]) -> String {
        closest(activity, objects).unwrap_or_default().to_string()
    }

    async fn pronunciatio(&self, description: &str) -> String {
        Self::emoji(description).to_string()
    }

    async fn event_triple(&self, subject: &str, description: &str) -> Triple {
        let object = description.split('(').next().unwrap_or(description).trim();
        Triple::new(subject, "is", object)
    }

    async fn object_state(&self, _scratch: &Scratch, _object: &str, _activity: &str) -> String {
        "being used".to_string()
    }

    async fn event_poignancy(&self, _scratch: &Scratch, _description: &str) -> u8 {
        self.event_poignancy
    }

    async fn chat_poignancy(&self, _scratch: &Scratch, _description: &str) -> u8 {
        self.chat_poignancy
    }

    async fn decide_to_talk(&self, _init: &Scratch, _target: &Scratch, _context: &str) -> bool {
        self.sociable
    }

    async fn decide_to_react(&self, _init: &Scratch, _target: &Scratch, _context: &str) -> bool {
        self.patient
    }

    async fn relationship_summary(&self, init: &Scratch, target: &Scratch, _statements: &str) -> String {
        format!("{} and {} are neighbours", init.name(), target.name())
    }

    async fn utterance(
        &self,
        speaker: &Scratch,
        listener: &Scratch,
        _relationship: &str,
        _memories: &str,
        transcript: &[Utterance],
    ) -> NextLine {
        if transcript.len() + 1 >= self.conversation_length {
            return NextLine {
                text: "I should get going. See you later!".to_string(),
                ends_conversation: true,
            };
        }
        let text = if transcript.is_empty() {
            format!("Hi {}! How is your day going?", listener.identity.first_name)
        } else {
            format!("Not bad. I'm busy {}.", speaker.action.description)
        };
        NextLine {
            text,
            ends_conversation: false,
        }
    }

    async fn conversation_summary(&self, scratch: &Scratch, _transcript: &[Utterance]) -> String {
        let partner = scratch.chat.with.as_deref().unwrap_or("a neighbour");
        format!("conversing about the day with {partner}")
    }

    async fn focal_points(&self, scratch: &Scratch, _statements: &str, count: usize) -> Vec<String> {
        let mut points = vec![
            format!("What has {} been doing lately?", scratch.identity.first_name),
            format!("Who has {} been spending time with?", scratch.identity.first_name),
            format!("How does {} feel about the day?", scratch.identity.first_name),
        ];
        points.truncate(count);
        points
    }

    async fn insights(&self, scratch: &Scratch, statements: &str, count: usize) -> Vec<(String, Vec<usize>)> {
        let lines = statements.lines().count();
        if lines == 0 || count == 0 {
            return Vec::new();
        }
        vec![(
            format!("{} keeps a steady routine", scratch.name()),
            (0..lines.min(3)).collect(),
        )]
    }

    async fn planning_thought(&self, scratch: &Scratch, _transcript: &[Utterance]) -> String {
        let partner = scratch.chat.with.as_deref().unwrap_or("my neighbour");
        format!("I should catch up with {partner} again soon")
    }

    async fn conversation_memo(&self, scratch: &Scratch, _transcript: &[Utterance]) -> String {
        let partner = scratch.chat.with.as_deref().unwrap_or("a neighbour");
        format!("enjoyed talking with {partner}")
    }

    async fn revise_identity(&self, scratch: &Scratch, _statements: &str) -> IdentityRevision {
        IdentityRevision {
            notes: String::new(),
            currently: scratch.identity.currently.clone(),
            daily_plan_req: scratch.identity.daily_plan_req.clone(),
        }
    }

    async fn revise_schedule(
        &self,
        _scratch: &Scratch,
        _region: &SpliceRegion,
        _inserted: &str,
        _inserted_minutes: u32,
    ) -> Option<Vec<ScheduleBlock>> {
        None
    }

    async fn embedding(&self, text: &str) -> Embedding {
        self.embedder
            .embed(text)
            .unwrap_or_else(|_| Embedding::zeros(self.embedder.dimensions()))
    }
}
