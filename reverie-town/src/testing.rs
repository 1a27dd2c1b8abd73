//! Fixtures shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reverie_core::config::{PlanningConfig, RetrievalConfig};
use reverie_core::maze::{Layer, MazeDefinition};
use reverie_core::memory::{Identity, MemoryBank, Scratch, SpatialMemory, Utterance};
use reverie_core::retrieval::RetrievalEngine;
use reverie_core::schedule::{ScheduleBlock, SpliceRegion};
use reverie_core::types::{Embedding, Triple};
use reverie_core::Maze;

use crate::cognition::{Cognition, IdentityRevision, NextLine, RuleBasedCognition};
use crate::persona::{Persona, TickContext};

pub(crate) fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 2, 13)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .expect("valid time")
}

/// Hobbs Cafe over columns 0-9; columns 10-11 carry no sector or arena.
pub(crate) fn cafe() -> Maze {
    let mut def = MazeDefinition::blank("the Ville", 12, 8, 32);
    def.paint(Layer::Sector, 0..10, 0..8, "Hobbs Cafe");
    def.paint(Layer::Arena, 0..10, 0..8, "cafe");
    def.paint(Layer::GameObject, 5..7, 1..2, "behind the cafe counter");
    def.paint(Layer::GameObject, 1..3, 5..6, "cafe customer seating");
    Maze::new(&def).expect("maze")
}

/// Isabella at (2, 2) on 13 February 2023, 07:00.
pub(crate) fn isabella() -> MemoryBank {
    let mut scratch = Scratch::new(Identity {
        name: "Isabella Rodriguez".into(),
        first_name: "Isabella".into(),
        last_name: "Rodriguez".into(),
        age: 34,
        currently: "planning a Valentine's Day party".into(),
        living_area: "the Ville:Hobbs Cafe:cafe".into(),
        daily_plan_req: "open the cafe, greet regulars".into(),
        ..Identity::default()
    });
    scratch.curr_time = Some(at(7, 0));
    scratch.curr_tile = Some((2, 2));
    MemoryBank::new(scratch)
}

/// Everything a [`TickContext`] borrows.
pub(crate) struct Fixture {
    pub maze: Maze,
    pub roster: BTreeMap<String, Persona>,
    pub retrieval: RetrievalEngine,
    pub planning: PlanningConfig,
    pub rng: StdRng,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self {
            maze: cafe(),
            roster: BTreeMap::new(),
            retrieval: RetrievalEngine::new(RetrievalConfig::default()),
            planning: PlanningConfig::default(),
            rng: StdRng::seed_from_u64(3),
        }
    }

    pub(crate) fn ctx<'a, C>(&'a mut self, cognition: &'a C) -> TickContext<'a, C> {
        TickContext {
            maze: &self.maze,
            roster: &mut self.roster,
            cognition,
            retrieval: &self.retrieval,
            planning: &self.planning,
            rng: &mut self.rng,
            seconds_per_step: 10,
        }
    }
}

/// Rule-based cognition that records how often it was asked for hourly
/// activities and which blocks it decomposed.
#[derive(Default)]
pub(crate) struct Recording {
    pub inner: RuleBasedCognition,
    pub hourly_calls: Cell<usize>,
    pub decomposed: RefCell<Vec<(String, u32)>>,
}

impl Recording {
    pub(crate) fn new(inner: RuleBasedCognition) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }
}

impl Cognition for Recording {
    async fn wake_up_hour(&self, scratch: &Scratch) -> u32 {
        self.inner.wake_up_hour(scratch).await
    }

    async fn daily_plan(&self, scratch: &Scratch, wake_up_hour: u32) -> Vec<String> {
        self.inner.daily_plan(scratch, wake_up_hour).await
    }

    async fn hourly_activity(&self, scratch: &Scratch, hour: u32, so_far: &[String]) -> String {
        self.hourly_calls.set(self.hourly_calls.get() + 1);
        self.inner.hourly_activity(scratch, hour, so_far).await
    }

    async fn task_decomposition(
        &self,
        scratch: &Scratch,
        task: &str,
        start_minute: u32,
        minutes: u32,
    ) -> Vec<(String, u32)> {
        self.decomposed.borrow_mut().push((task.to_string(), start_minute));
        self.inner.task_decomposition(scratch, task, start_minute, minutes).await
    }

    async fn action_sector(&self, scratch: &Scratch, spatial: &SpatialMemory, world: &str, activity: &str) -> String {
        self.inner.action_sector(scratch, spatial, world, activity).await
    }

    async fn action_arena(
        &self,
        scratch: &Scratch,
        spatial: &SpatialMemory,
        sector_address: &str,
        activity: &str,
    ) -> String {
        self.inner.action_arena(scratch, spatial, sector_address, activity).await
    }

    async fn action_object(&self, activity: &str, objects: &[&str]) -> String {
        self.inner.action_object(activity, objects).await
    }

    async fn pronunciatio(&self, description: &str) -> String {
        self.inner.pronunciatio(description).await
    }

    async fn event_triple(&self, subject: &str, description: &str) -> Triple {
        self.inner.event_triple(subject, description).await
    }

    async fn object_state(&self, scratch: &Scratch, object: &str, activity: &str) -> String {
        self.inner.object_state(scratch, object, activity).await
    }

    async fn event_poignancy(&self, scratch: &Scratch, description: &str) -> u8 {
        self.inner.event_poignancy(scratch, description).await
    }

    async fn chat_poignancy(&self, scratch: &Scratch, description: &str) -> u8 {
        self.inner.chat_poignancy(scratch, description).await
    }

    async fn decide_to_talk(&self, init: &Scratch, target: &Scratch, context: &str) -> bool {
        self.inner.decide_to_talk(init, target, context).await
    }

    async fn decide_to_react(&self, init: &Scratch, target: &Scratch, context: &str) -> bool {
        self.inner.decide_to_react(init, target, context).await
    }

    async fn relationship_summary(&self, init: &Scratch, target: &Scratch, statements: &str) -> String {
        self.inner.relationship_summary(init, target, statements).await
    }

    async fn utterance(
        &self,
        speaker: &Scratch,
        listener: &Scratch,
        relationship: &str,
        memories: &str,
        transcript: &[Utterance],
    ) -> NextLine {
        self.inner
            .utterance(speaker, listener, relationship, memories, transcript)
            .await
    }

    async fn conversation_summary(&self, scratch: &Scratch, transcript: &[Utterance]) -> String {
        self.inner.conversation_summary(scratch, transcript).await
    }

    async fn focal_points(&self, scratch: &Scratch, statements: &str, count: usize) -> Vec<String> {
        self.inner.focal_points(scratch, statements, count).await
    }

    async fn insights(&self, scratch: &Scratch, statements: &str, count: usize) -> Vec<(String, Vec<usize>)> {
        self.inner.insights(scratch, statements, count).await
    }

    async fn planning_thought(&self, scratch: &Scratch, transcript: &[Utterance]) -> String {
        self.inner.planning_thought(scratch, transcript).await
    }

    async fn conversation_memo(&self, scratch: &Scratch, transcript: &[Utterance]) -> String {
        self.inner.conversation_memo(scratch, transcript).await
    }

    async fn revise_identity(&self, scratch: &Scratch, statements: &str) -> IdentityRevision {
        self.inner.revise_identity(scratch, statements).await
    }

    async fn revise_schedule(
        &self,
        scratch: &Scratch,
        region: &SpliceRegion,
        inserted: &str,
        inserted_minutes: u32,
    ) -> Option<Vec<ScheduleBlock>> {
        self.inner
            .revise_schedule(scratch, region, inserted, inserted_minutes)
            .await
    }

    async fn embedding(&self, text: &str) -> Embedding {
        self.inner.embedding(text).await
    }
}
