//! A persona: one memory bank plus the per-tick cognition loop.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use reverie_core::clock;
use reverie_core::config::PlanningConfig;
use reverie_core::memory::{Identity, MemoryBank, PersonaParams, Scratch};
use reverie_core::retrieval::RetrievalEngine;
use reverie_core::types::Coord;
use reverie_core::{Maze, Result};
use tracing::debug;

use crate::cognition::Cognition;
use crate::execute::{self, Execution};
use crate::plan::{self, DayStart};
use crate::{perceive, reflect};

/// Everything a persona may touch while it takes its turn.
///
/// The persona itself is not in `roster`; the roster holds everyone else.
pub struct TickContext<'a, C> {
    /// Shared world.
    pub maze: &'a Maze,
    /// The other personas.
    pub roster: &'a mut BTreeMap<String, Persona>,
    /// Language-level judgements.
    pub cognition: &'a C,
    /// Ranked retrieval settings.
    pub retrieval: &'a RetrievalEngine,
    /// Planner settings.
    pub planning: &'a PlanningConfig,
    /// Seeded randomness for focal choice and target sampling.
    pub rng: &'a mut StdRng,
    /// Simulated seconds per tick.
    pub seconds_per_step: u32,
}

/// One simulated persona.
#[derive(Debug, Clone)]
pub struct Persona {
    /// Everything the persona knows.
    pub bank: MemoryBank,
}

impl Persona {
    /// Persona with empty memory.
    #[must_use]
    pub fn new(identity: Identity, params: PersonaParams) -> Self {
        Self {
            bank: MemoryBank::new(Scratch::with_params(identity, params)),
        }
    }

    /// Persona restored from a saved bank.
    #[must_use]
    pub fn from_bank(bank: MemoryBank) -> Self {
        Self { bank }
    }

    /// Persona name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.bank.name()
    }

    /// Short-term state.
    #[must_use]
    pub fn scratch(&self) -> &Scratch {
        &self.bank.scratch
    }

    /// Take one turn at `tile` and `now`: perceive, recall, plan, reflect,
    /// then pick the next tile.
    ///
    /// # Errors
    ///
    /// Structural errors from the maze, memory or pathfinder.
    pub async fn move_step<C: Cognition>(
        &mut self,
        ctx: &mut TickContext<'_, C>,
        tile: Coord,
        now: NaiveDateTime,
    ) -> Result<Execution> {
        let day_start = match self.bank.scratch.curr_time {
            None => Some(DayStart::First),
            Some(prev) if clock::date_label(prev) != clock::date_label(now) => Some(DayStart::New),
            Some(_) => None,
        };
        self.bank.scratch.curr_tile = Some(tile);
        self.bank.scratch.curr_time = Some(now);

        let perceived = perceive::perceive(&mut self.bank, ctx.maze, ctx.cognition).await?;
        let recalled = ctx.retrieval.recall(&self.bank.associative, &perceived)?;
        plan::plan(self, ctx, day_start, &recalled).await?;
        reflect::reflect(&mut self.bank, ctx).await?;
        let execution = execute::execute(&mut self.bank.scratch, ctx.maze, ctx.roster, ctx.rng)?;

        debug!(
            persona = self.name(),
            perceived = perceived.len(),
            next = ?execution.next_tile,
            description = %execution.description,
            "Persona moved"
        );
        Ok(execution)
    }
}
