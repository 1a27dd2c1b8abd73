//! The town: shared maze, every persona and the simulation clock.
//!
//! A step first mirrors where the environment says each persona stands
//! into the maze's tile events, then lets each persona take its turn in
//! name order. While a persona moves it is detached from the roster, so it
//! can read and (for conversations) update everyone else.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reverie_core::clock::{STEP_TIME_FORMAT, TIME_FORMAT};
use reverie_core::memory::Scratch;
use reverie_core::persistence::PersistenceEngine;
use reverie_core::retrieval::RetrievalEngine;
use reverie_core::types::{Coord, Triple};
use reverie_core::{Maze, ReverieConfig, ReverieError, Result, TileEvent};
use tracing::{info, instrument, warn};

use crate::cognition::Cognition;
use crate::persona::{Persona, TickContext};
use crate::sync::{PersonaMovement, StepInput, StepMeta, StepOutput};

const META_CURR_TIME: &str = "curr_time";
const META_STEP: &str = "step";
const META_TILES: &str = "tiles";

/// A running simulation.
pub struct Town<C> {
    maze: Maze,
    personas: BTreeMap<String, Persona>,
    tiles: BTreeMap<String, Coord>,
    /// Tiles each persona chose last step, used by [`Town::advance`].
    pending: BTreeMap<String, Coord>,
    /// Object events to turn idle at the start of the next step.
    object_cleanup: Vec<(String, Coord)>,
    cognition: C,
    retrieval: RetrievalEngine,
    config: ReverieConfig,
    rng: StdRng,
    curr_time: NaiveDateTime,
    step: u64,
}

impl<C: Cognition> Town<C> {
    /// Empty town at the configured start time.
    ///
    /// # Errors
    ///
    /// Returns `ReverieError::Config` for a malformed start time.
    pub fn new(maze: Maze, config: ReverieConfig, cognition: C) -> Result<Self> {
        let curr_time = config.simulation.start()?;
        Ok(Self {
            maze,
            personas: BTreeMap::new(),
            tiles: BTreeMap::new(),
            pending: BTreeMap::new(),
            object_cleanup: Vec::new(),
            cognition,
            retrieval: RetrievalEngine::new(config.retrieval.clone()),
            rng: StdRng::seed_from_u64(config.simulation.seed),
            config,
            curr_time,
            step: 0,
        })
    }

    /// Place a persona on `tile`.
    ///
    /// # Errors
    ///
    /// Returns `TileOutOfBounds` for tiles outside the maze.
    pub fn add_persona(&mut self, persona: Persona, tile: Coord) -> Result<()> {
        self.maze.access_tile(tile)?;
        let name = persona.name().to_string();
        self.maze.add_event(tile, persona_event(persona.scratch()))?;
        self.tiles.insert(name.clone(), tile);
        self.personas.insert(name, persona);
        Ok(())
    }

    /// Run one step with tiles reported by the environment. Personas the
    /// input does not mention stay where they were.
    ///
    /// # Errors
    ///
    /// Structural errors from any persona's turn; the step counter and
    /// clock only advance on success.
    #[instrument(skip(self, input), fields(step = self.step))]
    pub async fn step(&mut self, input: &StepInput) -> Result<StepOutput> {
        self.sync_tiles(input)?;

        let now = self.curr_time;
        let names: Vec<String> = self.personas.keys().cloned().collect();
        let mut movements = BTreeMap::new();
        for name in names {
            let Some(mut persona) = self.personas.remove(&name) else {
                continue;
            };
            let tile = self.tiles.get(&name).copied().unwrap_or_default();
            let result = {
                let mut ctx = TickContext {
                    maze: &self.maze,
                    roster: &mut self.personas,
                    cognition: &self.cognition,
                    retrieval: &self.retrieval,
                    planning: &self.config.planning,
                    rng: &mut self.rng,
                    seconds_per_step: self.config.simulation.seconds_per_step,
                };
                persona.move_step(&mut ctx, tile, now).await
            };
            let transcript = persona.scratch().chat.transcript.clone();
            self.personas.insert(name.clone(), persona);

            let execution = result.inspect_err(|e| warn!(persona = %name, error = %e, "Step failed"))?;
            self.pending.insert(name.clone(), execution.next_tile);
            movements.insert(name, PersonaMovement::new(execution, &transcript));
        }

        let output = StepOutput {
            persona: movements,
            meta: StepMeta {
                curr_time: now.format(STEP_TIME_FORMAT).to_string(),
            },
        };
        self.step += 1;
        self.curr_time = now + Duration::seconds(i64::from(self.config.simulation.seconds_per_step));
        Ok(output)
    }

    /// Run one step where every persona arrives where it chose to go last
    /// step.
    ///
    /// # Errors
    ///
    /// See [`Town::step`].
    pub async fn advance(&mut self) -> Result<StepOutput> {
        let mut input = StepInput::default();
        for (name, tile) in self.tiles.iter().chain(self.pending.iter()) {
            input.0.insert(name.clone(), (*tile).into());
        }
        self.step(&input).await
    }

    /// Mirror persona positions and actions into tile events.
    fn sync_tiles(&mut self, input: &StepInput) -> Result<()> {
        for (subject, tile) in self.object_cleanup.drain(..) {
            self.maze.turn_event_idle(tile, &subject)?;
        }

        let mut cleanup = Vec::new();
        for (name, persona) in &self.personas {
            let Some(old) = self.tiles.get(name).copied() else {
                continue;
            };
            let new = input.tile(name).unwrap_or(old);
            self.maze.access_tile(new)?;
            self.maze.remove_subject_events(old, name)?;
            self.maze.add_event(new, persona_event(persona.scratch()))?;

            if persona.scratch().planned_path.is_empty() {
                if let Some(object) = object_event(persona.scratch()) {
                    self.maze.remove_event(new, &TileEvent::idle(object.subject.clone()))?;
                    cleanup.push((object.subject.clone(), new));
                    self.maze.add_event(new, object)?;
                }
            }
            self.tiles.insert(name.clone(), new);
        }
        self.object_cleanup = cleanup;
        Ok(())
    }

    /// Write every memory bank and the clock to `engine`.
    ///
    /// # Errors
    ///
    /// Database and serialization errors.
    pub fn save(&self, engine: &PersistenceEngine) -> Result<()> {
        for persona in self.personas.values() {
            engine.save_bank(&persona.bank)?;
        }
        engine.save_meta(META_CURR_TIME, &self.curr_time.format(TIME_FORMAT).to_string())?;
        engine.save_meta(META_STEP, &self.step.to_string())?;
        let tiles = serde_json::to_string(&self.tiles).map_err(|e| ReverieError::Serialization(e.to_string()))?;
        engine.save_meta(META_TILES, &tiles)?;
        info!(step = self.step, personas = self.personas.len(), "Saved town");
        Ok(())
    }

    /// Restore a town saved with [`Town::save`].
    ///
    /// # Errors
    ///
    /// Database and serialization errors, or `UnknownPersona` for a saved
    /// persona with no saved tile.
    pub fn resume(maze: Maze, config: ReverieConfig, cognition: C, engine: &PersistenceEngine) -> Result<Self> {
        let mut town = Self::new(maze, config, cognition)?;
        if let Some(saved) = engine.load_meta(META_CURR_TIME)? {
            town.curr_time = NaiveDateTime::parse_from_str(&saved, TIME_FORMAT)
                .map_err(|e| ReverieError::Serialization(format!("curr_time '{saved}': {e}")))?;
        }
        if let Some(saved) = engine.load_meta(META_STEP)? {
            town.step = saved
                .parse()
                .map_err(|e| ReverieError::Serialization(format!("step '{saved}': {e}")))?;
        }
        let tiles: BTreeMap<String, Coord> = match engine.load_meta(META_TILES)? {
            Some(saved) => serde_json::from_str(&saved).map_err(|e| ReverieError::Serialization(e.to_string()))?,
            None => BTreeMap::new(),
        };

        for name in engine.list_personas()? {
            let Some(bank) = engine.load_bank(&name)? else {
                continue;
            };
            let tile = tiles
                .get(&name)
                .copied()
                .or(bank.scratch.curr_tile)
                .ok_or_else(|| ReverieError::UnknownPersona(name.clone()))?;
            town.add_persona(Persona::from_bank(bank), tile)?;
        }
        info!(step = town.step, personas = town.personas.len(), "Resumed town");
        Ok(town)
    }
}

impl<C> Town<C> {
    /// The shared world.
    #[must_use]
    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    /// A persona by name.
    #[must_use]
    pub fn persona(&self, name: &str) -> Option<&Persona> {
        self.personas.get(name)
    }

    /// Every persona, in name order.
    pub fn personas(&self) -> impl Iterator<Item = &Persona> + '_ {
        self.personas.values()
    }

    /// Where a persona currently stands.
    #[must_use]
    pub fn tile_of(&self, name: &str) -> Option<Coord> {
        self.tiles.get(name).copied()
    }

    /// Simulated time of the next step.
    #[must_use]
    pub fn curr_time(&self) -> NaiveDateTime {
        self.curr_time
    }

    /// Steps completed so far.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// The cognition backend.
    #[must_use]
    pub fn cognition(&self) -> &C {
        &self.cognition
    }
}

/// The tile event describing what a persona is doing.
fn persona_event(scratch: &Scratch) -> TileEvent {
    match (&scratch.action.address, &scratch.action.event) {
        (Some(_), Some(event)) => TileEvent::active(event, scratch.action.description.clone()),
        _ => TileEvent::idle(scratch.name()),
    }
}

/// The tile event for the object a persona is using, keyed by the full
/// action address.
fn object_event(scratch: &Scratch) -> Option<TileEvent> {
    let address = scratch.action.address.as_ref()?;
    let event = scratch.action.obj_event.as_ref()?;
    let triple = Triple::new(address.clone(), event.predicate.clone(), event.object.clone());
    Some(TileEvent::active(
        &triple,
        scratch.action.obj_description.clone().unwrap_or_default(),
    ))
}
