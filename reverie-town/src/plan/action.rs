//! Choosing the next action from the daily schedule.

use reverie_core::memory::{Action, MemoryBank};
use reverie_core::schedule::{fit_decomposition, should_decompose};
use reverie_core::types::Coord;
use reverie_core::{Maze, ReverieError, Result, TileLevel};
use tracing::debug;

use crate::cognition::Cognition;
use crate::persona::TickContext;

/// Object segment for actions that can happen anywhere in an arena.
pub const RANDOM_OBJECT: &str = "<random>";

/// Decomposition is only considered for blocks at least this long.
const DECOMPOSE_MINUTES: u32 = 60;

/// Pick the next action from the schedule and install it.
///
/// Blocks about to run are decomposed into subtasks first.
///
/// # Errors
///
/// Returns a maze error if the persona stands outside the maze and a
/// schedule error if the day is empty.
pub async fn determine_action<C: Cognition>(bank: &mut MemoryBank, ctx: &mut TickContext<'_, C>) -> Result<()> {
    let Some(tile) = bank.scratch.curr_tile else {
        return Ok(());
    };

    let curr_index = bank.scratch.schedule_index(0);
    let mut ahead = bank.scratch.schedule_index(60);
    if curr_index == 0 {
        if decompose_block(bank, ctx.cognition, curr_index).await? {
            ahead = bank.scratch.schedule_index(60);
        }
        if ahead + 1 < bank.scratch.daily_schedule.len() {
            decompose_block(bank, ctx.cognition, ahead + 1).await?;
        }
    }
    if ahead < bank.scratch.daily_schedule.len() && bank.scratch.hour() < 23 {
        decompose_block(bank, ctx.cognition, ahead).await?;
    }
    bank.scratch.daily_schedule.pad_to_day();

    let index = bank.scratch.schedule_index(0);
    let block = bank
        .scratch
        .daily_schedule
        .get(index)
        .cloned()
        .ok_or(ReverieError::EmptySchedule)?;

    let arena = resolve_arena(bank, ctx, tile, &block.activity).await?;
    let object = resolve_object(bank, ctx, &arena, &block.activity).await;
    let address = format!("{arena}:{object}");

    let name = bank.scratch.name().to_string();
    let pronunciatio = ctx.cognition.pronunciatio(&block.activity).await;
    let event = ctx.cognition.event_triple(&name, &block.activity).await;
    let (obj_description, obj_pronunciatio, obj_event) = if object == RANDOM_OBJECT {
        (None, None, None)
    } else {
        let state = ctx.cognition.object_state(&bank.scratch, &object, &block.activity).await;
        let pron = ctx.cognition.pronunciatio(&state).await;
        let triple = ctx.cognition.event_triple(&object, &state).await;
        (Some(state), Some(pron), Some(triple))
    };

    debug!(
        persona = %name,
        activity = %block.activity,
        minutes = block.minutes,
        address = %address,
        "Chose action"
    );
    bank.scratch.set_action(Action {
        address: Some(address),
        start_time: None,
        duration: Some(block.minutes),
        description: block.activity,
        pronunciatio,
        event: Some(event),
        obj_description,
        obj_pronunciatio,
        obj_event,
    });
    Ok(())
}

/// Decompose block `index` in place when it is long enough and worth it.
/// Returns whether the schedule changed.
async fn decompose_block<C: Cognition>(bank: &mut MemoryBank, cognition: &C, index: usize) -> Result<bool> {
    let Some(block) = bank.scratch.daily_schedule.get(index).cloned() else {
        return Ok(false);
    };
    if block.minutes < DECOMPOSE_MINUTES || !should_decompose(&block.activity, block.minutes) {
        return Ok(false);
    }
    let start = bank.scratch.daily_schedule.start_of(index);
    let subtasks = cognition
        .task_decomposition(&bank.scratch, &block.activity, start, block.minutes)
        .await;
    if subtasks.is_empty() {
        return Ok(false);
    }
    let fitted = fit_decomposition(&block.activity, block.minutes, &subtasks);
    bank.scratch.daily_schedule.replace_block(index, fitted)?;
    Ok(true)
}

/// `world:sector:arena` for an activity, falling back to the living area
/// and then the arena the persona stands in.
async fn resolve_arena<C: Cognition>(
    bank: &MemoryBank,
    ctx: &TickContext<'_, C>,
    tile: Coord,
    activity: &str,
) -> Result<String> {
    let world = ctx.maze.access_tile(tile)?.world.clone();
    let sector = ctx
        .cognition
        .action_sector(&bank.scratch, &bank.spatial, &world, activity)
        .await;
    let sector_address = format!("{world}:{sector}");
    let arena = ctx
        .cognition
        .action_arena(&bank.scratch, &bank.spatial, &sector_address, activity)
        .await;
    let candidate = format!("{sector_address}:{arena}");
    if ctx.maze.has_address(&candidate) {
        return Ok(candidate);
    }
    fallback_arena(ctx.maze, &bank.scratch.identity.living_area, tile).ok_or(ReverieError::AddressNotFound(candidate))
}

fn fallback_arena(maze: &Maze, living_area: &str, tile: Coord) -> Option<String> {
    if maze.has_address(living_area) {
        return Some(living_area.to_string());
    }
    maze.tile_path(tile, TileLevel::Arena)
        .ok()
        .filter(|here| maze.has_address(here))
}

/// Object within `arena` for an activity, or [`RANDOM_OBJECT`] when the
/// persona knows of none there.
async fn resolve_object<C: Cognition>(
    bank: &MemoryBank,
    ctx: &TickContext<'_, C>,
    arena: &str,
    activity: &str,
) -> String {
    let mut parts = arena.splitn(3, ':');
    let (Some(world), Some(sector), Some(arena_name)) = (parts.next(), parts.next(), parts.next()) else {
        return RANDOM_OBJECT.to_string();
    };
    let objects = bank.spatial.objects(world, sector, arena_name);
    if objects.is_empty() {
        return RANDOM_OBJECT.to_string();
    }
    let object = ctx.cognition.action_object(activity, &objects).await;
    if ctx.maze.has_address(&format!("{arena}:{object}")) {
        object
    } else {
        RANDOM_OBJECT.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_core::schedule::{DailySchedule, ScheduleBlock};

    use crate::cognition::RuleBasedCognition;
    use crate::testing::{at, isabella, Fixture, Recording};

    const CAFE: &str = "the Ville:Hobbs Cafe:cafe";

    fn day(blocks: &[(&str, u32)]) -> DailySchedule {
        DailySchedule::from_blocks(blocks.iter().map(|(a, m)| ScheduleBlock::new(*a, *m)).collect())
    }

    fn knows_the_cafe(bank: &mut MemoryBank) {
        bank.spatial.learn("the Ville", Some("Hobbs Cafe"), Some("cafe"), Some("behind the cafe counter"));
        bank.spatial.learn("the Ville", Some("Hobbs Cafe"), Some("cafe"), Some("cafe customer seating"));
    }

    fn activities(bank: &MemoryBank) -> Vec<(String, u32)> {
        bank.scratch
            .daily_schedule
            .blocks()
            .iter()
            .map(|b| (b.activity.clone(), b.minutes))
            .collect()
    }

    #[tokio::test]
    async fn first_block_and_the_hour_ahead_are_decomposed() {
        let mut fixture = Fixture::new();
        let cognition = Recording::new(RuleBasedCognition::new());
        let mut bank = isabella();
        knows_the_cafe(&mut bank);
        bank.scratch.curr_time = Some(at(0, 0));
        bank.scratch.daily_schedule = day(&[("having breakfast", 60), ("working", 180), ("sleeping", 1200)]);

        determine_action(&mut bank, &mut fixture.ctx(&cognition)).await.expect("action");

        assert_eq!(
            *cognition.decomposed.borrow(),
            vec![("having breakfast".to_string(), 0), ("working".to_string(), 60)]
        );
        assert_eq!(bank.scratch.daily_schedule.len(), 7);
        assert_eq!(bank.scratch.daily_schedule.total_minutes(), 1440);
        let action = &bank.scratch.action;
        assert_eq!(action.description, "having breakfast (getting ready for having breakfast)");
        assert_eq!(action.duration, Some(15));
        assert_eq!(action.start_time, Some(at(0, 0)));
        let address = action.address.as_deref().expect("address");
        assert!(address.starts_with(&format!("{CAFE}:")));
        assert_ne!(address, format!("{CAFE}:{RANDOM_OBJECT}"));
        assert!(action.obj_event.is_some());
    }

    #[tokio::test]
    async fn later_in_the_day_only_the_hour_ahead_is_decomposed() {
        let mut fixture = Fixture::new();
        let cognition = Recording::new(RuleBasedCognition::new());
        let mut bank = isabella();
        knows_the_cafe(&mut bank);
        bank.scratch.curr_time = Some(at(9, 0));
        bank.scratch.daily_schedule = day(&[
            ("sleeping", 480),
            ("having breakfast", 60),
            ("working", 240),
            ("sleeping", 660),
        ]);

        determine_action(&mut bank, &mut fixture.ctx(&cognition)).await.expect("action");

        assert_eq!(*cognition.decomposed.borrow(), vec![("working".to_string(), 540)]);
        let blocks = activities(&bank);
        assert_eq!(blocks[1], ("having breakfast".to_string(), 60));
        assert_eq!(blocks[2], ("working (getting ready for working)".to_string(), 15));
        assert_eq!(blocks[3], ("working (focusing)".to_string(), 215));
        assert_eq!(bank.scratch.daily_schedule.total_minutes(), 1440);
        assert_eq!(bank.scratch.action.description, "working (getting ready for working)");
    }

    #[tokio::test]
    async fn arenas_without_known_objects_use_a_random_spot() {
        let mut fixture = Fixture::new();
        let cognition = Recording::new(RuleBasedCognition::new());
        let mut bank = isabella();
        bank.spatial.learn("the Ville", Some("Hobbs Cafe"), Some("cafe"), None);
        bank.scratch.daily_schedule = day(&[("sleeping", 420), ("napping in bed", 1020)]);

        determine_action(&mut bank, &mut fixture.ctx(&cognition)).await.expect("action");

        assert!(cognition.decomposed.borrow().is_empty());
        let action = &bank.scratch.action;
        assert_eq!(action.address.as_deref(), Some(format!("{CAFE}:{RANDOM_OBJECT}").as_str()));
        assert_eq!(action.duration, Some(1020));
        assert!(action.obj_description.is_none());
        assert!(action.obj_event.is_none());
    }

    #[tokio::test]
    async fn objects_missing_from_the_maze_use_a_random_spot() {
        let mut fixture = Fixture::new();
        let cognition = RuleBasedCognition::new();
        let mut bank = isabella();
        bank.spatial.learn("the Ville", Some("Hobbs Cafe"), Some("cafe"), Some("piano"));
        let ctx = fixture.ctx(&cognition);

        assert_eq!(resolve_object(&bank, &ctx, CAFE, "playing the piano").await, RANDOM_OBJECT);
        assert_eq!(resolve_object(&bank, &ctx, "the Ville", "playing the piano").await, RANDOM_OBJECT);
    }

    #[tokio::test]
    async fn unknown_arenas_fall_back_to_home_then_here() {
        let mut fixture = Fixture::new();
        let cognition = RuleBasedCognition::new();
        let mut bank = isabella();
        knows_the_cafe(&mut bank);
        bank.spatial.learn("the Ville", Some("Oak Hill College"), Some("library"), None);
        let activity = "studying at Oak Hill College";
        let ctx = fixture.ctx(&cognition);

        assert_eq!(resolve_arena(&bank, &ctx, (2, 2), activity).await.expect("home"), CAFE);

        bank.scratch.identity.living_area = "the Ville:Dorm for Oak Hill College:Isabella's room".into();
        assert_eq!(resolve_arena(&bank, &ctx, (2, 2), activity).await.expect("here"), CAFE);

        // Column 11 has no arena label, so nothing is left to fall back to.
        assert!(matches!(
            resolve_arena(&bank, &ctx, (11, 7), activity).await,
            Err(ReverieError::AddressNotFound(address)) if address == "the Ville:Oak Hill College:library"
        ));
    }
}
