//! Day-level planning: wake-up hour, daily goals, hourly schedule.

use std::collections::HashSet;

use chrono::Duration;
use reverie_core::clock;
use reverie_core::memory::{MemoryBank, NodeDraft};
use reverie_core::schedule::{DailySchedule, FILLER_ACTIVITY};
use reverie_core::types::Triple;
use reverie_core::Result;
use tracing::{debug, info};

use crate::cognition::Cognition;
use crate::persona::TickContext;
use crate::plan::DayStart;
use crate::retrieve;

/// Build the day's plan and record it as a thought.
///
/// # Errors
///
/// Returns a memory error if the plan thought cannot be stored.
pub async fn plan_day<C: Cognition>(bank: &mut MemoryBank, ctx: &mut TickContext<'_, C>, day: DayStart) -> Result<()> {
    let Some(now) = bank.scratch.curr_time else {
        return Ok(());
    };
    let wake_up_hour = ctx.cognition.wake_up_hour(&bank.scratch).await.min(23);

    match day {
        DayStart::First => {
            bank.scratch.daily_req = ctx.cognition.daily_plan(&bank.scratch, wake_up_hour).await;
        }
        DayStart::New => revise_identity(bank, ctx).await?,
    }

    let mut hourly = Vec::new();
    for _ in 0..ctx.planning.diversity_passes.max(1) {
        hourly = hourly_activities(bank, ctx.cognition, wake_up_hour).await;
        let distinct = hourly.iter().collect::<HashSet<_>>().len();
        if distinct >= ctx.planning.min_distinct_activities {
            break;
        }
    }
    let mut schedule = DailySchedule::from_hourly(&hourly);
    schedule.pad_to_day();
    bank.scratch.hourly_schedule = schedule.clone();
    bank.scratch.daily_schedule = schedule;

    let date = clock::date_label(now);
    let name = bank.scratch.name().to_string();
    let thought = format!(
        "This is {name}'s plan for {date}: {}.",
        bank.scratch.daily_req.join(", ")
    );
    let embedding = ctx.cognition.embedding(&thought).await;
    bank.associative.add_thought(
        NodeDraft::new(
            now,
            Triple::new(name.clone(), "plan", date.clone()),
            thought.clone(),
            ctx.planning.plan_poignancy,
            thought,
            embedding,
        )
        .with_keywords(["plan"])
        .with_expiration(now + Duration::days(ctx.planning.plan_thought_expiration_days)),
    )?;

    info!(
        persona = %name,
        date = %date,
        wake_up_hour,
        blocks = bank.scratch.daily_schedule.len(),
        "Planned the day"
    );
    Ok(())
}

/// One hourly pass: sleep until waking, then ask for each remaining hour.
async fn hourly_activities<C: Cognition>(bank: &MemoryBank, cognition: &C, wake_up_hour: u32) -> Vec<String> {
    let mut hourly: Vec<String> = Vec::with_capacity(24);
    for hour in 0..24 {
        let activity = if hour < wake_up_hour {
            FILLER_ACTIVITY.to_string()
        } else {
            cognition.hourly_activity(&bank.scratch, hour, &hourly).await
        };
        hourly.push(activity);
    }
    hourly
}

/// Revise `currently` and the plan requirement from yesterday's plan and
/// recent important events.
async fn revise_identity<C: Cognition>(bank: &mut MemoryBank, ctx: &mut TickContext<'_, C>) -> Result<()> {
    let Some(now) = bank.scratch.curr_time else {
        return Ok(());
    };
    let name = bank.scratch.name().to_string();
    let focal_points = vec![
        format!("{name}'s plan for {}.", clock::date_label(now)),
        format!("Important recent events for {name}'s life."),
    ];
    let retrieved = retrieve::focal_retrieve(bank, ctx.cognition, ctx.retrieval, &focal_points, None).await?;

    let mut statements = String::new();
    for id in retrieve::distinct_nodes(&retrieved) {
        let node = bank.associative.node(id)?;
        statements.push_str(&format!(
            "{}: {}\n",
            node.created.format("%A %B %d -- %H:%M %p"),
            node.embedding_key
        ));
    }

    let revision = ctx.cognition.revise_identity(&bank.scratch, &statements).await;
    debug!(persona = %name, notes = %revision.notes, "Revised identity");
    if !revision.currently.is_empty() {
        bank.scratch.identity.currently = revision.currently;
    }
    if !revision.daily_plan_req.is_empty() {
        bank.scratch.identity.daily_plan_req = revision.daily_plan_req;
    }
    Ok(())
}
