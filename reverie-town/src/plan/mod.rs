//! Planning: the day's schedule, the current action and reactions to
//! what the persona just noticed.

pub mod action;
pub mod long_term;
pub mod react;

use reverie_core::retrieval::RecallContext;
use reverie_core::Result;

use crate::cognition::Cognition;
use crate::perceive::CHAT_PREDICATE;
use crate::persona::{Persona, TickContext};

/// Why a tick starts a new day plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStart {
    /// The persona has never been stepped.
    First,
    /// The calendar date changed since the last tick.
    New,
}

/// Run one planning pass for `persona`.
///
/// # Errors
///
/// Structural errors from the schedule, maze or memory.
pub async fn plan<C: Cognition>(
    persona: &mut Persona,
    ctx: &mut TickContext<'_, C>,
    day_start: Option<DayStart>,
    recalled: &[RecallContext],
) -> Result<()> {
    if let Some(day) = day_start {
        long_term::plan_day(&mut persona.bank, ctx, day).await?;
    }

    if persona.bank.scratch.act_check_finished() {
        action::determine_action(&mut persona.bank, ctx).await?;
    }

    let focus = react::choose_retrieved(persona.name(), recalled, &persona.bank.associative, ctx.rng)?;
    if let Some(focus) = focus {
        react::react(persona, ctx, &focus).await?;
    }

    let scratch = &mut persona.bank.scratch;
    let chatting = scratch
        .action
        .event
        .as_ref()
        .is_some_and(|e| e.predicate == CHAT_PREDICATE);
    if !chatting {
        scratch.clear_chat();
    }
    let partner = scratch.chat.with.clone();
    scratch.decrement_cooldowns(partner.as_deref());
    Ok(())
}
