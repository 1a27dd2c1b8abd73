//! Reacting to a perceived persona: start a conversation or wait for
//! them to finish.

use chrono::{Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use reverie_core::clock::{self, STEP_TIME_FORMAT};
use reverie_core::memory::{Action, AssociativeMemory, MemoryBank, Scratch, Utterance};
use reverie_core::retrieval::RecallContext;
use reverie_core::schedule::split_detail;
use reverie_core::types::Triple;
use reverie_core::Result;
use tracing::{debug, info};

use crate::cognition::Cognition;
use crate::converse;
use crate::perceive::CHAT_PREDICATE;
use crate::persona::{Persona, TickContext};

/// Emoji for conversations.
const CHAT_PRONUNCIATIO: &str = "💬";

/// Emoji for waiting.
const WAIT_PRONUNCIATIO: &str = "⌛";

/// What a persona decided to do about someone it noticed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Start a conversation with the named persona.
    Chat(String),
    /// Wait in place until the given time.
    Wait(NaiveDateTime),
}

/// Pick the perceived event worth reacting to.
///
/// The persona's own events are ignored. Events by other personas come
/// first; failing those, any event that is not idle. Ties break at random.
///
/// # Errors
///
/// Returns `NodeNotFound` if a context points at an unknown node.
pub fn choose_retrieved(
    name: &str,
    recalled: &[RecallContext],
    memory: &AssociativeMemory,
    rng: &mut StdRng,
) -> Result<Option<RecallContext>> {
    let mut others = Vec::new();
    for ctx in recalled {
        let node = memory.node(ctx.curr_event)?;
        if node.subject != name {
            others.push((ctx, node));
        }
    }

    let personas: Vec<&RecallContext> = others
        .iter()
        .filter(|(_, node)| !node.subject.contains(':'))
        .map(|(ctx, _)| *ctx)
        .collect();
    if let Some(choice) = personas.choose(rng) {
        return Ok(Some((*choice).clone()));
    }

    let active: Vec<&RecallContext> = others
        .iter()
        .filter(|(_, node)| !node.description.contains("is idle"))
        .map(|(ctx, _)| *ctx)
        .collect();
    Ok(active.choose(rng).map(|c| (*c).clone()))
}

/// React to the focused event if it is another persona doing something.
///
/// # Errors
///
/// Structural errors from retrieval or schedule splicing.
pub async fn react<C: Cognition>(persona: &mut Persona, ctx: &mut TickContext<'_, C>, focus: &RecallContext) -> Result<()> {
    let Some(reaction) = decide(persona, ctx, focus).await? else {
        return Ok(());
    };
    info!(persona = persona.name(), reaction = ?reaction, "Reacting");
    match reaction {
        Reaction::Chat(target) => chat_react(persona, ctx, &target).await,
        Reaction::Wait(until) => wait_react(&mut persona.bank.scratch, ctx.cognition, until).await,
    }
}

async fn decide<C: Cognition>(
    persona: &Persona,
    ctx: &TickContext<'_, C>,
    focus: &RecallContext,
) -> Result<Option<Reaction>> {
    let init = persona.scratch();
    if init.chat.with.is_some() || init.is_waiting() {
        return Ok(None);
    }
    let subject = persona.bank.associative.node(focus.curr_event)?.subject.clone();
    if subject.contains(':') {
        return Ok(None);
    }
    let Some(target) = ctx.roster.get(&subject) else {
        return Ok(None);
    };
    let target = target.scratch();
    let context = reaction_context(&persona.bank, focus, &subject)?;

    if may_talk(init, target) && ctx.cognition.decide_to_talk(init, target, &context).await {
        return Ok(Some(Reaction::Chat(subject)));
    }
    if may_wait(init, target) && ctx.cognition.decide_to_react(init, target, &context).await {
        return Ok(wait_until(target).map(Reaction::Wait));
    }
    Ok(None)
}

fn both_busy(init: &Scratch, target: &Scratch) -> bool {
    init.action.address.is_some()
        && target.action.address.is_some()
        && !init.action.description.is_empty()
        && !target.action.description.is_empty()
}

fn may_talk(init: &Scratch, target: &Scratch) -> bool {
    both_busy(init, target)
        && !init.is_sleeping()
        && !target.is_sleeping()
        && init.hour() != 23
        && !target.is_waiting()
        && init.chat.with.is_none()
        && target.chat.with.is_none()
        && init.cooldown_for(target.name()) == 0
}

fn may_wait(init: &Scratch, target: &Scratch) -> bool {
    both_busy(init, target)
        && !init.is_sleeping()
        && !target.is_sleeping()
        && init.hour() != 23
        && !target.is_waiting()
        && !init.planned_path.is_empty()
        && init.action.address == target.action.address
}

/// The minute before the target's current action ends.
fn wait_until(target: &Scratch) -> Option<NaiveDateTime> {
    let start = target.action.start_time?;
    let minutes = target.action.duration?;
    Some(start + Duration::minutes(i64::from(minutes.saturating_sub(1))))
}

/// What the persona remembers that bears on the focused event, phrased
/// in the past tense, plus when it last talked with `target`.
fn reaction_context(bank: &MemoryBank, focus: &RecallContext, target: &str) -> Result<String> {
    let mut context = String::new();
    for id in &focus.events {
        context.push_str(&past_tense(&bank.associative.node(*id)?.description));
        context.push_str(". ");
    }
    context.push('\n');
    for id in &focus.thoughts {
        context.push_str(&bank.associative.node(*id)?.description);
        context.push_str(". ");
    }
    if let Some(last) = bank.associative.get_last_chat(target) {
        context.push_str(&format!(
            "\n{} last chatted with {target} on {} about {}.",
            bank.scratch.identity.first_name,
            last.created.format(STEP_TIME_FORMAT),
            last.description
        ));
    }
    Ok(context)
}

/// `"Klaus is reading"` becomes `"Klaus was reading"`: the first
/// standalone `is` turns into `was`. Descriptions without one are kept.
fn past_tense(description: &str) -> String {
    let mut done = false;
    description
        .split(' ')
        .map(|word| {
            if !done && word == "is" {
                done = true;
                "was"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn chat_react<C: Cognition>(persona: &mut Persona, ctx: &mut TickContext<'_, C>, target_name: &str) -> Result<()> {
    let Some(target) = ctx.roster.get_mut(target_name) else {
        return Ok(());
    };
    let transcript = converse::agent_chat(
        &mut persona.bank,
        &mut target.bank,
        ctx.cognition,
        ctx.retrieval,
        ctx.planning.max_utterances,
    )
    .await?;
    let minutes = converse::chat_minutes(&transcript);
    let summary = ctx.cognition.conversation_summary(&persona.bank.scratch, &transcript).await;
    let Some(now) = target.bank.scratch.curr_time.or(persona.bank.scratch.curr_time) else {
        return Ok(());
    };
    let end = clock::ceil_to_minute(now) + Duration::minutes(i64::from(minutes));
    debug!(
        init = persona.name(),
        target = target_name,
        lines = transcript.len(),
        minutes,
        summary = %summary,
        "Conversation settled"
    );

    let init_name = persona.name().to_string();
    let chat = ChatPlan {
        summary: &summary,
        minutes,
        transcript: &transcript,
        end,
        cooldown: ctx.planning.chat_cooldown_ticks,
    };
    install_chat(&mut persona.bank.scratch, ctx.cognition, target_name, &chat).await?;
    install_chat(&mut target.bank.scratch, ctx.cognition, &init_name, &chat).await
}

struct ChatPlan<'a> {
    summary: &'a str,
    minutes: u32,
    transcript: &'a [Utterance],
    end: NaiveDateTime,
    cooldown: u32,
}

async fn install_chat<C: Cognition>(scratch: &mut Scratch, cognition: &C, partner: &str, chat: &ChatPlan<'_>) -> Result<()> {
    splice_reaction(scratch, cognition, chat.summary, chat.minutes).await?;
    let name = scratch.name().to_string();
    scratch.set_action(Action {
        address: Some(format!("<persona> {partner}")),
        start_time: None,
        duration: Some(chat.minutes),
        description: chat.summary.to_string(),
        pronunciatio: CHAT_PRONUNCIATIO.to_string(),
        event: Some(Triple::new(name, CHAT_PREDICATE, partner)),
        obj_description: None,
        obj_pronunciatio: None,
        obj_event: None,
    });
    scratch.chat.cooldown.insert(partner.to_string(), chat.cooldown);
    scratch.start_chat(partner, chat.transcript.to_vec(), chat.end);
    Ok(())
}

async fn wait_react<C: Cognition>(scratch: &mut Scratch, cognition: &C, until: NaiveDateTime) -> Result<()> {
    let Some(tile) = scratch.curr_tile else {
        return Ok(());
    };
    let detail = split_detail(&scratch.action.description).1.to_string();
    let inserted = format!("waiting to start {detail}");
    let now = scratch.minute_of_day(0);
    let minutes = (clock::minutes_into_day(until) + 1).saturating_sub(now).max(1);

    splice_reaction(scratch, cognition, &inserted, minutes).await?;
    let name = scratch.name().to_string();
    scratch.set_action(Action {
        address: Some(format!("<waiting> {} {}", tile.0, tile.1)),
        start_time: None,
        duration: Some(minutes),
        description: inserted,
        pronunciatio: WAIT_PRONUNCIATIO.to_string(),
        event: Some(Triple::new(name, "waiting to start", detail)),
        obj_description: None,
        obj_pronunciatio: None,
        obj_event: None,
    });
    Ok(())
}

/// Rewrite the schedule around an inserted reaction of `minutes`.
async fn splice_reaction<C: Cognition>(scratch: &mut Scratch, cognition: &C, inserted: &str, minutes: u32) -> Result<()> {
    let region = scratch
        .daily_schedule
        .plan_splice(&scratch.hourly_schedule, scratch.minute_of_day(0), inserted, minutes)?;
    let revised = cognition.revise_schedule(scratch, &region, inserted, minutes).await;
    scratch.daily_schedule.apply_splice(&region, revised);
    Ok(())
}
