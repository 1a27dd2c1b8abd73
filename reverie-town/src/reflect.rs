//! Reflection: turning accumulated importance into insights, and
//! conversations into planning notes.

use chrono::{Duration, NaiveDateTime};
use reverie_core::memory::{MemoryBank, NodeDraft};
use reverie_core::types::NodeId;
use reverie_core::Result;
use tracing::{debug, info};

use crate::cognition::{numbered, Cognition};
use crate::persona::TickContext;
use crate::retrieve;

/// Questions generated per reflection.
const FOCAL_POINT_COUNT: usize = 3;

/// Days a reflected thought stays current.
const THOUGHT_EXPIRATION_DAYS: i64 = 30;

/// Reflect when enough importance has built up, then write notes for a
/// conversation that ends on the next tick.
///
/// # Errors
///
/// Structural errors from retrieval or thought storage.
pub async fn reflect<C: Cognition>(bank: &mut MemoryBank, ctx: &mut TickContext<'_, C>) -> Result<()> {
    if reflection_due(bank) {
        run_reflect(bank, ctx).await?;
        bank.scratch.reset_reflection();
    }

    let Some(now) = bank.scratch.curr_time else {
        return Ok(());
    };
    let ends_next_tick = bank
        .scratch
        .chat
        .end_time
        .is_some_and(|end| now + Duration::seconds(i64::from(ctx.seconds_per_step)) == end);
    if ends_next_tick {
        conversation_notes(bank, ctx.cognition, now).await?;
    }
    Ok(())
}

/// Whether accumulated importance crossed the threshold.
#[must_use]
pub fn reflection_due(bank: &MemoryBank) -> bool {
    bank.scratch.importance_trigger_curr <= 0 && bank.associative.events_and_thoughts().next().is_some()
}

async fn run_reflect<C: Cognition>(bank: &mut MemoryBank, ctx: &mut TickContext<'_, C>) -> Result<()> {
    let Some(now) = bank.scratch.curr_time else {
        return Ok(());
    };

    let mut recent: Vec<_> = bank
        .associative
        .events_and_thoughts()
        .filter(|n| !n.embedding_key.contains("idle"))
        .collect();
    recent.sort_by_key(|n| n.last_accessed);
    let skip = recent.len().saturating_sub(bank.scratch.importance_ele_n);
    let statements: String = recent[skip..]
        .iter()
        .map(|n| format!("{}\n", n.embedding_key))
        .collect();

    let focal_points = ctx
        .cognition
        .focal_points(&bank.scratch, &statements, FOCAL_POINT_COUNT)
        .await;
    if focal_points.is_empty() {
        return Ok(());
    }
    let retrieved = retrieve::focal_retrieve(bank, ctx.cognition, ctx.retrieval, &focal_points, None).await?;

    let mut written = 0;
    for focal in &retrieved {
        let nodes = focal.node_ids();
        let listed = numbered(&retrieve::statements(&bank.associative, &nodes)?);
        let insights = ctx
            .cognition
            .insights(&bank.scratch, &listed, bank.scratch.params.thought_count)
            .await;
        for (insight, indices) in insights {
            let evidence: Vec<NodeId> = indices.iter().filter_map(|i| nodes.get(*i).copied()).collect();
            add_thought(bank, ctx.cognition, now, insight, evidence).await?;
            written += 1;
        }
    }
    info!(
        persona = bank.scratch.name(),
        focal_points = focal_points.len(),
        thoughts = written,
        "Reflected"
    );
    Ok(())
}

async fn conversation_notes<C: Cognition>(bank: &mut MemoryBank, cognition: &C, now: NaiveDateTime) -> Result<()> {
    let Some(partner) = bank.scratch.chat.with.clone() else {
        return Ok(());
    };
    let evidence: Vec<NodeId> = bank
        .associative
        .get_last_chat(&partner)
        .map(|n| vec![n.node_id])
        .unwrap_or_default();
    let transcript = bank.scratch.chat.transcript.clone();
    let name = bank.scratch.name().to_string();

    let planning = cognition.planning_thought(&bank.scratch, &transcript).await;
    add_thought(bank, cognition, now, format!("For {name}'s planning: {planning}"), evidence.clone()).await?;

    let memo = cognition.conversation_memo(&bank.scratch, &transcript).await;
    add_thought(bank, cognition, now, format!("{name} {memo}"), evidence).await?;
    debug!(persona = %name, partner = %partner, "Wrote conversation notes");
    Ok(())
}

async fn add_thought<C: Cognition>(
    bank: &mut MemoryBank,
    cognition: &C,
    now: NaiveDateTime,
    thought: String,
    evidence: Vec<NodeId>,
) -> Result<NodeId> {
    let name = bank.scratch.name().to_string();
    let triple = cognition.event_triple(&name, &thought).await;
    let poignancy = cognition.event_poignancy(&bank.scratch, &thought).await;
    let embedding = cognition.embedding(&thought).await;
    let keywords = [triple.subject.clone(), triple.predicate.clone(), triple.object.clone()];
    bank.associative.add_thought(
        NodeDraft::new(now, triple, thought.clone(), poignancy, thought, embedding)
            .with_keywords(keywords)
            .with_expiration(now + Duration::days(THOUGHT_EXPIRATION_DAYS))
            .with_evidence(evidence),
    )
}
