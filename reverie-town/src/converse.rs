//! Two-persona conversations, one retrieved line at a time.

use reverie_core::memory::node::transcript_text;
use reverie_core::memory::{MemoryBank, Utterance};
use reverie_core::retrieval::RetrievalEngine;
use reverie_core::Result;
use tracing::debug;

use crate::cognition::{Cognition, NextLine};
use crate::retrieve;

/// Lines of context taken from the end of the transcript.
const RECENT_LINES: usize = 4;

/// Let `init` and `target` talk, alternating lines, for at most
/// `max_utterances` lines or until a speaker ends it.
///
/// # Errors
///
/// Propagates retrieval errors.
pub async fn agent_chat<C: Cognition>(
    init: &mut MemoryBank,
    target: &mut MemoryBank,
    cognition: &C,
    retrieval: &RetrievalEngine,
    max_utterances: usize,
) -> Result<Vec<Utterance>> {
    let mut transcript = Vec::new();
    for turn in 0..max_utterances {
        let (speaker, listener) = if turn % 2 == 0 {
            (&mut *init, &*target)
        } else {
            (&mut *target, &*init)
        };
        let line = next_line(speaker, listener, cognition, retrieval, &transcript).await?;
        transcript.push(Utterance::new(speaker.name(), line.text));
        if line.ends_conversation {
            break;
        }
    }
    debug!(
        init = init.name(),
        target = target.name(),
        lines = transcript.len(),
        "Conversation finished"
    );
    Ok(transcript)
}

async fn next_line<C: Cognition>(
    speaker: &mut MemoryBank,
    listener: &MemoryBank,
    cognition: &C,
    retrieval: &RetrievalEngine,
    transcript: &[Utterance],
) -> Result<NextLine> {
    let config = retrieval.config().clone();
    let listener_name = listener.name().to_string();

    let about = retrieve::focal_retrieve(
        speaker,
        cognition,
        retrieval,
        &[listener_name.clone()],
        Some(config.partner_count),
    )
    .await?;
    let statements = retrieve::statements(&speaker.associative, &retrieve::distinct_nodes(&about))?.join("\n");
    let relationship = cognition
        .relationship_summary(&speaker.scratch, &listener.scratch, &statements)
        .await;

    let mut focal = vec![
        relationship.clone(),
        format!("{listener_name} is {}", listener.scratch.action.description),
    ];
    let recent = transcript_text(&transcript[transcript.len().saturating_sub(RECENT_LINES)..]);
    if !recent.is_empty() {
        focal.push(recent);
    }
    let context = retrieve::focal_retrieve(
        speaker,
        cognition,
        retrieval,
        &focal,
        Some(config.utterance_context_count),
    )
    .await?;
    let memories = retrieve::statements(&speaker.associative, &retrieve::distinct_nodes(&context))?.join("\n");

    Ok(cognition
        .utterance(&speaker.scratch, &listener.scratch, &relationship, &memories, transcript)
        .await)
}

/// Minutes a conversation occupies: one per 30 eight-character chunks of
/// transcript, at least one.
#[must_use]
pub fn chat_minutes(transcript: &[Utterance]) -> u32 {
    let chunks = transcript_text(transcript).len() / 8;
    u32::try_from(chunks.div_ceil(30)).unwrap_or(u32::MAX).max(1)
}
