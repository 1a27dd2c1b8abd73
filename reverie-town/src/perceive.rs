//! Perception: turn nearby tile events into event memories.

use reverie_core::maze::Maze;
use reverie_core::memory::{MemoryBank, NodeDraft};
use reverie_core::perception::{attend_events, scan_space, Percept};
use reverie_core::types::NodeId;
use reverie_core::Result;
use tracing::debug;

use crate::cognition::Cognition;

/// Predicate of a conversation event.
pub const CHAT_PREDICATE: &str = "chat with";

/// Scan around the persona, attend to the closest events in its arena and
/// remember the ones not already among its latest `retention` events.
///
/// Returns the ids of the new event nodes, in attention order.
///
/// # Errors
///
/// Returns a maze error if the persona's tile is outside the maze.
pub async fn perceive<C: Cognition>(bank: &mut MemoryBank, maze: &Maze, cognition: &C) -> Result<Vec<NodeId>> {
    let (Some(tile), Some(now)) = (bank.scratch.curr_tile, bank.scratch.curr_time) else {
        return Ok(Vec::new());
    };
    let params = bank.scratch.params.clone();
    let nearby = scan_space(maze, &mut bank.spatial, tile, params.vision_radius)?;
    let events = attend_events(maze, tile, &nearby, params.attention_bandwidth)?;
    let latest = bank.associative.get_summarized_latest_events(params.retention);

    let mut added = Vec::new();
    for event in &events {
        let percept = Percept::from_tile_event(event);
        if latest.contains(&percept.triple) {
            continue;
        }

        let embedding = match bank.associative.embedding(&percept.embedding_text) {
            Some(known) => known.clone(),
            None => cognition.embedding(&percept.embedding_text).await,
        };
        let poignancy = if percept.is_idle() {
            1
        } else {
            cognition.event_poignancy(&bank.scratch, &percept.description).await
        };

        let mut evidence = Vec::new();
        if percept.triple.subject == bank.scratch.name() && percept.triple.predicate == CHAT_PREDICATE {
            let action = bank.scratch.action.clone();
            let chat_embedding = match bank.associative.embedding(&action.description) {
                Some(known) => known.clone(),
                None => cognition.embedding(&action.description).await,
            };
            let chat_poignancy = cognition.chat_poignancy(&bank.scratch, &action.description).await;
            let chat_id = bank.associative.add_chat(
                NodeDraft::new(
                    now,
                    action.event.clone().unwrap_or_else(|| percept.triple.clone()),
                    action.description.clone(),
                    chat_poignancy,
                    action.description.clone(),
                    chat_embedding,
                )
                .with_keywords(percept.keywords.clone())
                .with_transcript(bank.scratch.chat.transcript.clone()),
            );
            evidence.push(chat_id);
        }

        let id = bank.associative.add_event(
            NodeDraft::new(
                now,
                percept.triple.clone(),
                percept.description.clone(),
                poignancy,
                percept.embedding_text.clone(),
                embedding,
            )
            .with_keywords(percept.keywords.clone())
            .with_evidence(evidence),
        );
        bank.scratch.importance_trigger_curr -= i32::from(poignancy);
        bank.scratch.importance_ele_n += 1;
        added.push(id);
    }

    debug!(
        persona = bank.scratch.name(),
        attended = events.len(),
        remembered = added.len(),
        trigger = bank.scratch.importance_trigger_curr,
        "Perception complete"
    );
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_core::maze::TileEvent;
    use reverie_core::memory::{Action, NodeKind, Utterance};
    use reverie_core::types::Triple;

    use crate::cognition::RuleBasedCognition;
    use crate::testing::{at, cafe, isabella};

    const COUNTER: &str = "the Ville:Hobbs Cafe:cafe:behind the cafe counter";

    fn klaus_reading(maze: &mut Maze) {
        let triple = Triple::new("Klaus Mueller", "is", "reading");
        maze.add_event((3, 2), TileEvent::active(&triple, "reading a book"))
            .expect("event");
    }

    #[tokio::test]
    async fn scenes_within_retention_are_remembered_once() {
        let mut maze = cafe();
        klaus_reading(&mut maze);
        let mut bank = isabella();
        let cognition = RuleBasedCognition::new();

        let first = perceive(&mut bank, &maze, &cognition).await.expect("perceive");
        assert_eq!(first.len(), 3);
        let subjects: Vec<&str> = first
            .iter()
            .map(|id| bank.associative.node(*id).expect("node").subject.as_str())
            .collect();
        assert_eq!(subjects[0], "Klaus Mueller");
        assert!(subjects.contains(&COUNTER));

        bank.scratch.curr_time = Some(at(7, 1));
        let again = perceive(&mut bank, &maze, &cognition).await.expect("perceive");
        assert!(again.is_empty());
        assert_eq!(bank.associative.seq_event().count(), 3);
    }

    #[tokio::test]
    async fn idle_objects_weigh_one_and_counters_follow_poignancy() {
        let mut maze = cafe();
        klaus_reading(&mut maze);
        let mut bank = isabella();
        let cognition = RuleBasedCognition::new();
        let budget = bank.scratch.importance_trigger_curr;

        let ids = perceive(&mut bank, &maze, &cognition).await.expect("perceive");
        let mut total = 0;
        for id in &ids {
            let node = bank.associative.node(*id).expect("node");
            let expected = if node.object == "idle" { 1 } else { cognition.event_poignancy };
            assert_eq!(node.poignancy, expected, "{}", node.description);
            total += i32::from(node.poignancy);
        }
        assert_eq!(total, 5);
        assert_eq!(bank.scratch.importance_trigger_curr, budget - total);
        assert_eq!(bank.scratch.importance_ele_n, ids.len());

        let counter = bank
            .associative
            .seq_event()
            .find(|n| n.subject == COUNTER)
            .expect("counter");
        assert_eq!(counter.description, "behind the cafe counter is idle");
    }

    #[tokio::test]
    async fn own_conversation_is_kept_as_a_chat_with_its_transcript() {
        let mut maze = cafe();
        let mut bank = isabella();
        let chat = Triple::new("Isabella Rodriguez", CHAT_PREDICATE, "Klaus Mueller");
        bank.scratch.action = Action {
            address: Some("<persona> Klaus Mueller".into()),
            start_time: Some(at(7, 0)),
            duration: Some(2),
            description: "conversing about the party".into(),
            event: Some(chat.clone()),
            ..Action::default()
        };
        bank.scratch.chat.transcript = vec![
            Utterance::new("Isabella Rodriguez", "Hi Klaus! Are you coming on Tuesday?"),
            Utterance::new("Klaus Mueller", "Wouldn't miss it."),
        ];
        maze.add_event((2, 2), TileEvent::active(&chat, "conversing about the party"))
            .expect("event");
        let cognition = RuleBasedCognition::new();
        let budget = bank.scratch.importance_trigger_curr;

        let ids = perceive(&mut bank, &maze, &cognition).await.expect("perceive");
        let stored = bank.associative.seq_chat().next().expect("chat node");
        assert_eq!(stored.kind, NodeKind::Chat);
        assert_eq!(stored.transcript.len(), 2);
        assert_eq!(stored.poignancy, cognition.chat_poignancy);
        let chat_id = stored.node_id;
        assert_eq!(
            bank.associative.get_last_chat("klaus mueller").map(|n| n.node_id),
            Some(chat_id)
        );

        let event = bank
            .associative
            .node(ids[0])
            .expect("event");
        assert_eq!(event.predicate, CHAT_PREDICATE);
        assert_eq!(event.evidence, vec![chat_id]);
        assert!(!ids.contains(&chat_id));

        // The chat's own poignancy does not count towards reflection.
        assert_eq!(bank.scratch.importance_trigger_curr, budget - 3 - 1 - 1);
        assert_eq!(bank.scratch.importance_ele_n, 3);
    }

    #[tokio::test]
    async fn nothing_is_perceived_before_placement() {
        let maze = cafe();
        let mut bank = isabella();
        bank.scratch.curr_tile = None;
        let ids = perceive(&mut bank, &maze, &RuleBasedCognition::new()).await.expect("perceive");
        assert!(ids.is_empty());
        assert!(bank.spatial.sectors("the Ville").is_empty());
    }
}
