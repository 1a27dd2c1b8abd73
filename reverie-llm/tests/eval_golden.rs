//! Prompt golden set: rendered cognition prompts for a known persona.
//!
//! ## Usage
//!
//! - **Offline:** `cargo test -p reverie-llm --test eval_golden` checks that
//!   templates render into well-formed prompts.
//! - **Online (requires Ollama):** set `REVERIE_EVAL_LLM=1` to send a few
//!   golden prompts through the Oracle and sanity-check the answers.

use reverie_llm::prompt::{self, PromptEngine, PromptId};
use reverie_llm::{LlmClient, Oracle, OutputFormat};
use serde_json::json;

/// A golden test case for prompt rendering.
struct GoldenCase {
    name: &'static str,
    id: PromptId,
    vars: Vec<(&'static str, &'static str)>,
    prompt_must_contain: Vec<&'static str>,
}

const ISABELLA: &str = "Name: Isabella Rodriguez\nAge: 34\nInnate traits: friendly, outgoing, hospitable\nCurrently: Isabella is planning a Valentine's Day party at Hobbs Cafe";

fn golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            name: "cafe_owner_wakes_early",
            id: PromptId::WakeUpHour,
            vars: vec![
                ("identity", ISABELLA),
                ("lifestyle", "Isabella goes to bed around 11pm and wakes up around 6am."),
                ("first_name", "Isabella"),
            ],
            prompt_must_contain: vec!["Isabella Rodriguez", "wakes up around 6am", "7am"],
        },
        GoldenCase {
            name: "hourly_slot_mentions_history",
            id: PromptId::HourlySchedule,
            vars: vec![
                ("identity", ISABELLA),
                ("hour_slots", "[Monday February 13 -- 00:00 AM] Activity: [Fill in]"),
                ("daily_plan", "wake up at 6am, open the cafe at 8am"),
                ("schedule_so_far", "00:00 AM: sleeping\n01:00 AM: sleeping"),
                ("first_name", "Isabella"),
                ("hour", "08:00 AM"),
            ],
            prompt_must_contain: vec!["open the cafe", "01:00 AM: sleeping", "08:00 AM"],
        },
        GoldenCase {
            name: "decomposition_states_total",
            id: PromptId::TaskDecomposition,
            vars: vec![
                ("identity", ISABELLA),
                ("date", "Monday February 13"),
                ("first_name", "Isabella"),
                ("surrounding", "08:00 ~ 12:00 -- working at the cafe"),
                ("task", "working at the cafe"),
                ("start", "08:00 AM"),
                ("end", "12:00 PM"),
                ("minutes", "240"),
            ],
            prompt_must_contain: vec!["240 minutes", "is working at the cafe from 08:00 AM to 12:00 PM"],
        },
        GoldenCase {
            name: "sector_options_listed",
            id: PromptId::ActionSector,
            vars: vec![
                ("name", "Isabella Rodriguez"),
                ("living_sector", "Isabella Rodriguez's apartment"),
                ("living_arenas", "main room"),
                ("current_sector", "Hobbs Cafe"),
                ("current_arenas", "cafe"),
                ("daily_plan", ""),
                ("sectors", "Hobbs Cafe, Johnson Park, Isabella Rodriguez's apartment"),
                ("activity", "working at the cafe"),
                ("detail", "serving coffee"),
            ],
            prompt_must_contain: vec!["Area options: Hobbs Cafe, Johnson Park", "For serving coffee"],
        },
        GoldenCase {
            name: "object_choice_lists_objects",
            id: PromptId::ActionObject,
            vars: vec![
                ("activity", "brewing coffee"),
                ("objects", "cafe customer seating, behind the cafe counter"),
            ],
            prompt_must_contain: vec!["behind the cafe counter", "brewing coffee"],
        },
        GoldenCase {
            name: "talk_decision_has_both_personas",
            id: PromptId::DecideToTalk,
            vars: vec![
                ("context", "Isabella and Klaus are regulars at the cafe."),
                ("time", "February 13, 2023, 10:30:00"),
                ("init_name", "Isabella Rodriguez"),
                ("init_activity", "serving coffee"),
                ("target_name", "Klaus Mueller"),
                ("target_activity", "reading a book"),
                ("last_chat", ""),
            ],
            prompt_must_contain: vec!["Isabella Rodriguez is serving coffee", "Klaus Mueller is reading a book", "yes or no"],
        },
        GoldenCase {
            name: "react_decision_offers_two_options",
            id: PromptId::DecideToReact,
            vars: vec![
                ("context", ""),
                ("time", "February 13, 2023, 07:00:00"),
                ("init_name", "Klaus"),
                ("init_activity", "heading to the bathroom"),
                ("target_name", "Maria"),
                ("target_activity", "showering"),
                ("location", "the shared bathroom"),
                ("init_detail", "using the bathroom"),
                ("target_detail", "showering"),
            ],
            prompt_must_contain: vec!["Option 1: Klaus waits", "Option 2", "the shared bathroom"],
        },
        GoldenCase {
            name: "utterance_includes_transcript",
            id: PromptId::Utterance,
            vars: vec![
                ("identity", ISABELLA),
                ("speaker", "Isabella Rodriguez"),
                ("listener", "Klaus Mueller"),
                ("memories", "- Klaus is writing a research paper"),
                ("relationship", "friendly regulars"),
                ("time", "10:30"),
                ("speaker_activity", "serving coffee"),
                ("listener_activity", "reading"),
                ("location", "Hobbs Cafe"),
                ("transcript", "Isabella Rodriguez: Hi Klaus!"),
            ],
            prompt_must_contain: vec!["Hi Klaus!", "research paper", "end the conversation"],
        },
        GoldenCase {
            name: "insights_ask_for_evidence",
            id: PromptId::Insights,
            vars: vec![
                ("name", "Klaus Mueller"),
                ("statements", "0. Klaus is reading\n1. Klaus is writing"),
                ("count", "5"),
            ],
            prompt_must_contain: vec!["What 5 high-level insights", "1. Klaus is writing"],
        },
        GoldenCase {
            name: "revision_keeps_window",
            id: PromptId::ScheduleRevision,
            vars: vec![
                ("identity", ISABELLA),
                ("name", "Isabella"),
                ("start", "10:00 AM"),
                ("end", "12:00 PM"),
                ("original", "10:00 ~ 12:00 -- working at the cafe"),
                ("inserted", "chatting with Klaus"),
                ("inserted_minutes", "10"),
                ("truncated", "10:00 ~ 10:30 -- working at the cafe"),
            ],
            prompt_must_contain: vec!["chatting with Klaus for 10 minutes", "end exactly at 12:00 PM"],
        },
    ]
}

// ---------------------------------------------------------------------------
// Offline Tests: Template Rendering Validation
// ---------------------------------------------------------------------------

#[test]
fn golden_prompts_render_without_unresolved_vars() {
    let engine = PromptEngine::builtin();
    for case in golden_cases() {
        let (system, user) = engine.render(case.id, &case.vars);
        assert!(!system.contains('{'), "case '{}': system prompt has placeholders", case.name);
        for needle in &case.prompt_must_contain {
            assert!(
                user.contains(needle),
                "Golden case '{}': rendered prompt must contain '{}'.\nRendered:\n{}",
                case.name,
                needle,
                &user[..user.len().min(500)]
            );
        }
        for (key, _) in &case.vars {
            assert!(
                !user.contains(&format!("{{{key}}}")),
                "Golden case '{}': placeholder '{{{key}}}' left unresolved",
                case.name
            );
        }
        assert!(
            !user.contains('{'),
            "Golden case '{}': template uses a variable the case does not set.\nRendered:\n{user}",
            case.name
        );
    }
}

#[test]
fn golden_set_has_minimum_coverage() {
    assert!(golden_cases().len() >= 10);
}

#[test]
fn every_builtin_template_is_nonempty() {
    let engine = PromptEngine::builtin();
    for id in PromptId::all() {
        let tpl = engine.get(*id).expect("builtin");
        assert!(!tpl.user.trim().is_empty(), "{id} has an empty user template");
        assert!(tpl.max_tokens > 0);
    }
    assert!(prompt::PERSONA_SYSTEM.contains("character"));
}

// ---------------------------------------------------------------------------
// Online Tests: opt-in, needs a running Ollama
// ---------------------------------------------------------------------------

#[tokio::test]
async fn online_pronunciatio_is_short() {
    if std::env::var("REVERIE_EVAL_LLM").is_err() {
        return;
    }
    let client = LlmClient::from_config(&reverie_core::config::LlmConfig::default()).expect("client");
    let oracle = Oracle::new(client, 3, 768);
    let request = PromptEngine::builtin().request(
        PromptId::Pronunciatio,
        &[("description", "brewing coffee behind the counter")],
        30_000,
    );
    let emoji = oracle
        .query(
            &request,
            &OutputFormat::json(json!("☕")),
            |o| !o.is_empty(),
            |o| o.chars().take(3).collect::<String>(),
            "🙂".to_string(),
        )
        .await;
    assert!(emoji.chars().count() <= 3);
}
