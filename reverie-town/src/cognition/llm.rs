//! Cognition answered by a language model through the Oracle.
//!
//! Each query renders its template, states the output contract and
//! validates the answer; anything unusable falls back to a fixed default.

use std::num::NonZeroUsize;

use chrono::{Duration, NaiveTime};
use lru::LruCache;
use parking_lot::Mutex;
use reverie_core::clock::{self, STEP_TIME_FORMAT};
use reverie_core::config::LlmConfig;
use reverie_core::memory::node::transcript_text;
use reverie_core::memory::{Scratch, SpatialMemory, Utterance};
use reverie_core::schedule::{split_detail, ScheduleBlock, SpliceRegion};
use reverie_core::types::{Embedding, Triple};
use reverie_core::{ReverieError, Result};
use reverie_llm::{LlmRequest, Oracle, OutputFormat, PromptEngine, PromptId, TextGenerator};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{Cognition, IdentityRevision, NextLine};

/// LLM-backed cognition with an embedding cache.
pub struct LlmCognition<G> {
    oracle: Oracle<G>,
    prompts: PromptEngine,
    timeout_ms: u64,
    embeddings: Mutex<LruCache<String, Embedding>>,
}

impl<G: TextGenerator> LlmCognition<G> {
    /// Wrap a generator using the `[llm]` config section.
    ///
    /// # Errors
    ///
    /// Returns `ReverieError::Config` if `prompt_dir` is set but cannot be
    /// loaded.
    pub fn new(generator: G, config: &LlmConfig) -> Result<Self> {
        let prompts = match &config.prompt_dir {
            Some(dir) => PromptEngine::with_overrides(dir).map_err(|e| ReverieError::Config(e.to_string()))?,
            None => PromptEngine::builtin(),
        };
        let capacity = NonZeroUsize::new(config.embedding_cache_size).unwrap_or(NonZeroUsize::MIN);
        info!(
            retry_budget = config.retry_budget,
            cache = capacity.get(),
            "LLM cognition ready"
        );
        Ok(Self {
            oracle: Oracle::new(generator, config.retry_budget, config.embedding_dimensions),
            prompts,
            timeout_ms: config.request_timeout_ms,
            embeddings: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// The underlying Oracle.
    #[must_use]
    pub fn oracle(&self) -> &Oracle<G> {
        &self.oracle
    }

    /// Embeddings currently cached.
    #[must_use]
    pub fn cached_embeddings(&self) -> usize {
        self.embeddings.lock().len()
    }

    fn request(&self, id: PromptId, vars: &[(&str, &str)]) -> LlmRequest {
        self.prompts.request(id, vars, self.timeout_ms)
    }

    async fn plain(&self, id: PromptId, vars: &[(&str, &str)], fail_safe: String) -> String {
        self.oracle
            .query(
                &self.request(id, vars),
                &OutputFormat::Plain,
                |o| !o.is_empty(),
                |o| o.trim_end_matches('.').trim().to_string(),
                fail_safe,
            )
            .await
    }

    async fn poignancy(&self, id: PromptId, scratch: &Scratch, description: &str) -> u8 {
        let identity = scratch.identity_summary();
        let request = self.request(
            id,
            &[
                ("identity", identity.as_str()),
                ("first_name", scratch.identity.first_name.as_str()),
                ("description", description),
            ],
        );
        self.oracle
            .query_with(&request, &OutputFormat::json(json!(5)), parse_poignancy, 4)
            .await
    }
}

// ---------------------------------------------------------------------------
// Output parsers
// ---------------------------------------------------------------------------

/// `7am`, `7:30 am`, `12am`, `1 pm` or a bare hour.
fn parse_hour(output: &str) -> Option<u32> {
    let lowered = output.trim().to_lowercase();
    let digits: String = lowered.chars().take_while(char::is_ascii_digit).collect();
    let hour: u32 = digits.parse().ok()?;
    let hour = if lowered.contains("pm") {
        if hour == 12 { 12 } else { hour + 12 }
    } else if lowered.contains("am") && hour == 12 {
        0
    } else {
        hour
    };
    (hour < 24).then_some(hour)
}

fn parse_poignancy(output: &str) -> Option<u8> {
    let value: f64 = output.trim().parse().ok()?;
    (1.0..=10.0).contains(&value).then(|| value.round() as u8)
}

fn parse_list(output: &str) -> Option<Vec<String>> {
    let items: Vec<String> = serde_json::from_str(output).ok()?;
    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!items.is_empty()).then_some(items)
}

fn parse_pairs(output: &str) -> Option<Vec<(String, u32)>> {
    let pairs: Vec<(String, u32)> = serde_json::from_str(output).ok()?;
    (!pairs.is_empty()).then_some(pairs)
}

/// Case-insensitive match against a fixed option list, returning the
/// option's own spelling.
fn pick_option<'a>(output: &str, options: &[&'a str]) -> Option<&'a str> {
    let wanted = output.trim().trim_end_matches('.').trim();
    options.iter().copied().find(|o| o.eq_ignore_ascii_case(wanted))
}

#[derive(Deserialize)]
struct UtteranceOutput {
    utterance: String,
    #[serde(default)]
    end: bool,
}

#[derive(Deserialize)]
struct InsightOutput {
    insight: String,
    #[serde(default)]
    evidence: Vec<usize>,
}

/// Clock label for a minute of day.
fn minute_label(minute: u32) -> String {
    NaiveTime::from_num_seconds_from_midnight_opt((minute % clock::MINUTES_PER_DAY) * 60, 0)
        .map(|t| t.format("%I:%M %p").to_string())
        .unwrap_or_default()
}

fn block_lines(blocks: &[ScheduleBlock], start_minute: u32) -> String {
    let mut offset = start_minute;
    let mut lines = Vec::with_capacity(blocks.len());
    for block in blocks {
        let end = offset + block.minutes;
        lines.push(format!(
            "{} ~ {} -- {}",
            minute_label(offset),
            minute_label(end),
            block.activity
        ));
        offset = end;
    }
    lines.join("\n")
}

fn now_label(scratch: &Scratch) -> String {
    scratch
        .curr_time
        .map(|t| t.format(STEP_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn date_of(scratch: &Scratch) -> String {
    scratch.curr_time.map(clock::date_label).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Cognition
// ---------------------------------------------------------------------------

impl<G: TextGenerator> Cognition for LlmCognition<G> {
    async fn wake_up_hour(&self, scratch: &Scratch) -> u32 {
        let identity = scratch.identity_summary();
        let request = self.request(
            PromptId::WakeUpHour,
            &[
                ("identity", identity.as_str()),
                ("lifestyle", scratch.identity.lifestyle.as_str()),
                ("first_name", scratch.identity.first_name.as_str()),
            ],
        );
        self.oracle.query_with(&request, &OutputFormat::Plain, parse_hour, 8).await
    }

    async fn daily_plan(&self, scratch: &Scratch, wake_up_hour: u32) -> Vec<String> {
        let identity = scratch.identity_summary();
        let date = date_of(scratch);
        let wake = wake_up_hour.to_string();
        let request = self.request(
            PromptId::DailyPlan,
            &[
                ("identity", identity.as_str()),
                ("lifestyle", scratch.identity.lifestyle.as_str()),
                ("date", date.as_str()),
                ("first_name", scratch.identity.first_name.as_str()),
                ("wake_up_hour", wake.as_str()),
            ],
        );
        let routine = format!("wake up and complete the morning routine at {wake_up_hour}:00 am");
        let format = OutputFormat::json(json!(["eat breakfast at 7:00 am", "go to work at 8:00 am"]));
        let mut plan = self
            .oracle
            .query_with(&request, &format, parse_list, vec!["have lunch at 12:00 pm".to_string(), "go to bed at 11:00 pm".to_string()])
            .await;
        plan.insert(0, routine);
        plan
    }

    async fn hourly_activity(&self, scratch: &Scratch, hour: u32, so_far: &[String]) -> String {
        let identity = scratch.identity_summary();
        let date = date_of(scratch);
        let hour_slots = (0..24)
            .map(|h| format!("[{date} -- {}] Activity: [Fill in]", clock::hour_slot_label(h)))
            .collect::<Vec<_>>()
            .join("\n");
        let schedule_so_far = so_far
            .iter()
            .enumerate()
            .map(|(h, a)| format!("{}: {a}", clock::hour_slot_label(h as u32)))
            .collect::<Vec<_>>()
            .join("\n");
        let daily_plan = scratch.daily_req.join(", ");
        let hour_label = clock::hour_slot_label(hour);
        self.plain(
            PromptId::HourlySchedule,
            &[
                ("identity", identity.as_str()),
                ("hour_slots", hour_slots.as_str()),
                ("daily_plan", daily_plan.as_str()),
                ("schedule_so_far", schedule_so_far.as_str()),
                ("first_name", scratch.identity.first_name.as_str()),
                ("hour", hour_label.as_str()),
            ],
            "relaxing".to_string(),
        )
        .await
    }

    async fn task_decomposition(
        &self,
        scratch: &Scratch,
        task: &str,
        start_minute: u32,
        minutes: u32,
    ) -> Vec<(String, u32)> {
        let identity = scratch.identity_summary();
        let date = date_of(scratch);
        let surrounding = scratch.daily_schedule_summary();
        let start = minute_label(start_minute);
        let end = minute_label(start_minute + minutes);
        let total = minutes.to_string();
        let request = self.request(
            PromptId::TaskDecomposition,
            &[
                ("identity", identity.as_str()),
                ("date", date.as_str()),
                ("first_name", scratch.identity.first_name.as_str()),
                ("surrounding", surrounding.as_str()),
                ("task", task),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("minutes", total.as_str()),
            ],
        );
        let format = OutputFormat::Json {
            example: json!([["brushing teeth", 5], ["making coffee", 10]]),
            instruction: "Each item is [subtask, minutes].".into(),
        };
        self.oracle.query_with(&request, &format, parse_pairs, Vec::new()).await
    }

    async fn action_sector(&self, scratch: &Scratch, spatial: &SpatialMemory, world: &str, activity: &str) -> String {
        let living: Vec<&str> = scratch.identity.living_area.split(':').collect();
        let living_sector = living.get(1).copied().unwrap_or_default();
        let living_arenas = spatial.accessible_arenas(&format!("{world}:{living_sector}"));
        let current_sector = scratch
            .action
            .address
            .as_deref()
            .and_then(|a| a.split(':').nth(1))
            .unwrap_or(living_sector)
            .to_string();
        let current_arenas = spatial.accessible_arenas(&format!("{world}:{current_sector}"));
        let sectors = spatial.sectors(world);
        let sector_list = sectors.join(", ");
        let (base, detail) = split_detail(activity);
        let request = self.request(
            PromptId::ActionSector,
            &[
                ("name", scratch.name()),
                ("living_sector", living_sector),
                ("living_arenas", living_arenas.as_str()),
                ("current_sector", current_sector.as_str()),
                ("current_arenas", current_arenas.as_str()),
                ("daily_plan", scratch.identity.daily_plan_req.as_str()),
                ("sectors", sector_list.as_str()),
                ("activity", base),
                ("detail", detail),
            ],
        );
        let fail_safe = if sectors.contains(&living_sector) || sectors.is_empty() {
            living_sector.to_string()
        } else {
            sectors[0].to_string()
        };
        self.oracle
            .query_with(
                &request,
                &OutputFormat::json(json!(sectors.first().copied().unwrap_or("Hobbs Cafe"))),
                |o| pick_option(o, &sectors).map(str::to_string),
                fail_safe,
            )
            .await
    }

    async fn action_arena(
        &self,
        scratch: &Scratch,
        spatial: &SpatialMemory,
        sector_address: &str,
        activity: &str,
    ) -> String {
        let mut parts = sector_address.splitn(2, ':');
        let world = parts.next().unwrap_or_default();
        let sector = parts.next().unwrap_or_default();
        let arenas = spatial.arenas(world, sector);
        let arena_list = arenas.join(", ");
        let (base, detail) = split_detail(activity);
        let request = self.request(
            PromptId::ActionArena,
            &[
                ("name", scratch.name()),
                ("sector", sector),
                ("arenas", arena_list.as_str()),
                ("activity", base),
                ("detail", detail),
            ],
        );
        let fail_safe = arenas.first().copied().unwrap_or_default().to_string();
        self.oracle
            .query_with(
                &request,
                &OutputFormat::json(json!(arenas.first().copied().unwrap_or("cafe"))),
                |o| pick_option(o, &arenas).map(str::to_string),
                fail_safe,
            )
            .await
    }

    async fn action_object(&self, activity: &str, objects: &[&str]) -> String {
        let object_list = objects.join(", ");
        let request = self.request(
            PromptId::ActionObject,
            &[("activity", activity), ("objects", object_list.as_str())],
        );
        let fail_safe = objects.first().copied().unwrap_or_default().to_string();
        self.oracle
            .query_with(
                &request,
                &OutputFormat::json(json!(objects.first().copied().unwrap_or("bed"))),
                |o| pick_option(o, objects).map(str::to_string),
                fail_safe,
            )
            .await
    }

    async fn pronunciatio(&self, description: &str) -> String {
        let request = self.request(PromptId::Pronunciatio, &[("description", description)]);
        self.oracle
            .query(
                &request,
                &OutputFormat::json(json!("🧈🍞")),
                |o| !o.is_empty(),
                |o| o.chars().take(3).collect(),
                "🙂".to_string(),
            )
            .await
    }

    async fn event_triple(&self, subject: &str, description: &str) -> Triple {
        let request = self.request(
            PromptId::EventTriple,
            &[("subject", subject), ("description", description)],
        );
        let format = OutputFormat::Json {
            example: json!(["is", "eating breakfast"]),
            instruction: "Give [predicate, object].".into(),
        };
        self.oracle
            .query_with(
                &request,
                &format,
                |o| match parse_list(o)?.as_slice() {
                    [p, obj] => Some(Triple::new(subject, p.as_str(), obj.as_str())),
                    _ => None,
                },
                Triple::new(subject, "is", description),
            )
            .await
    }

    async fn object_state(&self, scratch: &Scratch, object: &str, activity: &str) -> String {
        self.plain(
            PromptId::ObjectState,
            &[("name", scratch.name()), ("object", object), ("activity", activity)],
            "idle".to_string(),
        )
        .await
    }

    async fn event_poignancy(&self, scratch: &Scratch, description: &str) -> u8 {
        self.poignancy(PromptId::EventPoignancy, scratch, description).await
    }

    async fn chat_poignancy(&self, scratch: &Scratch, description: &str) -> u8 {
        self.poignancy(PromptId::ChatPoignancy, scratch, description).await
    }

    async fn decide_to_talk(&self, init: &Scratch, target: &Scratch, context: &str) -> bool {
        let time = now_label(init);
        let request = self.request(
            PromptId::DecideToTalk,
            &[
                ("context", context),
                ("time", time.as_str()),
                ("init_name", init.name()),
                ("init_activity", init.action.description.as_str()),
                ("target_name", target.name()),
                ("target_activity", target.action.description.as_str()),
                ("last_chat", ""),
            ],
        );
        self.oracle
            .query(
                &request,
                &OutputFormat::json(json!("yes")),
                |o| matches!(o.to_lowercase().as_str(), "yes" | "no"),
                |o| o.eq_ignore_ascii_case("yes"),
                false,
            )
            .await
    }

    async fn decide_to_react(&self, init: &Scratch, target: &Scratch, context: &str) -> bool {
        let time = now_label(init);
        let location = init.action.address.clone().unwrap_or_default();
        let (_, init_detail) = split_detail(&init.action.description);
        let (_, target_detail) = split_detail(&target.action.description);
        let request = self.request(
            PromptId::DecideToReact,
            &[
                ("context", context),
                ("time", time.as_str()),
                ("init_name", init.name()),
                ("init_activity", init.action.description.as_str()),
                ("target_name", target.name()),
                ("target_activity", target.action.description.as_str()),
                ("location", location.as_str()),
                ("init_detail", init_detail),
                ("target_detail", target_detail),
            ],
        );
        self.oracle
            .query(
                &request,
                &OutputFormat::json(json!("2")),
                |o| matches!(o.trim(), "1" | "2"),
                |o| o.trim() == "1",
                false,
            )
            .await
    }

    async fn relationship_summary(&self, init: &Scratch, target: &Scratch, statements: &str) -> String {
        self.plain(
            PromptId::RelationshipSummary,
            &[
                ("statements", statements),
                ("init_name", init.name()),
                ("target_name", target.name()),
            ],
            format!("{} and {} know each other", init.name(), target.name()),
        )
        .await
    }

    async fn utterance(
        &self,
        speaker: &Scratch,
        listener: &Scratch,
        relationship: &str,
        memories: &str,
        transcript: &[Utterance],
    ) -> NextLine {
        let identity = speaker.identity_summary();
        let time = now_label(speaker);
        let location = speaker.action.address.clone().unwrap_or_default();
        let lines = if transcript.is_empty() {
            "[The conversation has not started yet -- start it!]".to_string()
        } else {
            transcript_text(transcript)
        };
        let request = self.request(
            PromptId::Utterance,
            &[
                ("identity", identity.as_str()),
                ("speaker", speaker.name()),
                ("listener", listener.name()),
                ("memories", memories),
                ("relationship", relationship),
                ("time", time.as_str()),
                ("speaker_activity", speaker.action.description.as_str()),
                ("listener_activity", listener.action.description.as_str()),
                ("location", location.as_str()),
                ("transcript", lines.as_str()),
            ],
        );
        let format = OutputFormat::json(json!({ "utterance": "Hi, how are you?", "end": false }));
        self.oracle
            .query_with(
                &request,
                &format,
                |o| {
                    let parsed: UtteranceOutput = serde_json::from_str(o).ok()?;
                    let text = parsed.utterance.trim().to_string();
                    (!text.is_empty()).then_some(NextLine {
                        text,
                        ends_conversation: parsed.end,
                    })
                },
                NextLine {
                    text: "...".to_string(),
                    ends_conversation: true,
                },
            )
            .await
    }

    async fn conversation_summary(&self, _scratch: &Scratch, transcript: &[Utterance]) -> String {
        let lines = transcript_text(transcript);
        let topic = self
            .plain(
                PromptId::ConversationSummary,
                &[("transcript", lines.as_str())],
                "the day".to_string(),
            )
            .await;
        let topic = topic
            .strip_prefix("This is a conversation about")
            .unwrap_or(&topic)
            .trim();
        format!("conversing about {topic}")
    }

    async fn focal_points(&self, scratch: &Scratch, statements: &str, count: usize) -> Vec<String> {
        let n = count.to_string();
        let request = self.request(
            PromptId::FocalPoints,
            &[("statements", statements), ("count", n.as_str())],
        );
        let format = OutputFormat::json(json!(["What is Klaus Mueller working on?"]));
        let mut points = self.oracle.query_with(&request, &format, parse_list, Vec::new()).await;
        points.truncate(count);
        debug!(persona = scratch.name(), points = points.len(), "Focal points");
        points
    }

    async fn insights(&self, scratch: &Scratch, statements: &str, count: usize) -> Vec<(String, Vec<usize>)> {
        let n = count.to_string();
        let request = self.request(
            PromptId::Insights,
            &[("name", scratch.name()), ("statements", statements), ("count", n.as_str())],
        );
        let format = OutputFormat::json(json!([
            { "insight": "Klaus Mueller is dedicated to his research", "evidence": [0, 2] }
        ]));
        let mut insights = self
            .oracle
            .query_with(
                &request,
                &format,
                |o| {
                    let parsed: Vec<InsightOutput> = serde_json::from_str(o).ok()?;
                    let parsed: Vec<(String, Vec<usize>)> = parsed
                        .into_iter()
                        .filter(|i| !i.insight.trim().is_empty())
                        .map(|i| (i.insight.trim().to_string(), i.evidence))
                        .collect();
                    (!parsed.is_empty()).then_some(parsed)
                },
                Vec::new(),
            )
            .await;
        insights.truncate(count);
        insights
    }

    async fn planning_thought(&self, scratch: &Scratch, transcript: &[Utterance]) -> String {
        let lines = transcript_text(transcript);
        self.plain(
            PromptId::PlanningThought,
            &[("transcript", lines.as_str()), ("name", scratch.name())],
            String::new(),
        )
        .await
    }

    async fn conversation_memo(&self, scratch: &Scratch, transcript: &[Utterance]) -> String {
        let lines = transcript_text(transcript);
        let memo = self
            .plain(
                PromptId::ConversationMemo,
                &[("transcript", lines.as_str()), ("name", scratch.name())],
                String::new(),
            )
            .await;
        memo.strip_prefix(scratch.name()).unwrap_or(&memo).trim().to_string()
    }

    async fn revise_identity(&self, scratch: &Scratch, statements: &str) -> IdentityRevision {
        let date = date_of(scratch);
        let yesterday = scratch
            .curr_time
            .map(|t| clock::date_label(t - Duration::days(1)))
            .unwrap_or_default();
        let name = scratch.name();

        let plan_note = self
            .plain(
                PromptId::IdentityPlanNote,
                &[("statements", statements), ("name", name), ("date", date.as_str())],
                String::new(),
            )
            .await;
        let thought_note = self
            .plain(
                PromptId::IdentityThoughtNote,
                &[("statements", statements), ("name", name)],
                String::new(),
            )
            .await;
        let notes = format!("{plan_note} {thought_note}").trim().to_string();

        let currently = self
            .plain(
                PromptId::IdentityCurrently,
                &[
                    ("name", name),
                    ("yesterday", yesterday.as_str()),
                    ("currently", scratch.identity.currently.as_str()),
                    ("notes", notes.as_str()),
                    ("date", date.as_str()),
                ],
                scratch.identity.currently.clone(),
            )
            .await;

        let mut revised = scratch.clone();
        revised.identity.currently.clone_from(&currently);
        let identity = revised.identity_summary();
        let daily_plan_req = self
            .plain(
                PromptId::IdentityDailyPlan,
                &[("identity", identity.as_str()), ("name", name), ("date", date.as_str())],
                scratch.identity.daily_plan_req.clone(),
            )
            .await;

        IdentityRevision {
            notes,
            currently,
            daily_plan_req,
        }
    }

    async fn revise_schedule(
        &self,
        scratch: &Scratch,
        region: &SpliceRegion,
        inserted: &str,
        inserted_minutes: u32,
    ) -> Option<Vec<ScheduleBlock>> {
        let identity = scratch.identity_summary();
        let start = minute_label(region.start_minute);
        let end = minute_label(region.start_minute + region.minutes());
        let original = block_lines(&region.original, region.start_minute);
        let truncated = block_lines(&region.truncated, region.start_minute);
        let inserted_total = inserted_minutes.to_string();
        let request = self.request(
            PromptId::ScheduleRevision,
            &[
                ("identity", identity.as_str()),
                ("name", scratch.name()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("original", original.as_str()),
                ("inserted", inserted),
                ("inserted_minutes", inserted_total.as_str()),
                ("truncated", truncated.as_str()),
            ],
        );
        let format = OutputFormat::Json {
            example: json!([["working at the cafe", 30], ["chatting with Klaus", 10]]),
            instruction: "Each item is [activity, minutes].".into(),
        };
        self.oracle
            .query_with(
                &request,
                &format,
                |o| {
                    let blocks: Vec<ScheduleBlock> = parse_pairs(o)?
                        .into_iter()
                        .map(|(activity, minutes)| ScheduleBlock::new(activity, minutes))
                        .collect();
                    region.accepts(&blocks).then_some(Some(blocks))
                },
                None,
            )
            .await
    }

    async fn embedding(&self, text: &str) -> Embedding {
        if let Some(hit) = self.embeddings.lock().get(text) {
            return hit.clone();
        }
        let embedding = self.oracle.embed(text).await;
        if embedding.norm() > 0.0 {
            self.embeddings.lock().put(text.to_string(), embedding.clone());
        }
        embedding
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use chrono::NaiveDate;
    use reverie_core::memory::Identity;
    use reverie_llm::{LlmError, LlmResponse};

    use super::*;

    /// Replays canned completions in order and counts embedding calls.
    struct Scripted {
        replies: StdMutex<VecDeque<String>>,
        embeds: StdMutex<u32>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: StdMutex::new(replies.iter().map(|s| (*s).to_string()).collect()),
                embeds: StdMutex::new(0),
            }
        }
    }

    impl TextGenerator for Scripted {
        async fn generate(&self, _request: &LlmRequest) -> std::result::Result<LlmResponse, LlmError> {
            let text = self
                .replies
                .lock()
                .expect("lock")
                .pop_front()
                .ok_or_else(|| LlmError::RequestFailed("script exhausted".into()))?;
            Ok(LlmResponse {
                text,
                tokens_generated: 1,
                latency_ms: 1,
                model: "scripted".into(),
            })
        }

        async fn embed(&self, text: &str) -> std::result::Result<Embedding, LlmError> {
            *self.embeds.lock().expect("lock") += 1;
            Ok(Embedding(vec![text.len() as f32, 1.0]))
        }
    }

    fn cognition(replies: &[&str]) -> LlmCognition<Scripted> {
        let config = LlmConfig {
            retry_budget: 3,
            embedding_dimensions: 2,
            ..LlmConfig::default()
        };
        LlmCognition::new(Scripted::new(replies), &config).expect("cognition")
    }

    fn isabella() -> Scratch {
        let mut scratch = Scratch::new(Identity {
            name: "Isabella Rodriguez".into(),
            first_name: "Isabella".into(),
            living_area: "the Ville:Isabella Rodriguez's apartment:main room".into(),
            ..Identity::default()
        });
        scratch.curr_time = NaiveDate::from_ymd_opt(2023, 2, 13).and_then(|d| d.and_hms_opt(9, 0, 0));
        scratch
    }

    #[test]
    fn hour_parsing() {
        assert_eq!(parse_hour("7am"), Some(7));
        assert_eq!(parse_hour("7:30 am"), Some(7));
        assert_eq!(parse_hour("12am"), Some(0));
        assert_eq!(parse_hour("12 pm"), Some(12));
        assert_eq!(parse_hour("1pm"), Some(13));
        assert_eq!(parse_hour("25"), None);
        assert_eq!(parse_hour("early"), None);
    }

    #[test]
    fn option_matching_keeps_canonical_spelling() {
        let options = ["Hobbs Cafe", "Johnson Park"];
        assert_eq!(pick_option(" hobbs cafe. ", &options), Some("Hobbs Cafe"));
        assert_eq!(pick_option("the library", &options), None);
    }

    #[test]
    fn minute_labels() {
        assert_eq!(minute_label(0), "12:00 AM");
        assert_eq!(minute_label(13 * 60 + 5), "01:05 PM");
    }

    #[tokio::test]
    async fn wake_up_hour_retries_then_parses() {
        let c = cognition(&["around dawn", "6am"]);
        assert_eq!(c.wake_up_hour(&isabella()).await, 6);
    }

    #[tokio::test]
    async fn daily_plan_starts_with_the_morning_routine() {
        let c = cognition(&["{\"output\": [\"open Hobbs Cafe at 8:00 am\", \"have dinner at 6:00 pm\"]}"]);
        let plan = c.daily_plan(&isabella(), 6).await;
        assert_eq!(plan[0], "wake up and complete the morning routine at 6:00 am");
        assert_eq!(plan[1], "open Hobbs Cafe at 8:00 am");
        assert_eq!(plan.len(), 3);
    }

    #[tokio::test]
    async fn sector_must_be_a_known_option() {
        let mut spatial = SpatialMemory::new();
        spatial.learn("the Ville", Some("Hobbs Cafe"), Some("cafe"), None);
        spatial.learn("the Ville", Some("Isabella Rodriguez's apartment"), Some("main room"), None);
        let c = cognition(&[
            "{\"output\": \"the moon\"}",
            "{\"output\": \"hobbs cafe\"}",
        ]);
        let sector = c
            .action_sector(&isabella(), &spatial, "the Ville", "working (brewing coffee)")
            .await;
        assert_eq!(sector, "Hobbs Cafe");

        let exhausted = cognition(&[]);
        let sector = exhausted
            .action_sector(&isabella(), &spatial, "the Ville", "working")
            .await;
        assert_eq!(sector, "Isabella Rodriguez's apartment");
    }

    #[tokio::test]
    async fn triples_fall_back_to_is_description() {
        let c = cognition(&["{\"output\": [\"brews\", \"coffee\"]}"]);
        assert_eq!(
            c.event_triple("Isabella Rodriguez", "brewing coffee").await,
            Triple::new("Isabella Rodriguez", "brews", "coffee")
        );
        let c = cognition(&["{\"output\": [\"only one\"]}"]);
        assert_eq!(
            c.event_triple("bed", "being slept in").await,
            Triple::new("bed", "is", "being slept in")
        );
    }

    #[tokio::test]
    async fn poignancy_is_bounded() {
        let c = cognition(&["{\"output\": 42}", "{\"output\": \"7\"}"]);
        assert_eq!(c.event_poignancy(&isabella(), "a fire at the cafe").await, 7);
        let c = cognition(&[]);
        assert_eq!(c.chat_poignancy(&isabella(), "small talk").await, 4);
    }

    #[tokio::test]
    async fn utterance_parses_end_flag() {
        let c = cognition(&["{\"output\": {\"utterance\": \"See you at the party!\", \"end\": true}}"]);
        let line = c
            .utterance(&isabella(), &isabella(), "friends", "", &[])
            .await;
        assert_eq!(line.text, "See you at the party!");
        assert!(line.ends_conversation);
    }

    #[tokio::test]
    async fn schedule_revision_must_fit_region() {
        let region = SpliceRegion {
            start_index: 0,
            end_index: 1,
            start_minute: 600,
            original: vec![ScheduleBlock::new("working", 60)],
            truncated: vec![ScheduleBlock::new("working", 20)],
            proposal: vec![ScheduleBlock::new("working", 60)],
        };
        let c = cognition(&[
            "{\"output\": [[\"working\", 20], [\"chatting\", 10]]}",
            "{\"output\": [[\"working\", 20], [\"chatting\", 10], [\"working\", 30]]}",
        ]);
        let blocks = c.revise_schedule(&isabella(), &region, "chatting", 10).await;
        assert_eq!(blocks.map(|b| b.len()), Some(3));
    }

    #[tokio::test]
    async fn embeddings_are_cached() {
        let c = cognition(&[]);
        let a = c.embedding("brewing coffee").await;
        let b = c.embedding("brewing coffee").await;
        assert_eq!(a, b);
        assert_eq!(*c.oracle().generator().embeds.lock().expect("lock"), 1);
        assert_eq!(c.cached_embeddings(), 1);
    }

    #[tokio::test]
    async fn conversation_summary_is_prefixed() {
        let c = cognition(&["This is a conversation about the Valentine's Day party."]);
        let summary = c.conversation_summary(&isabella(), &[Utterance::new("A", "hi")]).await;
        assert_eq!(summary, "conversing about the Valentine's Day party");
    }
}
