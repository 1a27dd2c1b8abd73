//! Daily schedules: ordered `(activity, minutes)` blocks covering one day.
//!
//! A closed schedule sums to exactly [`MINUTES_PER_DAY`]. Generation,
//! decomposition and reactive splicing all keep that property; any deficit
//! is padded with a trailing `sleeping` block.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::clock::MINUTES_PER_DAY;
use crate::error::{ReverieError, Result};

/// Activity used to pad a schedule up to a full day.
pub const FILLER_ACTIVITY: &str = "sleeping";

/// One scheduled block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleBlock {
    /// What the persona does, e.g. `having breakfast (eating toast)`.
    pub activity: String,
    /// Duration in minutes.
    pub minutes: u32,
}

impl ScheduleBlock {
    /// Create a block.
    #[must_use]
    pub fn new(activity: impl Into<String>, minutes: u32) -> Self {
        Self {
            activity: activity.into(),
            minutes,
        }
    }
}

/// Whether a block may be broken into subtasks.
///
/// Blocks shorter than an hour are never decomposed, and neither is sleep:
/// anything mentioning `sleeping`, `asleep` or `in bed`, or a sleep/bed
/// block longer than an hour.
#[must_use]
pub fn should_decompose(activity: &str, minutes: u32) -> bool {
    if minutes < 60 {
        return false;
    }
    if !activity.contains("sleep") && !activity.contains("bed") {
        return true;
    }
    if activity.contains("sleeping") || activity.contains("asleep") || activity.contains("in bed") {
        return false;
    }
    minutes <= 60
}

/// Fit proposed subtasks into `total` minutes.
///
/// Subtasks are kept while their running sum fits; the last kept subtask
/// absorbs whatever is left. Each block is named `"{task} ({subtask})"`.
/// With no usable subtask the task stays a single block.
#[must_use]
pub fn fit_decomposition(task: &str, total: u32, subtasks: &[(String, u32)]) -> Vec<ScheduleBlock> {
    let mut fitted: Vec<ScheduleBlock> = Vec::new();
    let mut used = 0u32;
    for (subtask, minutes) in subtasks {
        if *minutes == 0 {
            continue;
        }
        if used + minutes > total {
            break;
        }
        used += minutes;
        fitted.push(ScheduleBlock::new(format!("{task} ({subtask})"), *minutes));
    }
    match fitted.last_mut() {
        Some(last) => last.minutes += total - used,
        None => fitted.push(ScheduleBlock::new(task, total)),
    }
    fitted
}

/// Split an activity into its base and parenthetical detail:
/// `"having lunch (eating soup)"` gives `("having lunch", "eating soup")`.
/// Without a parenthesis both halves are the whole activity.
#[must_use]
pub fn split_detail(activity: &str) -> (&str, &str) {
    match activity.split_once('(') {
        Some((base, _)) => {
            let tail = activity.rsplit('(').next().unwrap_or(activity);
            (base.trim(), tail.strip_suffix(')').unwrap_or(tail))
        }
        None => (activity.trim(), activity),
    }
}

/// The stretch of a schedule a reaction rewrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceRegion {
    /// First block index in the full-day schedule.
    pub start_index: usize,
    /// One past the last block index.
    pub end_index: usize,
    /// Minute of day where `start_index` begins.
    pub start_minute: u32,
    /// Blocks currently occupying the region.
    pub original: Vec<ScheduleBlock>,
    /// Completed and in-progress part of the region followed by the
    /// inserted activity.
    pub truncated: Vec<ScheduleBlock>,
    /// Default rewrite: `truncated` then the original timeline resumed,
    /// clipped to the region length.
    pub proposal: Vec<ScheduleBlock>,
}

impl SpliceRegion {
    /// Region length in minutes.
    #[must_use]
    pub fn minutes(&self) -> u32 {
        self.original.iter().map(|b| b.minutes).sum()
    }

    /// Whether `blocks` can replace the region without breaking closure.
    #[must_use]
    pub fn accepts(&self, blocks: &[ScheduleBlock]) -> bool {
        !blocks.is_empty() && blocks.iter().map(|b| b.minutes).sum::<u32>() == self.minutes()
    }
}

/// A persona's schedule for one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySchedule {
    blocks: Vec<ScheduleBlock>,
}

impl DailySchedule {
    /// Empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing blocks.
    #[must_use]
    pub fn from_blocks(blocks: Vec<ScheduleBlock>) -> Self {
        Self { blocks }
    }

    /// Build from one activity per hour, merging consecutive repeats.
    #[must_use]
    pub fn from_hourly<S: AsRef<str>>(hourly: &[S]) -> Self {
        let mut blocks: Vec<ScheduleBlock> = Vec::new();
        for activity in hourly {
            let activity = activity.as_ref();
            match blocks.last_mut() {
                Some(last) if last.activity == activity => last.minutes += 60,
                _ => blocks.push(ScheduleBlock::new(activity, 60)),
            }
        }
        Self { blocks }
    }

    /// The blocks in order.
    #[must_use]
    pub fn blocks(&self) -> &[ScheduleBlock] {
        &self.blocks
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether there are no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ScheduleBlock> {
        self.blocks.get(index)
    }

    /// Sum of all durations.
    #[must_use]
    pub fn total_minutes(&self) -> u32 {
        self.blocks.iter().map(|b| b.minutes).sum()
    }

    /// Number of distinct activities.
    #[must_use]
    pub fn distinct_activities(&self) -> usize {
        let mut seen: Vec<&str> = self.blocks.iter().map(|b| b.activity.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    /// Append a trailing filler block if the day is not yet covered.
    pub fn pad_to_day(&mut self) {
        let total = self.total_minutes();
        if total < MINUTES_PER_DAY {
            self.blocks
                .push(ScheduleBlock::new(FILLER_ACTIVITY, MINUTES_PER_DAY - total));
        }
    }

    /// Index of the block running at `minute` of the day.
    ///
    /// Returns `len()` once the schedule is exhausted.
    #[must_use]
    pub fn index_at(&self, minute: u32) -> usize {
        let mut elapsed = 0;
        for (i, block) in self.blocks.iter().enumerate() {
            elapsed += block.minutes;
            if elapsed > minute {
                return i;
            }
        }
        self.blocks.len()
    }

    /// Minute of day at which block `index` starts.
    #[must_use]
    pub fn start_of(&self, index: usize) -> u32 {
        self.blocks.iter().take(index).map(|b| b.minutes).sum()
    }

    /// Replace block `index` with `replacement`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::EmptySchedule`] when `index` is past the end.
    pub fn replace_block(&mut self, index: usize, replacement: Vec<ScheduleBlock>) -> Result<()> {
        if index >= self.blocks.len() {
            return Err(ReverieError::EmptySchedule);
        }
        self.blocks.splice(index..=index, replacement);
        Ok(())
    }

    /// Work out the region a reaction at `now_minute` rewrites.
    ///
    /// The region spans the hourly-original block running now, extended by
    /// the following hourly block when the current one is shorter than two
    /// hours (or by two hours at the end of the day). Region boundaries are
    /// then snapped to this schedule's own block offsets.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::EmptySchedule`] if the hourly schedule is empty.
    pub fn plan_splice(
        &self,
        hourly: &DailySchedule,
        now_minute: u32,
        inserted: &str,
        inserted_minutes: u32,
    ) -> Result<SpliceRegion> {
        if hourly.is_empty() {
            return Err(ReverieError::EmptySchedule);
        }
        let hour_index = hourly.index_at(now_minute).min(hourly.len() - 1);
        let region_start = hourly.start_of(hour_index);
        let current = hourly.blocks[hour_index].minutes;
        let region_end = if current >= 120 {
            region_start + current
        } else if let Some(next) = hourly.blocks.get(hour_index + 1) {
            region_start + current + next.minutes
        } else {
            region_start + 120
        };

        let mut start_index = None;
        let mut end_index = None;
        let mut offset = 0;
        for (i, block) in self.blocks.iter().enumerate() {
            if start_index.is_none() && offset >= region_start {
                start_index = Some(i);
            }
            if end_index.is_none() && offset >= region_end {
                end_index = Some(i);
            }
            offset += block.minutes;
        }
        let start_index = start_index.unwrap_or(self.blocks.len());
        let end_index = end_index.unwrap_or(self.blocks.len()).max(start_index);
        let start_minute = self.start_of(start_index);
        let original = self.blocks[start_index..end_index].to_vec();
        let region_minutes: u32 = original.iter().map(|b| b.minutes).sum();
        let region_stop = start_minute + region_minutes;
        let now = now_minute.clamp(start_minute, region_stop);

        let mut truncated: Vec<ScheduleBlock> = Vec::new();
        let mut offset = start_minute;
        for block in &original {
            if offset >= now {
                break;
            }
            let ran = (now - offset).min(block.minutes);
            truncated.push(ScheduleBlock::new(block.activity.clone(), ran));
            offset += block.minutes;
        }

        let mut inserted_name = inserted.to_string();
        if let Some(last) = truncated.last_mut() {
            let (base, detail) = split_detail(&last.activity);
            let base = base.to_string();
            last.activity = format!("{base} (on the way to {detail})");
            inserted_name = format!("{base} ({inserted})");
        }
        truncated.push(ScheduleBlock::new(inserted_name, inserted_minutes));

        let mut proposal = truncated.clone();
        let resume = now + inserted_minutes;
        let mut offset = start_minute;
        for block in &original {
            let block_end = offset + block.minutes;
            if block_end > resume {
                let from = offset.max(resume);
                proposal.push(ScheduleBlock::new(block.activity.clone(), block_end - from));
            }
            offset = block_end;
        }
        clip_to(&mut proposal, region_minutes);

        Ok(SpliceRegion {
            start_index,
            end_index,
            start_minute,
            original,
            truncated,
            proposal,
        })
    }

    /// Replace the region with `blocks` and re-close the day.
    ///
    /// `blocks` that do not sum to the region length are rejected in favour
    /// of the region's default proposal.
    pub fn apply_splice(&mut self, region: &SpliceRegion, blocks: Option<Vec<ScheduleBlock>>) {
        let chosen = match blocks {
            Some(b) if region.accepts(&b) => b,
            _ => region.proposal.clone(),
        };
        let chosen: Vec<ScheduleBlock> = chosen.into_iter().filter(|b| b.minutes > 0).collect();
        let end = region.end_index.min(self.blocks.len());
        let start = region.start_index.min(end);
        self.blocks.splice(start..end, chosen);
        self.pad_to_day();
    }

    /// `HH:MM || activity` lines, one per block, stamped with the block's
    /// end time.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let mut elapsed = 0;
        for block in &self.blocks {
            elapsed += block.minutes;
            let _ = writeln!(out, "{:02}:{:02} || {}", elapsed / 60, elapsed % 60, block.activity);
        }
        out
    }
}

/// Trim trailing minutes so the blocks sum to at most `limit`, dropping
/// blocks that shrink to zero.
fn clip_to(blocks: &mut Vec<ScheduleBlock>, limit: u32) {
    let mut used = 0;
    let mut keep = Vec::with_capacity(blocks.len());
    for block in blocks.drain(..) {
        if used >= limit {
            break;
        }
        let minutes = block.minutes.min(limit - used);
        used += minutes;
        if minutes > 0 {
            keep.push(ScheduleBlock::new(block.activity, minutes));
        }
    }
    *blocks = keep;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> DailySchedule {
        let mut hourly = vec!["sleeping"; 7];
        hourly.extend(["waking up and completing the morning routine"; 1]);
        hourly.extend(["working at the cafe"; 4]);
        hourly.extend(["having lunch"; 1]);
        hourly.extend(["working at the cafe"; 5]);
        hourly.extend(["having dinner"; 1]);
        hourly.extend(["reading"; 2]);
        hourly.extend(["sleeping"; 3]);
        DailySchedule::from_hourly(&hourly)
    }

    #[test]
    fn hourly_runs_compress_to_minutes() {
        let d = day();
        assert_eq!(d.total_minutes(), MINUTES_PER_DAY);
        assert_eq!(d.blocks()[0], ScheduleBlock::new("sleeping", 420));
        assert_eq!(d.blocks()[2], ScheduleBlock::new("working at the cafe", 240));
        assert_eq!(d.distinct_activities(), 6);
    }

    #[test]
    fn index_at_walks_cumulative_durations() {
        let d = day();
        assert_eq!(d.index_at(0), 0);
        assert_eq!(d.index_at(419), 0);
        assert_eq!(d.index_at(420), 1);
        assert_eq!(d.index_at(MINUTES_PER_DAY), d.len());
        assert_eq!(d.start_of(2), 480);
    }

    #[test]
    fn padding_closes_the_day() {
        let mut d = DailySchedule::from_blocks(vec![ScheduleBlock::new("working", 600)]);
        d.pad_to_day();
        assert_eq!(d.total_minutes(), MINUTES_PER_DAY);
        assert_eq!(d.blocks()[1].activity, FILLER_ACTIVITY);
        d.pad_to_day();
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn details_come_from_the_parenthesis() {
        assert_eq!(split_detail("having lunch (eating soup)"), ("having lunch", "eating soup"));
        assert_eq!(
            split_detail("working on her painting (mixing paint)"),
            ("working on her painting", "mixing paint")
        );
        assert_eq!(split_detail("working"), ("working", "working"));
    }

    #[test]
    fn decomposition_rule_spares_sleep() {
        assert!(should_decompose("working at the cafe", 240));
        assert!(!should_decompose("working at the cafe", 30));
        assert!(!should_decompose("sleeping", 420));
        assert!(!should_decompose("getting ready for bed", 120));
        assert!(should_decompose("getting ready for bed", 60));
    }

    #[test]
    fn decomposition_fit_absorbs_remainder() {
        let subtasks = vec![
            ("grinding beans".to_string(), 20),
            ("brewing".to_string(), 15),
            ("serving".to_string(), 40),
        ];
        let fitted = fit_decomposition("opening the cafe", 60, &subtasks);
        assert_eq!(
            fitted,
            vec![
                ScheduleBlock::new("opening the cafe (grinding beans)", 20),
                ScheduleBlock::new("opening the cafe (brewing)", 40),
            ]
        );
        let fallback = fit_decomposition("opening the cafe", 60, &[("x".to_string(), 90)]);
        assert_eq!(fallback, vec![ScheduleBlock::new("opening the cafe", 60)]);
    }

    #[test]
    fn splice_truncates_annotates_and_resumes() {
        let mut d = day();
        let hourly = d.clone();
        // 09:30, in the middle of the four hour work block.
        let region = d
            .plan_splice(&hourly, 570, "chatting with Klaus", 10)
            .expect("region");
        assert_eq!(region.start_index, 2);
        assert_eq!(region.minutes(), 240);
        assert_eq!(
            region.truncated,
            vec![
                ScheduleBlock::new("working at the cafe (on the way to working at the cafe)", 90),
                ScheduleBlock::new("working at the cafe (chatting with Klaus)", 10),
            ]
        );
        assert_eq!(region.proposal.last(), Some(&ScheduleBlock::new("working at the cafe", 140)));
        d.apply_splice(&region, None);
        assert_eq!(d.total_minutes(), MINUTES_PER_DAY);
    }

    #[test]
    fn splice_rejects_proposals_with_wrong_length() {
        let mut d = day();
        let hourly = d.clone();
        let region = d.plan_splice(&hourly, 570, "waiting", 5).expect("region");
        d.apply_splice(&region, Some(vec![ScheduleBlock::new("nonsense", 3)]));
        assert_eq!(d.total_minutes(), MINUTES_PER_DAY);
        assert!(d.blocks().iter().all(|b| b.activity != "nonsense"));
    }

    #[test]
    fn summary_stamps_end_times() {
        let d = DailySchedule::from_blocks(vec![
            ScheduleBlock::new("sleeping", 420),
            ScheduleBlock::new("breakfast", 60),
        ]);
        assert_eq!(d.summary(), "07:00 || sleeping\n08:00 || breakfast\n");
    }
}
