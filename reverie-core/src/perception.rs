//! Perception scan: the deterministic half of perceiving.
//!
//! Scanning merges everything within vision into spatial memory and picks
//! the events worth attending to. Scoring and committing those events
//! needs the Oracle and lives in `reverie-town`.

use tracing::trace;

use crate::error::Result;
use crate::maze::{Maze, TileEvent, TileLevel};
use crate::memory::SpatialMemory;
use crate::types::{tile_distance, Coord, Triple};

/// A tile event normalized into memory form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Percept {
    /// Normalized statement (idle subjects become `is idle`).
    pub triple: Triple,
    /// `"{subject name} is {description}"`.
    pub description: String,
    /// Last address segments of subject and object.
    pub keywords: Vec<String>,
    /// Text to embed: the description's parenthetical, if any.
    pub embedding_text: String,
}

impl Percept {
    /// Normalize a tile event.
    #[must_use]
    pub fn from_tile_event(event: &TileEvent) -> Self {
        let (triple, raw_desc) = match (&event.predicate, &event.object) {
            (Some(p), Some(o)) => (
                Triple::new(&event.subject, p, o),
                event.description.clone().unwrap_or_else(|| "idle".to_string()),
            ),
            _ => (Triple::idle(&event.subject), "idle".to_string()),
        };
        let description = format!("{} is {raw_desc}", last_segment(&triple.subject));
        let keywords = vec![
            last_segment(&triple.subject).to_string(),
            last_segment(&triple.object).to_string(),
        ];
        let embedding_text = embedding_text(&description);
        Self {
            triple,
            description,
            keywords,
            embedding_text,
        }
    }

    /// Whether the description marks an idle subject.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.description.contains("is idle")
    }
}

/// Last colon-separated segment of an address.
#[must_use]
pub fn last_segment(address: &str) -> &str {
    address.rsplit(':').next().unwrap_or(address)
}

/// The parenthetical content of a description, or the whole description.
#[must_use]
pub fn embedding_text(description: &str) -> String {
    match description.split_once('(') {
        Some((_, rest)) => rest.split(')').next().unwrap_or(rest).trim().to_string(),
        None => description.to_string(),
    }
}

/// Merge the labels of every tile within `radius` into `spatial` and
/// return those tiles.
///
/// # Errors
///
/// Returns [`crate::ReverieError::TileOutOfBounds`] if `center` is outside
/// the maze.
pub fn scan_space(
    maze: &Maze,
    spatial: &mut SpatialMemory,
    center: Coord,
    radius: usize,
) -> Result<Vec<Coord>> {
    maze.access_tile(center)?;
    let nearby = maze.nearby_tiles(center, radius);
    for tile in &nearby {
        let t = maze.access_tile(*tile)?;
        spatial.learn(
            &t.world,
            t.sector.as_deref(),
            t.arena.as_deref(),
            t.game_object.as_deref(),
        );
    }
    Ok(nearby)
}

/// Events on `nearby` tiles in the same arena as `center`, deduplicated,
/// closest first (ties keep scan order), at most `bandwidth`.
///
/// # Errors
///
/// Returns [`crate::ReverieError::TileOutOfBounds`] for tiles outside the
/// maze.
pub fn attend_events(
    maze: &Maze,
    center: Coord,
    nearby: &[Coord],
    bandwidth: usize,
) -> Result<Vec<TileEvent>> {
    let arena_path = maze.tile_path(center, TileLevel::Arena)?;
    let mut seen: Vec<(f64, &TileEvent)> = Vec::new();
    for tile in nearby {
        let t = maze.access_tile(*tile)?;
        if t.events.is_empty() || maze.tile_path(*tile, TileLevel::Arena)? != arena_path {
            continue;
        }
        let dist = tile_distance(center, *tile);
        for event in &t.events {
            if !seen.iter().any(|(_, e)| *e == event) {
                seen.push((dist, event));
            }
        }
    }
    seen.sort_by(|a, b| a.0.total_cmp(&b.0));
    seen.truncate(bandwidth);
    trace!(center = ?center, attended = seen.len(), "Attention selection");
    Ok(seen.into_iter().map(|(_, e)| e.clone()).collect())
}
