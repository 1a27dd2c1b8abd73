//! The tile world.
//!
//! A [`Maze`] is built once from a [`MazeDefinition`] (grid size plus five
//! aligned id layers and their labels). Tile labels and the address index
//! never change afterwards; only the per-tile event sets are mutated as
//! personas move and act.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ReverieError, Result};
use crate::types::{tile_distance, Coord, Triple};

// ---------------------------------------------------------------------------
// Tile events
// ---------------------------------------------------------------------------

/// Activity observable on a tile.
///
/// A missing predicate marks an idle subject: personas and objects that are
/// present but doing nothing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileEvent {
    /// Persona name or object address.
    pub subject: String,
    /// Relation, `None` when idle.
    pub predicate: Option<String>,
    /// Object, `None` when idle.
    pub object: Option<String>,
    /// Description, `None` when idle.
    pub description: Option<String>,
}

impl TileEvent {
    /// An idle marker for `subject`.
    #[must_use]
    pub fn idle(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            predicate: None,
            object: None,
            description: None,
        }
    }

    /// An active event.
    #[must_use]
    pub fn active(triple: &Triple, description: impl Into<String>) -> Self {
        Self {
            subject: triple.subject.clone(),
            predicate: Some(triple.predicate.clone()),
            object: Some(triple.object.clone()),
            description: Some(description.into()),
        }
    }

    /// Whether this is an idle marker.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.predicate.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tiles
// ---------------------------------------------------------------------------

/// Depth of a location label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileLevel {
    /// `world`
    World,
    /// `world:sector`
    Sector,
    /// `world:sector:arena`
    Arena,
    /// `world:sector:arena:object`
    GameObject,
}

/// One grid cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// World label.
    pub world: String,
    /// Sector label.
    pub sector: Option<String>,
    /// Arena label.
    pub arena: Option<String>,
    /// Game object label.
    pub game_object: Option<String>,
    /// Spawn location label.
    pub spawning_location: Option<String>,
    /// Whether the tile blocks movement.
    pub collision: bool,
    /// Activity currently on this tile.
    pub events: BTreeSet<TileEvent>,
}

// ---------------------------------------------------------------------------
// World definition
// ---------------------------------------------------------------------------

/// Label layers of a world definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Sector ids.
    Sector,
    /// Arena ids.
    Arena,
    /// Game object ids.
    GameObject,
    /// Spawn location ids.
    SpawningLocation,
}

/// Raw world data: five flat row-major id layers (0 means unlabelled) and
/// the id → label table of each labelled layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MazeDefinition {
    /// Name used as the first address segment.
    pub world_name: String,
    /// Width in tiles.
    pub width: usize,
    /// Height in tiles.
    pub height: usize,
    /// Tile edge in pixels.
    pub tile_size: u32,
    /// Non-zero blocks movement.
    pub collision: Vec<u32>,
    /// Sector ids.
    pub sector: Vec<u32>,
    /// Arena ids.
    pub arena: Vec<u32>,
    /// Game object ids.
    pub game_object: Vec<u32>,
    /// Spawn location ids.
    pub spawning_location: Vec<u32>,
    /// Sector labels.
    #[serde(default)]
    pub sector_labels: HashMap<u32, String>,
    /// Arena labels.
    #[serde(default)]
    pub arena_labels: HashMap<u32, String>,
    /// Game object labels.
    #[serde(default)]
    pub game_object_labels: HashMap<u32, String>,
    /// Spawn location labels.
    #[serde(default)]
    pub spawning_labels: HashMap<u32, String>,
}

impl MazeDefinition {
    /// An open, unlabelled world.
    #[must_use]
    pub fn blank(world_name: impl Into<String>, width: usize, height: usize, tile_size: u32) -> Self {
        let cells = width * height;
        Self {
            world_name: world_name.into(),
            width,
            height,
            tile_size,
            collision: vec![0; cells],
            sector: vec![0; cells],
            arena: vec![0; cells],
            game_object: vec![0; cells],
            spawning_location: vec![0; cells],
            ..Self::default()
        }
    }

    /// Load a JSON world definition.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Io`] if the file cannot be read and
    /// [`ReverieError::Serialization`] if it is not a valid definition.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&raw).map_err(|e| ReverieError::Serialization(e.to_string()))
    }

    /// Label the rectangle `xs × ys` on `layer`, reusing the id of an
    /// existing identical label.
    pub fn paint(&mut self, layer: Layer, xs: Range<usize>, ys: Range<usize>, label: &str) {
        let (ids, labels) = match layer {
            Layer::Sector => (&mut self.sector, &mut self.sector_labels),
            Layer::Arena => (&mut self.arena, &mut self.arena_labels),
            Layer::GameObject => (&mut self.game_object, &mut self.game_object_labels),
            Layer::SpawningLocation => (&mut self.spawning_location, &mut self.spawning_labels),
        };
        let id = match labels.iter().find(|(_, l)| l.as_str() == label) {
            Some((id, _)) => *id,
            None => {
                let next = labels.keys().max().copied().unwrap_or(0) + 1;
                labels.insert(next, label.to_string());
                next
            }
        };
        for y in ys.start..ys.end.min(self.height) {
            for x in xs.start..xs.end.min(self.width) {
                ids[y * self.width + x] = id;
            }
        }
    }

    /// Mark the rectangle `xs × ys` as impassable.
    pub fn wall(&mut self, xs: Range<usize>, ys: Range<usize>) {
        for y in ys.start..ys.end.min(self.height) {
            for x in xs.start..xs.end.min(self.width) {
                self.collision[y * self.width + x] = 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Maze
// ---------------------------------------------------------------------------

/// The shared world grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maze {
    world_name: String,
    width: usize,
    height: usize,
    tile_size: u32,
    /// Row-major: `tiles[y][x]`.
    tiles: Vec<Vec<Tile>>,
    address_index: HashMap<String, BTreeSet<Coord>>,
}

impl Maze {
    /// Build the grid, seed idle markers on game objects and index every
    /// address.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Config`] when a layer does not have exactly
    /// `width * height` entries.
    pub fn new(def: &MazeDefinition) -> Result<Self> {
        let cells = def.width * def.height;
        for (name, layer) in [
            ("collision", &def.collision),
            ("sector", &def.sector),
            ("arena", &def.arena),
            ("game_object", &def.game_object),
            ("spawning_location", &def.spawning_location),
        ] {
            if layer.len() != cells {
                return Err(ReverieError::Config(format!(
                    "layer '{name}' has {} cells, expected {cells}",
                    layer.len()
                )));
            }
        }

        let label = |labels: &HashMap<u32, String>, id: u32| -> Option<String> {
            if id == 0 { None } else { labels.get(&id).cloned() }
        };

        let mut tiles = Vec::with_capacity(def.height);
        let mut address_index: HashMap<String, BTreeSet<Coord>> = HashMap::new();
        for y in 0..def.height {
            let mut row = Vec::with_capacity(def.width);
            for x in 0..def.width {
                let i = y * def.width + x;
                let mut tile = Tile {
                    world: def.world_name.clone(),
                    sector: label(&def.sector_labels, def.sector[i]),
                    arena: label(&def.arena_labels, def.arena[i]),
                    game_object: label(&def.game_object_labels, def.game_object[i]),
                    spawning_location: label(&def.spawning_labels, def.spawning_location[i]),
                    collision: def.collision[i] != 0,
                    events: BTreeSet::new(),
                };

                if let Some(sector) = &tile.sector {
                    let mut address = format!("{}:{sector}", tile.world);
                    address_index.entry(address.clone()).or_default().insert((x, y));
                    if let Some(arena) = &tile.arena {
                        address = format!("{address}:{arena}");
                        address_index.entry(address.clone()).or_default().insert((x, y));
                        if let Some(object) = &tile.game_object {
                            address = format!("{address}:{object}");
                            address_index.entry(address.clone()).or_default().insert((x, y));
                            tile.events.insert(TileEvent::idle(address));
                        }
                    }
                }
                if let Some(spawn) = &tile.spawning_location {
                    address_index
                        .entry(format!("<spawn_loc>{spawn}"))
                        .or_default()
                        .insert((x, y));
                }
                row.push(tile);
            }
            tiles.push(row);
        }

        info!(
            world = %def.world_name,
            width = def.width,
            height = def.height,
            addresses = address_index.len(),
            "Maze loaded"
        );

        Ok(Self {
            world_name: def.world_name.clone(),
            width: def.width,
            height: def.height,
            tile_size: def.tile_size,
            tiles,
            address_index,
        })
    }

    /// World name.
    #[must_use]
    pub fn world_name(&self) -> &str {
        &self.world_name
    }

    /// Width in tiles.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in tiles.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Tile edge in pixels.
    #[must_use]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    fn check(&self, tile: Coord) -> Result<()> {
        if tile.0 >= self.width || tile.1 >= self.height {
            return Err(ReverieError::TileOutOfBounds {
                tile,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// The tile at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::TileOutOfBounds`] outside the grid.
    pub fn access_tile(&self, tile: Coord) -> Result<&Tile> {
        self.check(tile)?;
        Ok(&self.tiles[tile.1][tile.0])
    }

    fn tile_mut(&mut self, tile: Coord) -> Result<&mut Tile> {
        self.check(tile)?;
        Ok(&mut self.tiles[tile.1][tile.0])
    }

    /// Whether `(x, y)` blocks movement. Out-of-bounds tiles block.
    #[must_use]
    pub fn is_blocked(&self, tile: Coord) -> bool {
        self.access_tile(tile).map_or(true, |t| t.collision)
    }

    /// Collision layer in `[row][col]` order, as the pathfinder reads it.
    #[must_use]
    pub fn collision_grid(&self) -> Vec<Vec<bool>> {
        self.tiles
            .iter()
            .map(|row| row.iter().map(|t| t.collision).collect())
            .collect()
    }

    /// Colon-joined address of a tile down to `level`. Missing labels
    /// leave an empty segment.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::TileOutOfBounds`] outside the grid.
    pub fn tile_path(&self, tile: Coord, level: TileLevel) -> Result<String> {
        let t = self.access_tile(tile)?;
        let mut path = t.world.clone();
        let segments = [
            (TileLevel::Sector, &t.sector),
            (TileLevel::Arena, &t.arena),
            (TileLevel::GameObject, &t.game_object),
        ];
        if level == TileLevel::World {
            return Ok(path);
        }
        for (seg_level, label) in segments {
            path.push(':');
            path.push_str(label.as_deref().unwrap_or_default());
            if seg_level == level {
                break;
            }
        }
        Ok(path)
    }

    /// In-bounds tiles within Euclidean `radius` of `center` (inclusive),
    /// row-major.
    #[must_use]
    pub fn nearby_tiles(&self, center: Coord, radius: usize) -> Vec<Coord> {
        let x0 = center.0.saturating_sub(radius);
        let y0 = center.1.saturating_sub(radius);
        let x1 = (center.0 + radius).min(self.width.saturating_sub(1));
        let y1 = (center.1 + radius).min(self.height.saturating_sub(1));
        let limit = radius as f64;
        let mut out = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                if tile_distance(center, (x, y)) <= limit {
                    out.push((x, y));
                }
            }
        }
        out
    }

    /// Tiles registered under `address`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::AddressNotFound`] for addresses the world
    /// never registered.
    pub fn tiles_at(&self, address: &str) -> Result<&BTreeSet<Coord>> {
        self.address_index
            .get(address)
            .ok_or_else(|| ReverieError::AddressNotFound(address.to_string()))
    }

    /// Whether `address` is registered.
    #[must_use]
    pub fn has_address(&self, address: &str) -> bool {
        self.address_index.contains_key(address)
    }

    /// Add an event to a tile.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::TileOutOfBounds`] outside the grid.
    pub fn add_event(&mut self, tile: Coord, event: TileEvent) -> Result<()> {
        self.tile_mut(tile)?.events.insert(event);
        Ok(())
    }

    /// Remove one event from a tile.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::TileOutOfBounds`] outside the grid.
    pub fn remove_event(&mut self, tile: Coord, event: &TileEvent) -> Result<()> {
        self.tile_mut(tile)?.events.remove(event);
        Ok(())
    }

    /// Remove every event whose subject is `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::TileOutOfBounds`] outside the grid.
    pub fn remove_subject_events(&mut self, tile: Coord, subject: &str) -> Result<()> {
        self.tile_mut(tile)?.events.retain(|e| e.subject != subject);
        Ok(())
    }

    /// Replace `subject`'s events on a tile with its idle marker.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::TileOutOfBounds`] outside the grid.
    pub fn turn_event_idle(&mut self, tile: Coord, subject: &str) -> Result<()> {
        let events = &mut self.tile_mut(tile)?.events;
        let before = events.len();
        events.retain(|e| e.subject != subject);
        if events.len() != before {
            events.insert(TileEvent::idle(subject));
            debug!(tile = ?tile, subject, "Tile event turned idle");
        }
        Ok(())
    }
}

/// Convert a pixel position to the tile containing it.
#[must_use]
pub fn turn_coordinate_to_tile(px: (f64, f64), tile_size: u32) -> Coord {
    let size = f64::from(tile_size.max(1));
    ((px.0 / size).ceil() as usize, (px.1 / size).ceil() as usize)
}
