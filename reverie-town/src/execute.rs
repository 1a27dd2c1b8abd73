//! Execution: turn the current action's address into the next tile.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use reverie_core::memory::Scratch;
use reverie_core::pathfinding::find_path;
use reverie_core::types::Coord;
use reverie_core::{Maze, ReverieError, Result};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::persona::Persona;
use crate::plan::action::RANDOM_OBJECT;

/// Most candidate tiles considered per address.
const MAX_CANDIDATES: usize = 4;

/// One persona's move for a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Tile to stand on next.
    pub next_tile: Coord,
    /// Emoji for the current action.
    pub pronunciatio: String,
    /// `"{description} @ {address}"`.
    pub description: String,
}

/// Compute (or continue) the path for the current action and take one
/// step along it.
///
/// `others` holds every persona except the one moving.
///
/// # Errors
///
/// [`ReverieError::NoPath`] if no candidate tile is reachable,
/// [`ReverieError::AddressNotFound`] for addresses the maze never
/// registered and [`ReverieError::UnknownPersona`] for a missing partner.
pub fn execute(
    scratch: &mut Scratch,
    maze: &Maze,
    others: &BTreeMap<String, Persona>,
    rng: &mut StdRng,
) -> Result<Execution> {
    let Some(curr) = scratch.curr_tile else {
        return Err(ReverieError::UnknownPersona(scratch.name().to_string()));
    };
    let address = scratch.action.address.clone().unwrap_or_default();

    if address.contains(RANDOM_OBJECT) && scratch.planned_path.is_empty() {
        scratch.path_set = false;
    }
    if !scratch.path_set && !address.is_empty() {
        let grid = maze.collision_grid();
        let targets = target_tiles(&address, curr, &grid, maze, others, rng)?;
        let path = closest_path(&grid, curr, &targets)?;
        trace!(persona = scratch.name(), address = %address, steps = path.len(), "Planned path");
        scratch.planned_path = path.into_iter().skip(1).collect();
        scratch.path_set = true;
    }

    let next_tile = if scratch.planned_path.is_empty() {
        curr
    } else {
        scratch.planned_path.remove(0)
    };
    Ok(Execution {
        next_tile,
        pronunciatio: scratch.action.pronunciatio.clone(),
        description: format!("{} @ {address}", scratch.action.description),
    })
}

fn target_tiles(
    address: &str,
    curr: Coord,
    grid: &[Vec<bool>],
    maze: &Maze,
    others: &BTreeMap<String, Persona>,
    rng: &mut StdRng,
) -> Result<Vec<Coord>> {
    if let Some(name) = address.strip_prefix("<persona>") {
        let name = name.trim();
        let partner = others
            .get(name)
            .and_then(|p| p.scratch().curr_tile)
            .ok_or_else(|| ReverieError::UnknownPersona(name.to_string()))?;
        return Ok(vec![meeting_point(grid, curr, partner)?]);
    }

    if let Some(rest) = address.strip_prefix("<waiting>") {
        let mut nums = rest.split_whitespace().filter_map(|n| n.parse::<usize>().ok());
        return match (nums.next(), nums.next()) {
            (Some(x), Some(y)) => Ok(vec![(x, y)]),
            _ => Err(ReverieError::AddressNotFound(address.to_string())),
        };
    }

    let mut candidates: Vec<Coord> = if address.contains(RANDOM_OBJECT) {
        let arena = address.rsplit_once(':').map_or(address, |(head, _)| head);
        let tiles: Vec<Coord> = maze.tiles_at(arena)?.iter().copied().collect();
        tiles.choose(rng).copied().into_iter().collect()
    } else {
        maze.tiles_at(address)?.iter().copied().collect()
    };
    candidates.shuffle(rng);
    candidates.truncate(MAX_CANDIDATES);

    let free: Vec<Coord> = candidates
        .iter()
        .copied()
        .filter(|tile| {
            maze.access_tile(*tile)
                .map(|t| !t.events.iter().any(|e| others.contains_key(&e.subject)))
                .unwrap_or(false)
        })
        .collect();
    Ok(if free.is_empty() { candidates } else { free })
}

/// Halfway along the path to a partner: the first tile for very short
/// paths, otherwise whichever of the two middle tiles is nearer.
fn meeting_point(grid: &[Vec<bool>], curr: Coord, partner: Coord) -> Result<Coord> {
    let path = find_path(grid, curr, partner)?;
    if path.len() <= 2 {
        return Ok(path[0]);
    }
    let mid = path.len() / 2;
    let near = path[mid];
    let Some(&far) = path.get(mid + 1) else {
        return Ok(near);
    };
    let to_near = find_path(grid, curr, near)?.len();
    let to_far = find_path(grid, curr, far)?.len();
    Ok(if to_near <= to_far { near } else { far })
}

/// Shortest path to any of `targets`; unreachable targets are skipped.
fn closest_path(grid: &[Vec<bool>], curr: Coord, targets: &[Coord]) -> Result<Vec<Coord>> {
    let mut best: Option<Vec<Coord>> = None;
    for target in targets {
        let Ok(path) = find_path(grid, curr, *target) else {
            continue;
        };
        if best.as_ref().is_none_or(|b| path.len() < b.len()) {
            best = Some(path);
        }
    }
    best.ok_or(ReverieError::NoPath {
        start: curr,
        end: targets.first().copied().unwrap_or(curr),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use reverie_core::maze::{Layer, MazeDefinition, TileEvent};
    use reverie_core::memory::{Action, Identity};
    use reverie_core::types::Triple;

    fn maze() -> Maze {
        let mut def = MazeDefinition::blank("the Ville", 12, 8, 32);
        def.paint(Layer::Sector, 0..12, 0..8, "Hobbs Cafe");
        def.paint(Layer::Arena, 0..12, 0..8, "cafe");
        def.paint(Layer::GameObject, 9..11, 1..2, "cafe counter");
        def.wall(5..6, 0..6);
        Maze::new(&def).expect("maze")
    }

    fn walker(address: &str) -> Scratch {
        let mut s = Scratch::new(Identity {
            name: "Isabella Rodriguez".into(),
            ..Identity::default()
        });
        s.curr_tile = Some((1, 1));
        s.action = Action {
            address: Some(address.into()),
            description: "serving coffee".into(),
            pronunciatio: "☕".into(),
            ..Action::default()
        };
        s
    }

    #[test]
    fn walks_one_step_per_tick_to_the_object() {
        let maze = maze();
        let mut scratch = walker("the Ville:Hobbs Cafe:cafe:cafe counter");
        let mut rng = StdRng::seed_from_u64(1);
        let first = execute(&mut scratch, &maze, &BTreeMap::new(), &mut rng).expect("execute");
        assert!(scratch.path_set);
        assert_eq!(first.description, "serving coffee @ the Ville:Hobbs Cafe:cafe:cafe counter");
        let dist = first.next_tile.0.abs_diff(1) + first.next_tile.1.abs_diff(1);
        assert_eq!(dist, 1);

        let mut last = first.next_tile;
        for _ in 0..40 {
            scratch.curr_tile = Some(last);
            last = execute(&mut scratch, &maze, &BTreeMap::new(), &mut rng)
                .expect("execute")
                .next_tile;
        }
        assert!(maze.tiles_at("the Ville:Hobbs Cafe:cafe:cafe counter").expect("tiles").contains(&last));
        assert!(scratch.planned_path.is_empty());
    }

    #[test]
    fn waiting_stays_put() {
        let maze = maze();
        let mut scratch = walker("<waiting> 1 1");
        let mut rng = StdRng::seed_from_u64(1);
        let step = execute(&mut scratch, &maze, &BTreeMap::new(), &mut rng).expect("execute");
        assert_eq!(step.next_tile, (1, 1));
    }

    #[test]
    fn occupied_tiles_are_avoided() {
        let mut maze = maze();
        let klaus = Persona::new(
            Identity {
                name: "Klaus Mueller".into(),
                ..Identity::default()
            },
            reverie_core::memory::PersonaParams::default(),
        );
        maze.add_event((9, 1), TileEvent::active(&Triple::new("Klaus Mueller", "is", "ordering"), "ordering"))
            .expect("event");
        let mut others = BTreeMap::new();
        others.insert("Klaus Mueller".to_string(), klaus);

        let mut scratch = walker("the Ville:Hobbs Cafe:cafe:cafe counter");
        let mut rng = StdRng::seed_from_u64(3);
        execute(&mut scratch, &maze, &others, &mut rng).expect("execute");
        assert_eq!(scratch.planned_path.last(), Some(&(10, 1)));
    }

    #[test]
    fn partner_address_meets_halfway() {
        let maze = maze();
        let mut klaus = Persona::new(
            Identity {
                name: "Klaus Mueller".into(),
                ..Identity::default()
            },
            reverie_core::memory::PersonaParams::default(),
        );
        klaus.bank.scratch.curr_tile = Some((1, 7));
        let mut others = BTreeMap::new();
        others.insert("Klaus Mueller".to_string(), klaus);

        let mut scratch = walker("<persona> Klaus Mueller");
        let mut rng = StdRng::seed_from_u64(3);
        execute(&mut scratch, &maze, &others, &mut rng).expect("execute");
        // path (1,1)..(1,7) has 7 tiles; the meeting point is its middle
        assert_eq!(scratch.planned_path.last(), Some(&(1, 4)));
    }

    #[test]
    fn unknown_address_is_structural() {
        let maze = maze();
        let mut scratch = walker("the Ville:Hobbs Cafe:kitchen");
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            execute(&mut scratch, &maze, &BTreeMap::new(), &mut rng),
            Err(ReverieError::AddressNotFound(_))
        ));
    }

    #[test]
    fn walled_in_targets_have_no_path() {
        let mut def = MazeDefinition::blank("the Ville", 6, 3, 32);
        def.paint(Layer::Sector, 0..6, 0..3, "Hobbs Cafe");
        def.paint(Layer::Arena, 4..6, 0..3, "pantry");
        def.wall(3..4, 0..3);
        let maze = Maze::new(&def).expect("maze");
        let mut scratch = walker("the Ville:Hobbs Cafe:pantry");
        scratch.curr_tile = Some((0, 0));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            execute(&mut scratch, &maze, &BTreeMap::new(), &mut rng),
            Err(ReverieError::NoPath { .. })
        ));
    }
}
