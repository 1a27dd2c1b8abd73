//! Wave-propagation shortest paths over the collision grid.
//!
//! The search labels cells with their distance layer from the start (the
//! start is layer 1), one layer per round, until the end is labelled. The
//! route is then read backwards from the end, always stepping to a
//! neighbour exactly one layer lower and trying up, left, down, right in
//! that order, so equal-length routes are resolved the same way every time.
//!
//! Callers speak `(x, y)`; the grid is indexed `[row][col]`, so coordinates
//! are swapped on the way in and on the way out.

use tracing::trace;

use crate::error::{ReverieError, Result};
use crate::types::Coord;

/// Expansion rounds before the search gives up.
pub const MAX_WAVE_ROUNDS: usize = 150;

/// Shortest path from `start` to `end`, both included, in `(x, y)` order.
///
/// `blocked[row][col]` marks impassable cells. The start cell is always
/// treated as reachable.
///
/// # Errors
///
/// Returns [`ReverieError::TileOutOfBounds`] if an endpoint lies outside the
/// grid, and [`ReverieError::NoPath`] if the wave dies out or runs for
/// [`MAX_WAVE_ROUNDS`] rounds without reaching `end`.
pub fn find_path(blocked: &[Vec<bool>], start: Coord, end: Coord) -> Result<Vec<Coord>> {
    let rows = blocked.len();
    let cols = blocked.first().map_or(0, Vec::len);
    for tile in [start, end] {
        if tile.0 >= cols || tile.1 >= rows {
            return Err(ReverieError::TileOutOfBounds {
                tile,
                width: cols,
                height: rows,
            });
        }
    }

    let (sr, sc) = (start.1, start.0);
    let (er, ec) = (end.1, end.0);

    let mut layer = vec![vec![0u32; cols]; rows];
    layer[sr][sc] = 1;
    let mut frontier = vec![(sr, sc)];
    let mut rounds = 0;

    while layer[er][ec] == 0 {
        if frontier.is_empty() || rounds == MAX_WAVE_ROUNDS {
            trace!(?start, ?end, rounds, "Wave exhausted");
            return Err(ReverieError::NoPath { start, end });
        }
        rounds += 1;
        let mut next = Vec::new();
        for &(r, c) in &frontier {
            let k = layer[r][c];
            for (nr, nc) in neighbours(r, c, rows, cols) {
                if layer[nr][nc] == 0 && !blocked[nr][nc] {
                    layer[nr][nc] = k + 1;
                    next.push((nr, nc));
                }
            }
        }
        frontier = next;
    }

    let (mut r, mut c) = (er, ec);
    let mut k = layer[r][c];
    let mut path = vec![(c, r)];
    while k > 1 {
        let step = neighbours(r, c, rows, cols)
            .into_iter()
            .find(|&(nr, nc)| layer[nr][nc] == k - 1);
        let Some((nr, nc)) = step else {
            return Err(ReverieError::NoPath { start, end });
        };
        r = nr;
        c = nc;
        k -= 1;
        path.push((c, r));
    }
    path.reverse();
    Ok(path)
}

/// In-bounds neighbours in priority order: up, left, down, right.
fn neighbours(r: usize, c: usize, rows: usize, cols: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(4);
    if r > 0 {
        out.push((r - 1, c));
    }
    if c > 0 {
        out.push((r, c - 1));
    }
    if r + 1 < rows {
        out.push((r + 1, c));
    }
    if c + 1 < cols {
        out.push((r, c + 1));
    }
    out
}
