use std::fmt;
use std::str::FromStr;

use crate::grid::{Grid, Pos};

/// A legal swap and what it would clear on its first batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move {
    pub from: Pos,
    pub to: Pos,
    /// Tiles matched at either swapped position right after the swap.
    pub tiles: usize,
    /// Lowest row (largest index) among those tiles.
    pub lowest_row: usize,
}

/// Lists every legal move on `grid`.
///
/// A move is legal when swapping two adjacent tiles produces a match at
/// either of the two positions. Each pair is listed once, with `from` being
/// the upper or left tile; moves come in row-major order of `from`, the
/// right neighbour before the lower one.
///
/// # Arguments
/// * `grid`: the board to inspect. It is not modified.
///
/// # Returns
/// All legal moves, or an empty vector when the board is stuck.
pub fn valid_moves(grid: &Grid) -> Vec<Move> {
    let mut moves = Vec::new();
    let mut scratch = grid.clone();
    let size = grid.size();

    for from in grid.positions() {
        let neighbours = [
            Pos::new(from.row, from.col + 1),
            Pos::new(from.row + 1, from.col),
        ];
        for to in neighbours {
            if to.row >= size || to.col >= size {
                continue;
            }
            if grid.get(from).is_none() || grid.get(to).is_none() || grid.get(from) == grid.get(to)
            {
                // Swapping equal colors changes nothing.
                continue;
            }

            scratch.swap(from, to);
            let mut matched = scratch.matches_at(from);
            matched.extend(scratch.matches_at(to));
            scratch.swap(from, to);

            if let Some(lowest_row) = matched.iter().map(|pos| pos.row).max() {
                moves.push(Move {
                    from,
                    to,
                    tiles: matched.len(),
                    lowest_row,
                });
            }
        }
    }
    moves
}

/// Chooses a move based on the Maximize Immediate Score (MIS) strategy.
///
/// Picks the move clearing the most tiles on its first batch, which is the
/// move with the best guaranteed score. Ties go to the earliest move.
pub fn choose_move_mis(grid: &Grid) -> Option<Move> {
    let mut best: Option<Move> = None;
    for candidate in valid_moves(grid) {
        if best.map_or(true, |b| candidate.tiles > b.tiles) {
            best = Some(candidate);
        }
    }
    best
}

/// Chooses a move based on the Lowest Match (LOW) strategy.
///
/// Matches near the bottom shift more of the board when they clear, which
/// gives refill more chances to chain. Ties go to the larger match, then to
/// the earliest move.
pub fn choose_move_low(grid: &Grid) -> Option<Move> {
    let mut best: Option<Move> = None;
    for candidate in valid_moves(grid) {
        let better = match best {
            None => true,
            Some(b) => (candidate.lowest_row, candidate.tiles) > (b.lowest_row, b.tiles),
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// Chooses the first legal move in scan order.
pub fn choose_move_first(grid: &Grid) -> Option<Move> {
    valid_moves(grid).into_iter().next()
}

/// Named move selection strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    Mis,
    Low,
    First,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Mis, Strategy::Low, Strategy::First];

    pub fn choose(self, grid: &Grid) -> Option<Move> {
        match self {
            Strategy::Mis => choose_move_mis(grid),
            Strategy::Low => choose_move_low(grid),
            Strategy::First => choose_move_first(grid),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Mis => "MIS",
            Strategy::Low => "LOW",
            Strategy::First => "FIRST",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown strategy '{}', expected MIS, LOW or FIRST", s))
    }
}
