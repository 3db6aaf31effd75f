//! The tile grid and its primitive operations.
//!
//! This module defines:
//! - `Pos`: a (row, column) coordinate; row 0 is the top of the board.
//! - `Grid`: an N×N matrix of optional colors with adjacency, match detection,
//!   swapping, removal, gravity, refill and the construction-time repair pass.
//! - `Fall` / `Spawn`: the movement records a host needs to diff two grid
//!   states into animations.
//!
//! The grid never validates moves or keeps score; that is the job of the
//! resolver and the engine.
use log::{debug, warn};
use std::collections::BTreeSet;
use std::fmt;

use crate::palette::{Color, Palette, TileSource};

/// Minimum run length that counts as a match.
pub const MATCH_MIN: usize = 3;

/// Grid size of the reference configuration.
pub const DEFAULT_GRID_SIZE: usize = 8;

/// Upper bound on full passes of `Grid::repair_no_matches`.
pub const REPAIR_PASS_CAP: usize = 100;

/// A cell coordinate. Row 0 is the top row, column 0 the leftmost column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Pos { row, col }
    }

    /// Manhattan distance between two positions.
    pub fn distance(self, other: Pos) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A set of matched positions, ordered row-major so iteration is stable.
pub type MatchSet = BTreeSet<Pos>;

/// A surviving tile that moved down during `Grid::apply_gravity`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fall {
    pub col: usize,
    pub from_row: usize,
    pub to_row: usize,
    pub color: Color,
}

/// A new tile created by `Grid::refill`.
///
/// `entry_offset` is how many cell heights above the top edge the tile
/// enters from: 1 for the lowest new tile of a column, 2 for the one above
/// it, and so on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Spawn {
    pub col: usize,
    pub row: usize,
    pub entry_offset: usize,
    pub color: Color,
}

/// Outcome of `Grid::repair_no_matches`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepairReport {
    /// Full passes executed, including the final clean pass when settled.
    pub passes: usize,
    /// Cells recolored over all passes.
    pub recolored: usize,
    /// `false` when the pass cap ran out with matches left on the grid.
    pub settled: bool,
}

/// An N×N board of tile colors.
///
/// Cells are stored row-major. A cell is `None` only between `remove` and
/// `refill`; at rest every cell is occupied.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Grid {
    size: usize,
    cells: Vec<Option<Color>>,
}

impl Grid {
    /// Creates a grid of `size`×`size` empty cells.
    ///
    /// # Examples
    /// ```
    /// use match3_engine::grid::{Grid, Pos};
    /// let grid = Grid::new_empty(8);
    /// assert_eq!(grid.get(Pos::new(0, 0)), None);
    /// assert!(!grid.is_full());
    /// ```
    pub fn new_empty(size: usize) -> Self {
        Grid {
            size,
            cells: vec![None; size * size],
        }
    }

    /// Creates a fully occupied grid with colors drawn from `source`.
    ///
    /// The result may contain matches; call `repair_no_matches` to remove
    /// them before play.
    pub fn new_random(size: usize, palette: &Palette, source: &mut dyn TileSource) -> Self {
        let mut grid = Grid::new_empty(size);
        for cell in grid.cells.iter_mut() {
            *cell = Some(source.next_color(palette));
        }
        grid
    }

    /// Creates a grid from rows of optional colors.
    ///
    /// # Returns
    /// `None` if `rows` is not square.
    pub fn from_rows(rows: Vec<Vec<Option<Color>>>) -> Option<Self> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return None;
        }
        Some(Grid {
            size,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    /// Width and height of the grid.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.row < self.size && pos.col < self.size
    }

    fn idx(&self, pos: Pos) -> usize {
        pos.row * self.size + pos.col
    }

    /// Returns the color at `pos`, or `None` for an empty or out-of-bounds cell.
    pub fn get(&self, pos: Pos) -> Option<Color> {
        if self.contains(pos) {
            self.cells[self.idx(pos)]
        } else {
            None
        }
    }

    /// Sets the cell at `pos`.
    ///
    /// # Panics
    /// Panics if `pos` is outside the grid.
    pub fn set(&mut self, pos: Pos, color: Option<Color>) {
        let i = self.idx(pos);
        self.cells[i] = color;
    }

    /// True when no cell is empty.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Pos> {
        let size = self.size;
        (0..size).flat_map(move |row| (0..size).map(move |col| Pos::new(row, col)))
    }

    /// True iff `a` and `b` are orthogonal neighbours (Manhattan distance 1).
    ///
    /// Diagonal cells are never adjacent.
    ///
    /// # Examples
    /// ```
    /// use match3_engine::grid::{Grid, Pos};
    /// assert!(Grid::adjacent(Pos::new(2, 3), Pos::new(2, 4)));
    /// assert!(!Grid::adjacent(Pos::new(2, 3), Pos::new(3, 4)));
    /// assert!(!Grid::adjacent(Pos::new(2, 3), Pos::new(2, 3)));
    /// ```
    pub fn adjacent(a: Pos, b: Pos) -> bool {
        a.distance(b) == 1
    }

    /// Exchanges the contents of two cells. No validation is performed.
    ///
    /// # Panics
    /// Panics if either position is outside the grid.
    pub fn swap(&mut self, a: Pos, b: Pos) {
        let (ia, ib) = (self.idx(a), self.idx(b));
        self.cells.swap(ia, ib);
    }

    /// Finds the match through `pos`.
    ///
    /// The maximal horizontal run and the maximal vertical run of the color at
    /// `pos` are measured independently. If either of them is at least
    /// `MATCH_MIN` long, the union of *both* runs is returned, so a tile at the
    /// corner of an L, the stem of a T or the centre of a + contributes both
    /// arms. A vertical run of two attached to a horizontal run of three is
    /// therefore included as well.
    ///
    /// # Returns
    /// The matched positions, or an empty set when neither run qualifies or
    /// the cell is empty.
    pub fn matches_at(&self, pos: Pos) -> MatchSet {
        let mut matches = MatchSet::new();
        let Some(color) = self.get(pos) else {
            return matches;
        };
        matches.insert(pos);

        // Horizontal run: walk left, then right.
        let mut left = pos.col;
        while left > 0 && self.get(Pos::new(pos.row, left - 1)) == Some(color) {
            left -= 1;
            matches.insert(Pos::new(pos.row, left));
        }
        let mut right = pos.col;
        while right + 1 < self.size && self.get(Pos::new(pos.row, right + 1)) == Some(color) {
            right += 1;
            matches.insert(Pos::new(pos.row, right));
        }

        // Vertical run: walk up, then down.
        let mut up = pos.row;
        while up > 0 && self.get(Pos::new(up - 1, pos.col)) == Some(color) {
            up -= 1;
            matches.insert(Pos::new(up, pos.col));
        }
        let mut down = pos.row;
        while down + 1 < self.size && self.get(Pos::new(down + 1, pos.col)) == Some(color) {
            down += 1;
            matches.insert(Pos::new(down, pos.col));
        }

        let horizontal = right - left + 1;
        let vertical = down - up + 1;
        if horizontal >= MATCH_MIN || vertical >= MATCH_MIN {
            matches
        } else {
            MatchSet::new()
        }
    }

    /// Union of `matches_at` over every occupied cell.
    pub fn all_matches(&self) -> MatchSet {
        let mut all = MatchSet::new();
        for pos in self.positions() {
            if self.get(pos).is_some() {
                all.extend(self.matches_at(pos));
            }
        }
        all
    }

    /// Empties every cell in `tiles`.
    pub fn remove<'a>(&mut self, tiles: impl IntoIterator<Item = &'a Pos>) {
        for &pos in tiles {
            self.set(pos, None);
        }
    }

    /// Compacts every column downward, keeping the relative order of tiles.
    ///
    /// Higher row indices are lower on screen, so tiles move towards
    /// `size - 1`. Columns are processed left to right and each column bottom
    /// to top.
    ///
    /// # Returns
    /// One `Fall` per tile that changed row.
    pub fn apply_gravity(&mut self) -> Vec<Fall> {
        let mut falls = Vec::new();
        for col in 0..self.size {
            // Number of holes seen so far below the current row.
            let mut empty = 0;
            for row in (0..self.size).rev() {
                let pos = Pos::new(row, col);
                match self.get(pos) {
                    None => empty += 1,
                    Some(color) if empty > 0 => {
                        let to_row = row + empty;
                        self.set(Pos::new(to_row, col), Some(color));
                        self.set(pos, None);
                        falls.push(Fall {
                            col,
                            from_row: row,
                            to_row,
                            color,
                        });
                    }
                    Some(_) => {}
                }
            }
        }
        falls
    }

    /// Fills every empty cell with a fresh tile from `source`.
    ///
    /// Colors are unconstrained: matches introduced by refill are what drive
    /// cascades. Expects gravity to have been applied, so that the empty cells
    /// of each column sit at its top. New tiles of a column are generated
    /// from the lowest empty cell upwards.
    ///
    /// # Returns
    /// One `Spawn` per created tile.
    pub fn refill(&mut self, palette: &Palette, source: &mut dyn TileSource) -> Vec<Spawn> {
        let mut spawns = Vec::new();
        for col in 0..self.size {
            let empty_rows: Vec<usize> = (0..self.size)
                .rev()
                .filter(|&row| self.get(Pos::new(row, col)).is_none())
                .collect();
            for (i, row) in empty_rows.into_iter().enumerate() {
                let color = source.next_color(palette);
                self.set(Pos::new(row, col), Some(color));
                spawns.push(Spawn {
                    col,
                    row,
                    entry_offset: i + 1,
                    color,
                });
            }
        }
        spawns
    }

    /// Colors present among the four direct neighbours of `pos`.
    fn neighbour_colors(&self, pos: Pos) -> Vec<Color> {
        let mut colors = Vec::with_capacity(4);
        let candidates = [
            pos.col.checked_sub(1).map(|c| Pos::new(pos.row, c)),
            Some(Pos::new(pos.row, pos.col + 1)),
            pos.row.checked_sub(1).map(|r| Pos::new(r, pos.col)),
            Some(Pos::new(pos.row + 1, pos.col)),
        ];
        for neighbour in candidates.into_iter().flatten() {
            if let Some(color) = self.get(neighbour) {
                if !colors.contains(&color) {
                    colors.push(color);
                }
            }
        }
        colors
    }

    /// Recolors cells until the grid holds no matches.
    ///
    /// Each pass walks the grid row-major; every cell that is part of a match
    /// gets a color none of its four neighbours has (any color if the
    /// neighbours already use the whole palette). Passes repeat until one
    /// changes nothing or `REPAIR_PASS_CAP` passes have run. Hitting the cap
    /// leaves the residual matches in place; this only happens for palettes
    /// too small for the grid.
    ///
    /// Used when a grid is built, never during play.
    pub fn repair_no_matches(
        &mut self,
        palette: &Palette,
        source: &mut dyn TileSource,
    ) -> RepairReport {
        let mut recolored = 0;
        for pass in 1..=REPAIR_PASS_CAP {
            let mut changed = false;
            for pos in self.positions() {
                if self.get(pos).is_none() || self.matches_at(pos).is_empty() {
                    continue;
                }
                let avoid = self.neighbour_colors(pos);
                let color = source.next_color_avoiding(palette, &avoid);
                self.set(pos, Some(color));
                recolored += 1;
                changed = true;
            }
            if !changed {
                debug!("grid repaired in {} passes, {} cells recolored", pass, recolored);
                return RepairReport {
                    passes: pass,
                    recolored,
                    settled: true,
                };
            }
        }

        let settled = self.all_matches().is_empty();
        if !settled {
            warn!(
                "repair gave up after {} passes with matches left on the grid",
                REPAIR_PASS_CAP
            );
        }
        RepairReport {
            passes: REPAIR_PASS_CAP,
            recolored,
            settled,
        }
    }

    /// Renders the grid for a terminal with ANSI colors.
    ///
    /// Row and column numbers frame the board. The cell at `highlight`, if
    /// any, shows `..` instead of blank space so a selection stands out.
    pub fn to_string_with_highlight(&self, highlight: Option<Pos>) -> String {
        let mut output = String::new();

        output.push_str("  ");
        for col in 0..self.size {
            output.push_str(&format!("{:<2}", col));
        }
        output.push('\n');

        for row in 0..self.size {
            output.push_str(&format!("{:<2}", row));
            for col in 0..self.size {
                let pos = Pos::new(row, col);
                let content = if highlight == Some(pos) { ".." } else { "  " };
                match self.get(pos) {
                    Some(color) => output.push_str(&format!(
                        "\x1b[1;{}m{}\x1b[m",
                        color.ansi_background(),
                        content
                    )),
                    None => output.push_str(content),
                }
            }
            if row + 1 < self.size {
                output.push('\n');
            }
        }
        output
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_highlight(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{RandomTileSource, ScriptedTileSource};
    use crate::utils::{grid_from_str_array, grid_to_strings};

    fn parse(rows: &[&str]) -> Grid {
        grid_from_str_array(rows, &Palette::default()).unwrap()
    }

    fn set_of(positions: &[(usize, usize)]) -> MatchSet {
        positions.iter().map(|&(r, c)| Pos::new(r, c)).collect()
    }

    #[test]
    fn test_adjacent_is_manhattan_one() {
        let centre = Pos::new(4, 4);
        assert!(Grid::adjacent(centre, Pos::new(3, 4)));
        assert!(Grid::adjacent(centre, Pos::new(5, 4)));
        assert!(Grid::adjacent(centre, Pos::new(4, 3)));
        assert!(Grid::adjacent(centre, Pos::new(4, 5)));
        for diagonal in [(3, 3), (3, 5), (5, 3), (5, 5)] {
            assert!(!Grid::adjacent(centre, Pos::new(diagonal.0, diagonal.1)));
        }
        assert!(!Grid::adjacent(centre, Pos::new(4, 6)));
        assert!(!Grid::adjacent(centre, centre));
    }

    #[test]
    fn test_swap_exchanges_colors() {
        let mut grid = parse(&["RBG", "YPO", "RBG"]);
        grid.swap(Pos::new(0, 0), Pos::new(1, 1));
        assert_eq!(grid_to_strings(&grid, &Palette::default()), ["PBG", "YRO", "RBG"]);
    }

    #[test]
    fn test_matches_at_horizontal_run() {
        let grid = parse(&["RRRB", "BGYG", "GYBY", "YBGB"]);
        let expected = set_of(&[(0, 0), (0, 1), (0, 2)]);
        assert_eq!(grid.matches_at(Pos::new(0, 1)), expected);
        assert_eq!(grid.matches_at(Pos::new(0, 2)), expected);
        assert!(grid.matches_at(Pos::new(0, 3)).is_empty());
    }

    #[test]
    fn test_matches_at_short_runs_do_not_match() {
        let grid = parse(&["RRB", "RGY", "BYG"]);
        // Two in a row and two in a column through the corner: no match.
        assert!(grid.matches_at(Pos::new(0, 0)).is_empty());
    }

    #[test]
    fn test_matches_at_l_shape_unions_both_runs() {
        let grid = parse(&["RRRB", "RGYG", "RYBY", "YBGB"]);
        let expected = set_of(&[(0, 0), (0, 1), (0, 2), (1, 0), (2, 0)]);
        assert_eq!(grid.matches_at(Pos::new(0, 0)), expected);
    }

    #[test]
    fn test_matches_at_includes_short_cross_run() {
        // Row 1 is a run of three; column 1 only has two reds through (1, 1).
        let grid = parse(&["BRGY", "RRRB", "GBYG", "YGBY"]);
        let expected = set_of(&[(0, 1), (1, 0), (1, 1), (1, 2)]);
        assert_eq!(grid.matches_at(Pos::new(1, 1)), expected);
        // From (1, 0) the vertical run is just itself, so (0, 1) is not reached.
        assert_eq!(grid.matches_at(Pos::new(1, 0)), set_of(&[(1, 0), (1, 1), (1, 2)]));
        // The full scan unions every origin, picking up the pair.
        assert_eq!(grid.all_matches(), expected);
    }

    #[test]
    fn test_all_matches_plus_shape() {
        let grid = parse(&["BRGYB", "GRYBG", "RRRRY", "YRBGB", "BGYBG"]);
        let expected = set_of(&[
            (0, 1),
            (1, 1),
            (2, 0),
            (2, 1),
            (2, 2),
            (2, 3),
            (3, 1),
        ]);
        assert_eq!(grid.all_matches(), expected);
    }

    #[test]
    fn test_all_matches_ignores_empty_cells() {
        let grid = parse(&["...", "RBG", "GRB"]);
        assert!(grid.all_matches().is_empty());
        assert!(grid.matches_at(Pos::new(0, 0)).is_empty());
    }

    #[test]
    fn test_remove_and_gravity_preserve_order() {
        let mut grid = parse(&["RBG", "YPO", "GRB"]);
        grid.remove(&[Pos::new(1, 0), Pos::new(2, 0)]);
        let falls = grid.apply_gravity();
        assert_eq!(
            falls,
            vec![Fall {
                col: 0,
                from_row: 0,
                to_row: 2,
                color: Color(0)
            }]
        );
        assert_eq!(grid_to_strings(&grid, &Palette::default()), [".BG", ".PO", "RRB"]);
    }

    #[test]
    fn test_gravity_with_gaps_keeps_relative_order() {
        let mut grid = parse(&["R..", ".B.", "G.Y"]);
        grid.set(Pos::new(2, 0), None);
        let falls = grid.apply_gravity();
        assert_eq!(grid_to_strings(&grid, &Palette::default()), ["...", "...", "RBY"]);
        assert_eq!(falls.len(), 2);
        assert_eq!((falls[0].from_row, falls[0].to_row), (0, 2));
        assert_eq!((falls[1].col, falls[1].from_row, falls[1].to_row), (1, 1, 2));
    }

    #[test]
    fn test_refill_fills_from_the_bottom_up() {
        let palette = Palette::default();
        let mut grid = parse(&["..G", ".PO", "YRB"]);
        let mut source = ScriptedTileSource::from_letters(&palette, "BGO");
        let spawns = grid.refill(&palette, &mut source);

        assert!(grid.is_full());
        assert_eq!(grid_to_strings(&grid, &palette), ["GOG", "BPO", "YRB"]);
        assert_eq!(
            spawns,
            vec![
                Spawn {
                    col: 0,
                    row: 1,
                    entry_offset: 1,
                    color: Color(1)
                },
                Spawn {
                    col: 0,
                    row: 0,
                    entry_offset: 2,
                    color: Color(2)
                },
                Spawn {
                    col: 1,
                    row: 0,
                    entry_offset: 1,
                    color: Color(5)
                },
            ]
        );
    }

    #[test]
    fn test_repair_terminates_for_reference_configuration() {
        let palette = Palette::default();
        for seed in 0..50 {
            let mut source = RandomTileSource::with_seed(seed);
            let mut grid = Grid::new_random(DEFAULT_GRID_SIZE, &palette, &mut source);
            let report = grid.repair_no_matches(&palette, &mut source);
            assert!(report.settled, "seed {} did not settle", seed);
            assert!(report.passes <= REPAIR_PASS_CAP);
            assert!(grid.all_matches().is_empty());
            assert!(grid.is_full());
        }
    }

    #[test]
    fn test_repair_is_noop_on_clean_grid() {
        let palette = Palette::default();
        let mut grid = parse(&["RBG", "YPO", "GRB"]);
        let before = grid.clone();
        let mut source = RandomTileSource::with_seed(1);
        let report = grid.repair_no_matches(&palette, &mut source);
        assert_eq!(
            report,
            RepairReport {
                passes: 1,
                recolored: 0,
                settled: true
            }
        );
        assert_eq!(grid, before);
    }

    /// Ignores the avoid list, so repair can never make progress.
    struct Stubborn;

    impl TileSource for Stubborn {
        fn next_index(&mut self, _bound: usize) -> usize {
            0
        }

        fn next_color_avoiding(&mut self, _palette: &Palette, _avoid: &[Color]) -> Color {
            Color(0)
        }
    }

    #[test]
    fn test_repair_cap_accepts_residual_grid() {
        let palette = Palette::new(3).unwrap();
        let mut source = Stubborn;
        let mut grid = Grid::new_random(4, &palette, &mut source);
        let report = grid.repair_no_matches(&palette, &mut source);
        assert_eq!(report.passes, REPAIR_PASS_CAP);
        assert!(!report.settled);
        assert!(grid.is_full());
    }

    #[test]
    fn test_display_has_headers() {
        let grid = parse(&["RBG", "YPO", "GRB"]);
        let shown = format!("{}", grid);
        assert!(shown.starts_with("  0 1 2 "));
        assert_eq!(shown.lines().count(), 4);
        let highlighted = grid.to_string_with_highlight(Some(Pos::new(1, 1)));
        assert!(highlighted.contains(".."));
    }

    #[test]
    fn test_from_rows_rejects_non_square() {
        assert!(Grid::from_rows(vec![vec![None; 3]; 2]).is_none());
        let grid = Grid::from_rows(vec![vec![Some(Color(1)); 3]; 3]).unwrap();
        assert_eq!(grid.size(), 3);
    }
}
