//! The cascade loop: clear matches, drop, refill, repeat until stable.
//!
//! Scoring lives here too. A batch is everything `Grid::all_matches` finds
//! in one scan; it is worth `tiles × POINTS_PER_TILE × min(combo, COMBO_CAP)`
//! where `combo` counts the batches of the current move, starting at 1.
use log::debug;

use crate::grid::{Fall, Grid, MatchSet, Spawn};
use crate::palette::{Palette, TileSource};

/// Base points per cleared tile.
pub const POINTS_PER_TILE: u32 = 10;

/// Highest combo multiplier.
pub const COMBO_CAP: u32 = 5;

/// Points for clearing `tiles` tiles at combo level `combo`.
///
/// # Examples
/// ```
/// use match3_engine::resolver::batch_points;
/// assert_eq!(batch_points(6, 1), 60);
/// assert_eq!(batch_points(3, 2), 60);
/// assert_eq!(batch_points(3, 9), 150); // multiplier stops at 5
/// ```
pub fn batch_points(tiles: usize, combo: u32) -> u32 {
    tiles as u32 * POINTS_PER_TILE * combo.min(COMBO_CAP)
}

/// One scan-clear-drop-refill iteration of a cascade.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadeBatch {
    /// Combo level this batch was scored at (1 for the first batch of a move).
    pub combo: u32,
    /// Cleared positions.
    pub removed: MatchSet,
    pub points: u32,
    pub falls: Vec<Fall>,
    pub spawns: Vec<Spawn>,
}

/// Every batch of one cascade, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub batches: Vec<CascadeBatch>,
}

impl CascadeReport {
    pub fn total_points(&self) -> u32 {
        self.batches.iter().map(|batch| batch.points).sum()
    }

    pub fn tiles_cleared(&self) -> usize {
        self.batches.iter().map(|batch| batch.removed.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Runs a single cascade iteration.
///
/// If the grid has no match, nothing changes and `None` is returned: the
/// cascade has settled. Otherwise `combo` is incremented, the batch is
/// scored, the matched tiles are removed and the grid is dropped and
/// refilled.
pub fn resolve_step(
    grid: &mut Grid,
    palette: &Palette,
    source: &mut dyn TileSource,
    combo: &mut u32,
) -> Option<CascadeBatch> {
    let removed = grid.all_matches();
    if removed.is_empty() {
        return None;
    }

    *combo += 1;
    let points = batch_points(removed.len(), *combo);
    debug!(
        "combo {}: clearing {} tiles for {} points",
        combo,
        removed.len(),
        points
    );

    grid.remove(&removed);
    let falls = grid.apply_gravity();
    let spawns = grid.refill(palette, source);

    Some(CascadeBatch {
        combo: *combo,
        removed,
        points,
        falls,
        spawns,
    })
}

/// Runs the cascade to completion, with the combo counter starting at 0.
///
/// There is no iteration cap; the loop ends only on a match-free grid.
pub fn resolve_all(
    grid: &mut Grid,
    palette: &Palette,
    source: &mut dyn TileSource,
) -> CascadeReport {
    let mut combo = 0;
    let mut report = CascadeReport::default();
    while let Some(batch) = resolve_step(grid, palette, source, &mut combo) {
        report.batches.push(batch);
    }
    report
}
