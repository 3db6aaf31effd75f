//! The engine facade hosts talk to.
//!
//! An `Engine` owns the grid, the run state of the current level, the tile
//! source and the host's `EngineListener`. Everything happens synchronously
//! inside `&mut self` calls:
//! - `start_level` / `start_level_with_grid` load a level and wait at the
//!   start gate (`Phase::Ready`).
//! - `open_gate` lets the player in.
//! - `submit_move` swaps two tiles and runs the whole cascade, or
//!   `begin_move` + `resolve_step` do the same one batch at a time so a host
//!   can animate between batches.
//! - `advance` / `retry` start the next run once a level is over.
//! - `teardown` makes the engine inert.
//!
//! Score, move and outcome changes are reported through the listener; the
//! return values carry the geometry (what was cleared, what fell, what
//! spawned) so a host can diff the grid.
use log::{debug, info, trace, warn};
use std::fmt;

use crate::error::EngineError;
use crate::events::EngineListener;
use crate::grid::{Grid, Pos, DEFAULT_GRID_SIZE, MATCH_MIN};
use crate::heuristics::{Move, Strategy};
use crate::level::{LevelTable, Phase, RunState};
use crate::palette::{Palette, RandomTileSource, TileSource, DEFAULT_PALETTE_SIZE};
use crate::resolver::{self, CascadeBatch, CascadeReport};

/// Strategy behind `Engine::hint`.
pub const HINT_STRATEGY: Strategy = Strategy::Mis;

/// Construction-time settings of an `Engine`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Rows and columns of the square grid.
    pub grid_size: usize,
    /// Number of tile colors.
    pub palette_size: usize,
    /// Seed for tile generation; `None` seeds from entropy.
    pub seed: Option<u64>,
    pub levels: LevelTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            grid_size: DEFAULT_GRID_SIZE,
            palette_size: DEFAULT_PALETTE_SIZE,
            seed: None,
            levels: LevelTable::default(),
        }
    }
}

impl EngineConfig {
    /// Checks the grid size and builds the palette.
    fn validate(&self) -> Result<Palette, EngineError> {
        if self.grid_size < MATCH_MIN {
            return Err(EngineError::GridTooSmall {
                min: MATCH_MIN,
                got: self.grid_size,
            });
        }
        Palette::new(self.palette_size)
    }
}

/// Why a swap was turned down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// A position lies outside the grid.
    OutOfBounds,
    /// The positions are not orthogonal neighbours.
    NotAdjacent,
    /// The swap would not create a match at either position.
    NoMatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::OutOfBounds => "position outside the grid",
            RejectReason::NotAdjacent => "tiles are not adjacent",
            RejectReason::NoMatch => "swap makes no match",
        };
        f.write_str(text)
    }
}

/// Result of `Engine::begin_move`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveVerdict {
    /// The swap stands and a move was spent; call `resolve_step` until it
    /// returns `None`.
    Accepted,
    /// Nothing changed.
    Rejected(RejectReason),
    /// Input is not open (no level, gate closed, cascade running or level
    /// over). Nothing changed.
    Ignored,
}

/// Result of `Engine::submit_move`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Ignored,
    Rejected(RejectReason),
    /// The move was played; the report lists every batch of its cascade.
    Resolved(CascadeReport),
}

/// Result of `Engine::advance`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// The given level was started and waits at its gate.
    NextLevel(u32),
    /// There is no level after the completed one.
    RunComplete,
}

/// One attempt at one level.
#[derive(Clone, Debug)]
struct Session {
    grid: Grid,
    state: RunState,
    skin: String,
    run_complete: bool,
}

/// A match-3 game instance, exclusively owned by its host.
pub struct Engine {
    config: EngineConfig,
    palette: Palette,
    source: Box<dyn TileSource>,
    listener: Option<Box<dyn EngineListener>>,
    session: Option<Session>,
    torn_down: bool,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("palette", &self.palette)
            .field("session", &self.session)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine drawing tiles from a `SmallRng`, seeded from
    /// `config.seed` when given.
    ///
    /// # Arguments
    /// * `config`: grid size, palette size, seed and level table.
    /// * `listener`: receives score, move and outcome notifications.
    ///
    /// # Returns
    /// * `Ok(Engine)` in `Phase::Idle`; call `start_level` next.
    /// * `Err(EngineError)` if the grid is smaller than 3×3 or the palette
    ///   size is outside 3..=36.
    ///
    /// # Examples
    /// ```
    /// use match3_engine::engine::{Engine, EngineConfig};
    /// use match3_engine::events::NullListener;
    /// use match3_engine::level::Phase;
    ///
    /// let config = EngineConfig { seed: Some(7), ..EngineConfig::default() };
    /// let mut engine = Engine::new(config, Box::new(NullListener)).unwrap();
    /// engine.start_level(1, "orange");
    /// assert_eq!(engine.phase(), Phase::Ready);
    /// assert!(engine.open_gate());
    /// assert_eq!(engine.moves_left(), 30);
    /// ```
    pub fn new(
        config: EngineConfig,
        listener: Box<dyn EngineListener>,
    ) -> Result<Self, EngineError> {
        let source: Box<dyn TileSource> = match config.seed {
            Some(seed) => Box::new(RandomTileSource::with_seed(seed)),
            None => Box::new(RandomTileSource::from_entropy()),
        };
        Engine::with_source(config, source, listener)
    }

    /// Like `new`, with a caller-supplied tile source. `config.seed` is
    /// ignored.
    pub fn with_source(
        config: EngineConfig,
        source: Box<dyn TileSource>,
        listener: Box<dyn EngineListener>,
    ) -> Result<Self, EngineError> {
        let palette = config.validate()?;
        debug!(
            "engine created: {0}x{0} grid, {1} colors, {2} levels",
            config.grid_size,
            palette.len(),
            config.levels.len()
        );
        Ok(Engine {
            config,
            palette,
            source,
            listener: Some(listener),
            session: None,
            torn_down: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Loads `level` on a fresh random grid and waits at the start gate.
    ///
    /// Unknown levels play with level 1's settings; unknown skins become
    /// the default skin. Fires `on_score_update(0)` and
    /// `on_moves_update(moves_allowed)`. Does nothing after `teardown`.
    pub fn start_level(&mut self, level: u32, skin: &str) {
        if self.torn_down {
            return;
        }
        let grid = Grid::new_random(self.config.grid_size, &self.palette, &mut *self.source);
        self.install(level, skin, grid);
    }

    /// Loads `level` on a host-supplied layout.
    ///
    /// Empty cells are filled as if tiles had dropped in, then the layout is
    /// repaired like a random one.
    ///
    /// # Returns
    /// * `Ok(())` when the level was loaded (or the engine is torn down).
    /// * `Err(EngineError)` if the layout size differs from the configured
    ///   grid size or it uses colors outside the palette. The current
    ///   session is left untouched.
    pub fn start_level_with_grid(
        &mut self,
        level: u32,
        skin: &str,
        mut grid: Grid,
    ) -> Result<(), EngineError> {
        if self.torn_down {
            return Ok(());
        }
        if grid.size() != self.config.grid_size {
            return Err(EngineError::LayoutSize {
                expected: self.config.grid_size,
                got: grid.size(),
            });
        }
        let foreign = grid
            .positions()
            .filter_map(|pos| grid.get(pos))
            .any(|color| !self.palette.contains(color));
        if foreign {
            return Err(EngineError::LayoutColors);
        }

        if !grid.is_full() {
            grid.apply_gravity();
            grid.refill(&self.palette, &mut *self.source);
        }
        self.install(level, skin, grid);
        Ok(())
    }

    fn install(&mut self, level: u32, skin: &str, mut grid: Grid) {
        let repair = grid.repair_no_matches(&self.palette, &mut *self.source);
        let config = self.config.levels.config_for(level);
        let resolved_skin = self.palette.resolve_skin(skin);
        if !resolved_skin.eq_ignore_ascii_case(skin) {
            warn!("unknown skin '{}', using '{}'", skin, resolved_skin);
        }
        info!(
            "level {} started: {} moves, target {}, skin {}",
            level, config.moves_allowed, config.target_score, resolved_skin
        );
        trace!("repair: {:?}", repair);

        self.session = Some(Session {
            grid,
            state: RunState::new(level, config),
            skin: resolved_skin,
            run_complete: false,
        });
        self.notify(|l| l.on_score_update(0));
        self.notify(|l| l.on_moves_update(config.moves_allowed));
    }

    /// Opens the start gate: `Ready` → `AwaitingInput`.
    ///
    /// Matches the repair pass could not remove are cleared now, scored as a
    /// cascade of their own, without spending a move.
    ///
    /// # Returns
    /// `true` if the gate was opened, `false` outside `Phase::Ready`.
    pub fn open_gate(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.state.open_gate() {
            return false;
        }
        if session.grid.all_matches().is_empty() {
            return true;
        }

        debug!("resolving matches left over from the repair pass");
        session.state.combo = 0;
        session.state.phase = Phase::Resolving;
        while self.resolve_step().is_some() {}
        true
    }

    /// Plays a move and resolves its cascade to completion.
    ///
    /// # Arguments
    /// * `a`, `b`: the two tiles to swap, in either order.
    ///
    /// # Returns
    /// * `MoveOutcome::Ignored` outside `Phase::AwaitingInput`.
    /// * `MoveOutcome::Rejected` for out-of-bounds, non-adjacent or
    ///   match-less swaps. The grid, score and moves are unchanged and no
    ///   callback fires.
    /// * `MoveOutcome::Resolved` with every batch of the cascade otherwise.
    ///   The phase is then `AwaitingInput`, `LevelComplete` or `GameOver`.
    pub fn submit_move(&mut self, a: Pos, b: Pos) -> MoveOutcome {
        match self.begin_move(a, b) {
            MoveVerdict::Ignored => MoveOutcome::Ignored,
            MoveVerdict::Rejected(reason) => MoveOutcome::Rejected(reason),
            MoveVerdict::Accepted => {
                let mut report = CascadeReport::default();
                while let Some(batch) = self.resolve_step() {
                    report.batches.push(batch);
                }
                MoveOutcome::Resolved(report)
            }
        }
    }

    /// Validates and performs the swap of a move without resolving it.
    ///
    /// On `Accepted` the combo is reset, one move is spent
    /// (`on_moves_update` fires) and the phase is `Resolving` until
    /// `resolve_step` returns `None`. Every move submitted meanwhile is
    /// ignored.
    pub fn begin_move(&mut self, a: Pos, b: Pos) -> MoveVerdict {
        let Some(session) = self.session.as_mut() else {
            return MoveVerdict::Ignored;
        };
        if session.state.phase != Phase::AwaitingInput {
            trace!("move {} <-> {} ignored in {:?}", a, b, session.state.phase);
            return MoveVerdict::Ignored;
        }

        let reason = if !session.grid.contains(a) || !session.grid.contains(b) {
            Some(RejectReason::OutOfBounds)
        } else if !Grid::adjacent(a, b) {
            Some(RejectReason::NotAdjacent)
        } else {
            session.grid.swap(a, b);
            if session.grid.matches_at(a).is_empty() && session.grid.matches_at(b).is_empty() {
                session.grid.swap(a, b);
                Some(RejectReason::NoMatch)
            } else {
                None
            }
        };
        if let Some(reason) = reason {
            trace!("move {} <-> {} rejected: {}", a, b, reason);
            return MoveVerdict::Rejected(reason);
        }

        session.state.begin_move();
        let moves_left = session.state.moves_left;
        debug!("move {} <-> {} accepted, {} moves left", a, b, moves_left);
        self.notify(|l| l.on_moves_update(moves_left));
        MoveVerdict::Accepted
    }

    /// Runs one batch of the cascade in flight.
    ///
    /// # Returns
    /// * `Some(CascadeBatch)` after clearing, dropping and refilling one
    ///   batch; `on_score_update` has fired.
    /// * `None` when there is no cascade in flight, or when it has just
    ///   settled. In the latter case the phase was decided and
    ///   `on_level_complete` or `on_game_over` fired if the level ended.
    pub fn resolve_step(&mut self) -> Option<CascadeBatch> {
        let session = self.session.as_mut()?;
        if session.state.phase != Phase::Resolving {
            return None;
        }

        let mut combo = session.state.combo;
        let step = resolver::resolve_step(
            &mut session.grid,
            &self.palette,
            &mut *self.source,
            &mut combo,
        );
        match step {
            Some(batch) => {
                session.state.add_points(batch.points, batch.combo);
                let score = session.state.score;
                self.notify(|l| l.on_score_update(score));
                Some(batch)
            }
            None => {
                self.settle();
                None
            }
        }
    }

    fn settle(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let phase = session.state.settle();
        let level = session.state.level;
        let score = session.state.score;
        match phase {
            Phase::LevelComplete => {
                info!("level {} complete with {} points", level, score);
                self.notify(|l| l.on_level_complete(level, score, false));
            }
            Phase::GameOver => {
                info!("level {} lost with {} points", level, score);
                self.notify(|l| l.on_game_over(score));
            }
            _ => {}
        }
    }

    /// Moves on from a completed level.
    ///
    /// # Returns
    /// * `Some(Advance::NextLevel(n))`: level `n` was started with the same
    ///   skin and waits at its gate.
    /// * `Some(Advance::RunComplete)`: the completed level was the last one;
    ///   `on_level_complete(level, score, true)` fired.
    /// * `None` outside `Phase::LevelComplete`, or once the run is complete.
    pub fn advance(&mut self) -> Option<Advance> {
        let session = self.session.as_mut()?;
        if session.state.phase != Phase::LevelComplete || session.run_complete {
            return None;
        }

        let level = session.state.level;
        match self.config.levels.next_level(level) {
            Some(next) => {
                let skin = session.skin.clone();
                self.start_level(next, &skin);
                Some(Advance::NextLevel(next))
            }
            None => {
                session.run_complete = true;
                let score = session.state.score;
                info!("run complete after level {} with {} points", level, score);
                self.notify(|l| l.on_level_complete(level, score, true));
                Some(Advance::RunComplete)
            }
        }
    }

    /// Restarts the current level on a fresh grid once it has ended.
    ///
    /// # Returns
    /// `true` if the level was restarted, `false` while it is still being
    /// played (or nothing is loaded).
    pub fn retry(&mut self) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        if !session.state.phase.is_terminal() {
            return false;
        }
        let level = session.state.level;
        let skin = session.skin.clone();
        self.start_level(level, &skin);
        true
    }

    /// Drops the grid, the run state and the listener.
    ///
    /// Afterwards no callback fires and every call is a no-op. Calling it
    /// again is harmless.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        info!("engine torn down");
        self.session = None;
        self.listener = None;
        self.torn_down = true;
    }

    fn notify(&mut self, event: impl FnOnce(&mut dyn EngineListener)) {
        if let Some(listener) = self.listener.as_deref_mut() {
            event(listener);
        }
    }

    pub fn phase(&self) -> Phase {
        self.session
            .as_ref()
            .map_or(Phase::Idle, |session| session.state.phase)
    }

    /// State of the current attempt, `None` when idle.
    pub fn run_state(&self) -> Option<&RunState> {
        self.session.as_ref().map(|session| &session.state)
    }

    /// Current level number, 0 when idle.
    pub fn level(&self) -> u32 {
        self.run_state().map_or(0, |state| state.level)
    }

    pub fn score(&self) -> u32 {
        self.run_state().map_or(0, |state| state.score)
    }

    pub fn moves_left(&self) -> u32 {
        self.run_state().map_or(0, |state| state.moves_left)
    }

    /// Combo level of the latest batch of the current or last move.
    pub fn combo(&self) -> u32 {
        self.run_state().map_or(0, |state| state.combo)
    }

    pub fn target_score(&self) -> u32 {
        self.run_state().map_or(0, |state| state.target_score)
    }

    pub fn skin(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.skin.as_str())
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.session.as_ref().map(|session| &session.grid)
    }

    /// A legal move on the current grid, chosen by `HINT_STRATEGY`.
    pub fn hint(&self) -> Option<Move> {
        self.grid().and_then(|grid| HINT_STRATEGY.choose(grid))
    }

    /// Whether the current grid has any legal move. The engine never
    /// reshuffles a stuck grid.
    pub fn has_valid_move(&self) -> bool {
        self.hint().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EngineEvent, EventLog, EventRecorder, NullListener};
    use crate::level::LevelConfig;
    use crate::palette::{Color, ScriptedTileSource};
    use crate::utils::{grid_from_str_array, grid_to_strings};

    // No matches; swapping (3, 3) and (3, 4) joins a vertical red run and a
    // vertical green run into six tiles.
    const STABLE: [&str; 8] = [
        "RGPBGPRG", //
        "BYORYOBY", //
        "GPGRPRGP", //
        "YOBGRBYO", //
        "PRGPGOPR", //
        "OBYOGYOB", //
        "RGPROPRG", //
        "BYOBYOBY", //
    ];

    fn levels(entries: &[(u32, u32, u32)]) -> LevelTable {
        LevelTable::new(entries.iter().map(|&(number, moves_allowed, target_score)| {
            (
                number,
                LevelConfig {
                    moves_allowed,
                    target_score,
                },
            )
        }))
        .unwrap()
    }

    fn scripted_engine(levels: LevelTable, refill: &str) -> (Engine, EventLog) {
        let palette = Palette::default();
        let config = EngineConfig {
            levels,
            ..EngineConfig::default()
        };
        let source = ScriptedTileSource::from_letters(&palette, refill);
        let (recorder, log) = EventRecorder::new();
        let engine = Engine::with_source(config, Box::new(source), Box::new(recorder)).unwrap();
        (engine, log)
    }

    fn start_stable(engine: &mut Engine) {
        let grid = grid_from_str_array(&STABLE, engine.palette()).unwrap();
        engine.start_level_with_grid(1, "orange", grid).unwrap();
        assert!(engine.open_gate());
    }

    fn events(log: &EventLog) -> Vec<EngineEvent> {
        log.borrow().clone()
    }

    #[test]
    fn test_start_level_fires_hud_events_and_waits_at_gate() {
        let (mut engine, log) = scripted_engine(LevelTable::default(), "RRBBRR");
        assert_eq!(engine.phase(), Phase::Idle);
        let grid = grid_from_str_array(&STABLE, engine.palette()).unwrap();
        engine.start_level_with_grid(1, "orange", grid).unwrap();

        assert_eq!(engine.phase(), Phase::Ready);
        assert_eq!(engine.level(), 1);
        assert_eq!(engine.moves_left(), 30);
        assert_eq!(engine.target_score(), 500);
        assert_eq!(
            events(&log),
            vec![EngineEvent::ScoreUpdate(0), EngineEvent::MovesUpdate(30)]
        );

        // Input stays locked until the gate opens.
        let outcome = engine.submit_move(Pos::new(3, 3), Pos::new(3, 4));
        assert_eq!(outcome, MoveOutcome::Ignored);
        assert_eq!(engine.moves_left(), 30);
        assert!(engine.open_gate());
        assert!(!engine.open_gate());
        assert_eq!(engine.phase(), Phase::AwaitingInput);
    }

    #[test]
    fn test_six_tile_match_scores_sixty() {
        let (mut engine, log) = scripted_engine(LevelTable::default(), "RRBBRR");
        start_stable(&mut engine);

        let outcome = engine.submit_move(Pos::new(3, 4), Pos::new(3, 3));
        let report = match outcome {
            MoveOutcome::Resolved(report) => report,
            other => panic!("move should resolve, got {:?}", other),
        };
        assert_eq!(report.batches.len(), 1);
        assert_eq!(report.batches[0].removed.len(), 6);
        assert_eq!(report.total_points(), 60);

        assert_eq!(engine.score(), 60);
        assert_eq!(engine.moves_left(), 29);
        assert_eq!(engine.combo(), 1);
        assert_eq!(engine.phase(), Phase::AwaitingInput);
        assert_eq!(
            events(&log),
            vec![
                EngineEvent::ScoreUpdate(0),
                EngineEvent::MovesUpdate(30),
                EngineEvent::MovesUpdate(29),
                EngineEvent::ScoreUpdate(60),
            ]
        );

        let grid = engine.grid().unwrap();
        assert_eq!(
            grid_to_strings(grid, engine.palette()),
            [
                "RGPBRPRG", "BYORROBY", "GPGRBRGP", "YOBBGBYO", "PRGPYOPR", "OBYOPYOB",
                "RGPROPRG", "BYOBYOBY",
            ]
        );
        assert!(grid.all_matches().is_empty());
    }

    #[test]
    fn test_chained_batches_follow_combo_law() {
        let (mut engine, log) = scripted_engine(LevelTable::default(), "PPORYOPB");
        start_stable(&mut engine);

        let outcome = engine.submit_move(Pos::new(3, 2), Pos::new(3, 3));
        let report = match outcome {
            MoveOutcome::Resolved(report) => report,
            other => panic!("move should resolve, got {:?}", other),
        };
        let sizes: Vec<usize> = report.batches.iter().map(|b| b.removed.len()).collect();
        assert_eq!(sizes, vec![3, 4]);
        assert_eq!(report.total_points(), 3 * 10 + 4 * 10 * 2);
        assert_eq!(engine.score(), 110);
        assert_eq!(engine.combo(), 2);
        assert_eq!(
            events(&log)[2..],
            [
                EngineEvent::MovesUpdate(29),
                EngineEvent::ScoreUpdate(30),
                EngineEvent::ScoreUpdate(110),
            ]
        );
        assert!(engine.grid().unwrap().all_matches().is_empty());
    }

    #[test]
    fn test_stepwise_resolution_locks_input() {
        let (mut engine, _log) = scripted_engine(LevelTable::default(), "PPORYOPB");
        start_stable(&mut engine);

        assert_eq!(
            engine.begin_move(Pos::new(3, 2), Pos::new(3, 3)),
            MoveVerdict::Accepted
        );
        assert_eq!(engine.phase(), Phase::Resolving);
        assert_eq!(engine.moves_left(), 29);

        // A second move while the first is in flight changes nothing.
        assert_eq!(
            engine.submit_move(Pos::new(3, 3), Pos::new(3, 4)),
            MoveOutcome::Ignored
        );
        assert_eq!(
            engine.begin_move(Pos::new(3, 3), Pos::new(3, 4)),
            MoveVerdict::Ignored
        );
        assert_eq!(engine.moves_left(), 29);

        let first = engine.resolve_step().unwrap();
        assert_eq!((first.combo, first.points), (1, 30));
        assert_eq!(engine.score(), 30);
        let second = engine.resolve_step().unwrap();
        assert_eq!((second.combo, second.points), (2, 80));
        assert!(engine.resolve_step().is_none());
        assert_eq!(engine.phase(), Phase::AwaitingInput);
        assert!(engine.resolve_step().is_none());
        assert_eq!(engine.score(), 110);
    }

    #[test]
    fn test_running_out_of_moves_is_game_over() {
        let (mut engine, log) = scripted_engine(levels(&[(1, 1, 500)]), "RRBBRR");
        start_stable(&mut engine);

        let outcome = engine.submit_move(Pos::new(3, 3), Pos::new(3, 4));
        assert!(matches!(outcome, MoveOutcome::Resolved(_)));
        assert_eq!(engine.phase(), Phase::GameOver);
        assert_eq!(engine.moves_left(), 0);
        assert_eq!(events(&log).last(), Some(&EngineEvent::GameOver(60)));

        let before = engine.grid().unwrap().clone();
        assert_eq!(
            engine.submit_move(Pos::new(0, 0), Pos::new(0, 1)),
            MoveOutcome::Ignored
        );
        assert_eq!(engine.grid(), Some(&before));
        assert_eq!(engine.advance(), None);
        assert_eq!(events(&log).len(), 5);
    }

    #[test]
    fn test_reaching_target_completes_level_with_moves_left() {
        let (mut engine, log) = scripted_engine(levels(&[(1, 4, 60)]), "RRBBRR");
        start_stable(&mut engine);

        engine.submit_move(Pos::new(3, 3), Pos::new(3, 4));
        assert_eq!(engine.phase(), Phase::LevelComplete);
        assert_eq!(engine.moves_left(), 3);
        assert_eq!(
            events(&log).last(),
            Some(&EngineEvent::LevelComplete {
                level: 1,
                score: 60,
                is_final_level: false
            })
        );
        assert_eq!(
            engine.submit_move(Pos::new(0, 0), Pos::new(0, 1)),
            MoveOutcome::Ignored
        );
    }

    #[test]
    fn test_advance_past_final_level_signals_run_complete() {
        let (mut engine, log) = scripted_engine(levels(&[(1, 4, 60)]), "RRBBRR");
        start_stable(&mut engine);
        engine.submit_move(Pos::new(3, 3), Pos::new(3, 4));

        assert_eq!(engine.advance(), Some(Advance::RunComplete));
        assert_eq!(
            events(&log).last(),
            Some(&EngineEvent::LevelComplete {
                level: 1,
                score: 60,
                is_final_level: true
            })
        );
        let count = events(&log).len();
        assert_eq!(engine.advance(), None);
        assert_eq!(events(&log).len(), count);
        assert_eq!(engine.phase(), Phase::LevelComplete);
    }

    #[test]
    fn test_advance_starts_next_level_with_same_skin() {
        let (mut engine, log) = scripted_engine(levels(&[(1, 4, 60), (2, 5, 100)]), "RRBBRR");
        let grid = grid_from_str_array(&STABLE, engine.palette()).unwrap();
        engine.start_level_with_grid(1, "blue", grid).unwrap();
        engine.open_gate();
        engine.submit_move(Pos::new(3, 3), Pos::new(3, 4));

        assert_eq!(engine.advance(), Some(Advance::NextLevel(2)));
        assert_eq!(engine.phase(), Phase::Ready);
        assert_eq!(engine.level(), 2);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.moves_left(), 5);
        assert_eq!(engine.skin(), Some("blue"));
        assert!(engine.grid().unwrap().all_matches().is_empty());
        assert!(engine.grid().unwrap().is_full());
        assert_eq!(
            events(&log)[events(&log).len() - 2..],
            [EngineEvent::ScoreUpdate(0), EngineEvent::MovesUpdate(5)]
        );
    }

    #[test]
    fn test_invalid_moves_are_rejected_without_effect() {
        let (mut engine, log) = scripted_engine(LevelTable::default(), "RRBBRR");
        start_stable(&mut engine);
        let before = engine.grid().unwrap().clone();

        for _ in 0..2 {
            assert_eq!(
                engine.submit_move(Pos::new(3, 3), Pos::new(4, 4)),
                MoveOutcome::Rejected(RejectReason::NotAdjacent)
            );
        }
        assert_eq!(
            engine.submit_move(Pos::new(3, 3), Pos::new(3, 3)),
            MoveOutcome::Rejected(RejectReason::NotAdjacent)
        );
        assert_eq!(
            engine.submit_move(Pos::new(7, 7), Pos::new(7, 8)),
            MoveOutcome::Rejected(RejectReason::OutOfBounds)
        );
        assert_eq!(
            engine.submit_move(Pos::new(0, 0), Pos::new(0, 1)),
            MoveOutcome::Rejected(RejectReason::NoMatch)
        );

        assert_eq!(engine.grid(), Some(&before));
        assert_eq!(engine.moves_left(), 30);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.phase(), Phase::AwaitingInput);
        assert_eq!(events(&log).len(), 2);
    }

    #[test]
    fn test_retry_only_after_level_ends() {
        let (mut engine, log) = scripted_engine(levels(&[(1, 1, 500)]), "RRBBRR");
        assert!(!engine.retry());
        start_stable(&mut engine);
        assert!(!engine.retry());

        engine.submit_move(Pos::new(3, 3), Pos::new(3, 4));
        assert_eq!(engine.phase(), Phase::GameOver);
        assert!(engine.retry());
        assert_eq!(engine.phase(), Phase::Ready);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.moves_left(), 1);
        assert!(engine.grid().unwrap().all_matches().is_empty());
        assert_eq!(
            events(&log)[events(&log).len() - 2..],
            [EngineEvent::ScoreUpdate(0), EngineEvent::MovesUpdate(1)]
        );
    }

    #[test]
    fn test_teardown_is_idempotent_and_silences_engine() {
        let (mut engine, log) = scripted_engine(LevelTable::default(), "RRBBRR");
        start_stable(&mut engine);
        engine.teardown();
        engine.teardown();

        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.grid(), None);
        assert_eq!(
            engine.submit_move(Pos::new(3, 3), Pos::new(3, 4)),
            MoveOutcome::Ignored
        );
        engine.start_level(1, "orange");
        let grid = grid_from_str_array(&STABLE, engine.palette()).unwrap();
        assert!(engine.start_level_with_grid(1, "orange", grid).is_ok());
        assert!(!engine.open_gate());
        assert!(!engine.retry());
        assert_eq!(engine.advance(), None);
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(events(&log).len(), 2);
    }

    #[test]
    fn test_unknown_level_and_skin_fall_back() {
        let (mut engine, _log) = scripted_engine(LevelTable::default(), "RRBBRR");
        let grid = grid_from_str_array(&STABLE, engine.palette()).unwrap();
        engine.start_level_with_grid(42, "pink", grid).unwrap();
        assert_eq!(engine.level(), 42);
        assert_eq!(engine.moves_left(), 30);
        assert_eq!(engine.target_score(), 500);
        assert_eq!(engine.skin(), Some("orange"));
    }

    #[test]
    fn test_config_validation() {
        let small = EngineConfig {
            grid_size: 2,
            ..EngineConfig::default()
        };
        assert_eq!(
            Engine::new(small, Box::new(NullListener)).err(),
            Some(EngineError::GridTooSmall { min: 3, got: 2 })
        );
        let few_colors = EngineConfig {
            palette_size: 2,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::new(few_colors, Box::new(NullListener)).err(),
            Some(EngineError::PaletteSize { got: 2, .. })
        ));
    }

    #[test]
    fn test_layout_must_fit_engine() {
        let (mut engine, log) = scripted_engine(LevelTable::default(), "RRBBRR");
        let small = grid_from_str_array(&["RBG", "YPO", "GRB"], engine.palette()).unwrap();
        assert_eq!(
            engine.start_level_with_grid(1, "orange", small),
            Err(EngineError::LayoutSize {
                expected: 8,
                got: 3
            })
        );
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(events(&log).is_empty());

        let config = EngineConfig {
            grid_size: 3,
            palette_size: 3,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, Box::new(NullListener)).unwrap();
        let orange = grid_from_str_array(&["RBO", "BGR", "GRB"], &Palette::default()).unwrap();
        assert_eq!(
            engine.start_level_with_grid(1, "orange", orange),
            Err(EngineError::LayoutColors)
        );
    }

    #[test]
    fn test_layout_holes_are_filled() {
        let (mut engine, _log) = scripted_engine(LevelTable::default(), "Y");
        let mut rows = STABLE;
        rows[0] = "RGPB.PRG";
        let grid = grid_from_str_array(&rows, engine.palette()).unwrap();
        engine.start_level_with_grid(1, "orange", grid).unwrap();
        let grid = engine.grid().unwrap();
        assert!(grid.is_full());
        assert_eq!(grid.get(Pos::new(0, 4)), engine.palette().color_for_letter('Y'));
        assert!(grid.all_matches().is_empty());
    }

    /// Refills from a script but refuses to repair anything.
    struct Stubborn(ScriptedTileSource);

    impl TileSource for Stubborn {
        fn next_index(&mut self, bound: usize) -> usize {
            self.0.next_index(bound)
        }

        fn next_color_avoiding(&mut self, _palette: &Palette, _avoid: &[Color]) -> Color {
            Color(0)
        }
    }

    #[test]
    fn test_open_gate_resolves_residual_matches_without_spending_a_move() {
        let palette = Palette::default();
        let config = EngineConfig {
            grid_size: 3,
            ..EngineConfig::default()
        };
        let source = Stubborn(ScriptedTileSource::from_letters(&palette, "BGY"));
        let (recorder, log) = EventRecorder::new();
        let mut engine = Engine::with_source(config, Box::new(source), Box::new(recorder)).unwrap();

        let grid = grid_from_str_array(&["RRR", "BGY", "GYB"], &palette).unwrap();
        engine.start_level_with_grid(1, "orange", grid).unwrap();
        assert_eq!(engine.grid().unwrap().all_matches().len(), 3);

        assert!(engine.open_gate());
        assert_eq!(engine.phase(), Phase::AwaitingInput);
        assert_eq!(engine.score(), 30);
        assert_eq!(engine.moves_left(), 30);
        assert_eq!(
            grid_to_strings(engine.grid().unwrap(), &palette),
            ["BGY", "BGY", "GYB"]
        );
        assert_eq!(
            events(&log),
            vec![
                EngineEvent::ScoreUpdate(0),
                EngineEvent::MovesUpdate(30),
                EngineEvent::ScoreUpdate(30),
            ]
        );
    }

    #[test]
    fn test_hint_matches_valid_move_query() {
        let (mut engine, _log) = scripted_engine(LevelTable::default(), "RRBBRR");
        assert_eq!(engine.hint(), None);
        assert!(!engine.has_valid_move());
        start_stable(&mut engine);

        let hint = engine.hint().unwrap();
        assert_eq!((hint.from, hint.to, hint.tiles), (Pos::new(3, 3), Pos::new(3, 4), 6));
        assert!(engine.has_valid_move());
    }

    #[test]
    fn test_seeded_play_keeps_invariants() {
        let config = EngineConfig {
            seed: Some(2024),
            ..EngineConfig::default()
        };
        let (recorder, _log) = EventRecorder::new();
        let mut engine = Engine::new(config, Box::new(recorder)).unwrap();
        engine.start_level(1, "orange");
        assert!(engine.grid().unwrap().all_matches().is_empty());
        engine.open_gate();

        while engine.phase() == Phase::AwaitingInput {
            let Some(hint) = engine.hint() else {
                break;
            };
            let (moves_before, score_before) = (engine.moves_left(), engine.score());
            let MoveOutcome::Resolved(report) = engine.submit_move(hint.from, hint.to) else {
                panic!("hinted move was not played");
            };
            assert_eq!(engine.moves_left(), moves_before - 1);
            assert_eq!(engine.score(), score_before + report.total_points());
            assert!(report.batches[0].removed.len() >= hint.tiles);
            let grid = engine.grid().unwrap();
            assert!(grid.is_full());
            assert!(grid.all_matches().is_empty());
        }
        assert!(engine.phase().is_terminal() || !engine.has_valid_move());
    }

    #[test]
    fn test_same_seed_same_grid() {
        let config = EngineConfig {
            seed: Some(99),
            ..EngineConfig::default()
        };
        let mut a = Engine::new(config.clone(), Box::new(NullListener)).unwrap();
        let mut b = Engine::new(config, Box::new(NullListener)).unwrap();
        a.start_level(1, "orange");
        b.start_level(1, "orange");
        assert_eq!(a.grid(), b.grid());
    }
}
