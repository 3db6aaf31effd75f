//! Level data and the per-level run state machine.
//!
//! A `LevelTable` maps level numbers to a move budget and a target score.
//! The built-in table has ten levels; hosts can load their own from TOML:
//!
//! ```toml
//! [[level]]
//! number = 1
//! moves = 30
//! target_score = 500
//! ```
//!
//! `RunState` tracks one attempt at one level and owns the phase
//! transitions: `Ready` → `AwaitingInput` ⇄ `Resolving` → `LevelComplete` or
//! `GameOver`.
use log::{info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::LevelTableError;

/// Move budget and target score of one level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelConfig {
    pub moves_allowed: u32,
    pub target_score: u32,
}

const DEFAULT_LEVELS: [(u32, u32, u32); 10] = [
    (1, 30, 500),
    (2, 28, 800),
    (3, 26, 1200),
    (4, 24, 1600),
    (5, 22, 2000),
    (6, 20, 2500),
    (7, 18, 3000),
    (8, 16, 3500),
    (9, 14, 4000),
    (10, 12, 5000),
];

/// Immutable lookup from level number to `LevelConfig`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelTable {
    levels: BTreeMap<u32, LevelConfig>,
}

#[derive(Debug, Deserialize)]
struct LevelFile {
    #[serde(rename = "level")]
    levels: Vec<LevelEntry>,
}

#[derive(Debug, Deserialize)]
struct LevelEntry {
    number: u32,
    moves: u32,
    target_score: u32,
}

impl LevelTable {
    /// Builds a table from `(number, config)` pairs.
    ///
    /// Level numbers start at 1, are unique, and every level needs at least
    /// one move.
    pub fn new(
        entries: impl IntoIterator<Item = (u32, LevelConfig)>,
    ) -> Result<Self, LevelTableError> {
        let mut levels = BTreeMap::new();
        for (number, config) in entries {
            if number == 0 {
                return Err(LevelTableError::ZeroLevel);
            }
            if config.moves_allowed == 0 {
                return Err(LevelTableError::NoMoves(number));
            }
            if levels.insert(number, config).is_some() {
                return Err(LevelTableError::Duplicate(number));
            }
        }
        if levels.is_empty() {
            return Err(LevelTableError::Empty);
        }
        Ok(LevelTable { levels })
    }

    /// Parses a TOML document with a `[[level]]` array.
    pub fn from_toml_str(contents: &str) -> Result<Self, LevelTableError> {
        let file: LevelFile = toml::from_str(contents)?;
        LevelTable::new(file.levels.into_iter().map(|entry| {
            (
                entry.number,
                LevelConfig {
                    moves_allowed: entry.moves,
                    target_score: entry.target_score,
                },
            )
        }))
    }

    /// Reads and parses a TOML level file.
    pub fn load(path: &Path) -> Result<Self, LevelTableError> {
        let contents = fs::read_to_string(path).map_err(|source| LevelTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = LevelTable::from_toml_str(&contents)?;
        info!(
            "loaded {} levels from {}",
            table.levels.len(),
            path.display()
        );
        Ok(table)
    }

    /// Exact lookup, `None` for unknown levels.
    pub fn get(&self, level: u32) -> Option<LevelConfig> {
        self.levels.get(&level).copied()
    }

    /// Lookup with fallback: unknown levels play with level 1's settings
    /// (the first level of the table if it has no level 1).
    ///
    /// # Examples
    /// ```
    /// use match3_engine::level::LevelTable;
    /// let table = LevelTable::default();
    /// assert_eq!(table.config_for(3).target_score, 1200);
    /// assert_eq!(table.config_for(42), table.config_for(1));
    /// ```
    pub fn config_for(&self, level: u32) -> LevelConfig {
        if let Some(config) = self.get(level) {
            return config;
        }
        warn!("no config for level {}, falling back to level 1", level);
        self.get(1)
            .or_else(|| self.levels.values().next().copied())
            .unwrap_or(LevelConfig {
                moves_allowed: DEFAULT_LEVELS[0].1,
                target_score: DEFAULT_LEVELS[0].2,
            })
    }

    /// Highest level number of the table.
    pub fn final_level(&self) -> u32 {
        self.levels.keys().next_back().copied().unwrap_or(1)
    }

    /// The level played after `level`, if the table has one.
    pub fn next_level(&self, level: u32) -> Option<u32> {
        self.levels
            .range(level.saturating_add(1)..)
            .next()
            .map(|(&number, _)| number)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        let levels = DEFAULT_LEVELS
            .iter()
            .map(|&(number, moves_allowed, target_score)| {
                (
                    number,
                    LevelConfig {
                        moves_allowed,
                        target_score,
                    },
                )
            })
            .collect();
        LevelTable { levels }
    }
}

/// Where a level attempt currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No level loaded, or the engine was torn down.
    Idle,
    /// Level loaded, waiting for the host to open the start gate.
    Ready,
    /// The player may submit a move.
    AwaitingInput,
    /// A move's cascade is in progress; input is locked.
    Resolving,
    /// Target score reached. Terminal.
    LevelComplete,
    /// Moves exhausted below the target. Terminal.
    GameOver,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::LevelComplete | Phase::GameOver)
    }
}

/// Score, moves and combo of one attempt at one level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunState {
    pub level: u32,
    pub score: u32,
    pub moves_left: u32,
    pub combo: u32,
    pub target_score: u32,
    pub phase: Phase,
}

impl RunState {
    /// Fresh state for `level`, waiting at the start gate.
    pub fn new(level: u32, config: LevelConfig) -> Self {
        RunState {
            level,
            score: 0,
            moves_left: config.moves_allowed,
            combo: 0,
            target_score: config.target_score,
            phase: Phase::Ready,
        }
    }

    /// `Ready` → `AwaitingInput`. Returns `false` from any other phase.
    pub fn open_gate(&mut self) -> bool {
        if self.phase != Phase::Ready {
            return false;
        }
        self.phase = Phase::AwaitingInput;
        true
    }

    /// Starts an accepted move: resets the combo, spends one move and locks
    /// input. Returns `false` (and changes nothing) outside `AwaitingInput`.
    pub fn begin_move(&mut self) -> bool {
        if self.phase != Phase::AwaitingInput {
            return false;
        }
        self.combo = 0;
        self.moves_left = self.moves_left.saturating_sub(1);
        self.phase = Phase::Resolving;
        true
    }

    /// Adds a cascade batch's points.
    pub fn add_points(&mut self, points: u32, combo: u32) {
        self.score = self.score.saturating_add(points);
        self.combo = combo;
    }

    /// Decides the phase once a cascade has settled.
    ///
    /// The target is checked first, so reaching it on the last move still
    /// completes the level.
    pub fn settle(&mut self) -> Phase {
        self.phase = if self.score >= self.target_score {
            Phase::LevelComplete
        } else if self.moves_left == 0 {
            Phase::GameOver
        } else {
            Phase::AwaitingInput
        };
        self.phase
    }
}
