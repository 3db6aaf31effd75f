//! Error types for the configuration boundary of the engine.
//!
//! Nothing that happens during play is an error: invalid moves, unknown
//! levels and re-entrant submissions all degrade to defined fallbacks.
//! The types here only cover building an engine, loading level tables and
//! parsing text layouts.

use std::path::PathBuf;
use thiserror::Error;

/// Rejected `EngineConfig` values and host-supplied layouts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("layout is {got}x{got} but the engine plays on {expected}x{expected}")]
    LayoutSize { expected: usize, got: usize },

    #[error("layout uses colors outside the palette")]
    LayoutColors,

    #[error("grid size must be at least {min}, got {got}")]
    GridTooSmall { min: usize, got: usize },

    #[error("palette size must be between {min} and {max}, got {got}")]
    PaletteSize { min: usize, max: usize, got: usize },
}

/// Failures while building a `LevelTable`.
#[derive(Debug, Error)]
pub enum LevelTableError {
    #[error("failed to read level table {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse level table toml")]
    Toml(#[from] toml::de::Error),

    #[error("level table has no levels")]
    Empty,

    #[error("level number must be at least 1")]
    ZeroLevel,

    #[error("level {0} allows no moves")]
    NoMoves(u32),

    #[error("level {0} is defined more than once")]
    Duplicate(u32),
}

/// Failures while parsing a grid from rows of palette letters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridParseError {
    #[error("layout has no rows")]
    Empty,

    /// Layouts are square, so every row must be as long as there are rows.
    #[error("row {row} has {found} cells, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unrecognized character '{ch}' in row {row} col {col}")]
    UnknownLetter { ch: char, row: usize, col: usize },
}
