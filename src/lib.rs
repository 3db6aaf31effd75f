//! # Match-3 Engine Library
//!
//! This library provides the rules engine of a tile-swapping match-3 puzzle
//! game: a square grid of colored tiles, matching of horizontal and vertical
//! runs, cascades with combo scoring, and a per-level state machine with a
//! move budget and a target score. It renders nothing; a host drives it
//! through `engine::Engine` and listens through `events::EngineListener`.
//!
//! It is used by three binaries:
//! - `human_player`: Interactive play on the command line.
//! - `autoplay`: Plays a run with one of the move strategies and reports
//!   every move.
//! - `heuristic_evaluator`: Compares the move strategies over many seeds.
//!
//! ## Modules
//! - `engine`: The `Engine` facade, its configuration and move outcomes.
//! - `grid`: The board (`Grid`), match detection, gravity, refill and the
//!   start-of-level repair pass.
//! - `resolver`: The cascade loop and the scoring rule.
//! - `level`: Level tables (built in or loaded from TOML) and the per-level
//!   state machine.
//! - `palette`: Tile colors and tile sources (seeded random or scripted).
//! - `events`: The listener contract and a recording listener.
//! - `heuristics`: Legal move enumeration and move selection strategies.
//! - `utils`: Text layouts of grids.
//! - `error`: Error types of the configuration boundary.
//! - `logging`: log4rs setup used by the binaries.

pub mod engine;
pub mod error;
pub mod events;
pub mod grid;
pub mod heuristics;
pub mod level;
pub mod logging;
pub mod palette;
pub mod resolver;
pub mod utils;
