use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;
use match3_engine::engine::{Advance, Engine, EngineConfig, MoveOutcome};
use match3_engine::events::{EngineEvent, EventRecorder};
use match3_engine::heuristics::Strategy;
use match3_engine::level::{LevelTable, Phase};
use match3_engine::logging::init_log;
use match3_engine::utils::grid_from_text;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Let a move strategy play the game", long_about = None)]
struct Args {
    /// Move strategy: MIS, LOW or FIRST
    #[clap(short = 't', long, default_value = "MIS")]
    strategy: Strategy,

    /// Seed for tile generation
    #[clap(short, long, default_value_t = 0)]
    seed: u64,

    /// Level to start at
    #[clap(short, long, default_value_t = 1)]
    level: u32,

    /// TOML level table replacing the built-in levels
    #[clap(long)]
    levels: Option<PathBuf>,

    /// Text layout for the first level (one row of color letters per line)
    layout_file: Option<PathBuf>,

    /// Only print the summary
    #[clap(short, long)]
    quiet: bool,

    /// Log level
    #[clap(long, default_value = "warn")]
    log_level: LevelFilter,

    /// Write logs to this file instead of stderr
    #[clap(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_log(args.log_level, args.log_file.as_deref())?;

    let levels = match &args.levels {
        Some(path) => LevelTable::load(path)?,
        None => LevelTable::default(),
    };
    let config = EngineConfig {
        seed: Some(args.seed),
        levels,
        ..EngineConfig::default()
    };
    let (recorder, log) = EventRecorder::new();
    let mut engine = Engine::new(config, Box::new(recorder))?;

    match &args.layout_file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read layout {}", path.display()))?;
            let grid = grid_from_text(&text, engine.palette())
                .with_context(|| format!("invalid layout {}", path.display()))?;
            engine
                .start_level_with_grid(args.level, "orange", grid)
                .with_context(|| format!("layout {} does not fit the engine", path.display()))?;
            println!("Loaded layout from {}", path.display());
        }
        None => engine.start_level(args.level, "orange"),
    }
    println!("Playing with strategy {} (seed {})\n", args.strategy, args.seed);

    let mut levels_cleared = 0;
    let mut total_score = 0;
    loop {
        match engine.phase() {
            Phase::Ready => {
                if !args.quiet {
                    println!(
                        "Level {}: {} points in {} moves",
                        engine.level(),
                        engine.target_score(),
                        engine.moves_left()
                    );
                    if let Some(grid) = engine.grid() {
                        println!("{}", grid);
                    }
                }
                engine.open_gate();
            }
            Phase::AwaitingInput => {
                let Some(grid) = engine.grid() else {
                    bail!("engine lost its grid while awaiting input");
                };
                let Some(mv) = args.strategy.choose(grid) else {
                    println!("  Board is stuck at level {}.", engine.level());
                    total_score += engine.score();
                    break;
                };
                let moves_left = engine.moves_left();
                match engine.submit_move(mv.from, mv.to) {
                    MoveOutcome::Resolved(report) => {
                        if !args.quiet {
                            println!(
                                "  Move {:>2}: {} <-> {}  +{:<5} ({} batches, score {})",
                                moves_left,
                                mv.from,
                                mv.to,
                                report.total_points(),
                                report.batches.len(),
                                engine.score()
                            );
                        }
                    }
                    outcome => bail!(
                        "strategy {} chose {} <-> {}, which the engine refused: {:?}",
                        args.strategy,
                        mv.from,
                        mv.to,
                        outcome
                    ),
                }
            }
            Phase::LevelComplete => {
                levels_cleared += 1;
                total_score += engine.score();
                match engine.advance() {
                    Some(Advance::NextLevel(_)) => {}
                    Some(Advance::RunComplete) | None => break,
                }
            }
            Phase::GameOver => {
                total_score += engine.score();
                break;
            }
            Phase::Resolving | Phase::Idle => break,
        }
    }

    if !args.quiet {
        println!("\nEvents:");
        for event in log.borrow().iter() {
            if let EngineEvent::LevelComplete { .. } | EngineEvent::GameOver(_) = event {
                println!("  {:?}", event);
            }
        }
    }
    println!("\nLevels cleared: {}", levels_cleared);
    println!("Total score: {}", total_score);
    engine.teardown();
    Ok(())
}
