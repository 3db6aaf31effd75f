use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use match3_engine::engine::{Advance, Engine, EngineConfig, MoveOutcome};
use match3_engine::events::EngineListener;
use match3_engine::grid::Pos;
use match3_engine::level::{LevelTable, Phase};
use match3_engine::logging::init_log;
use match3_engine::utils::grid_from_text;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Play the match-3 game in the terminal", long_about = None)]
struct Args {
    /// Level to start at
    #[clap(short, long, default_value_t = 1)]
    level: u32,

    /// Skin (a palette color name)
    #[clap(long, default_value = "orange")]
    skin: String,

    /// Seed for tile generation; random when omitted
    #[clap(short, long)]
    seed: Option<u64>,

    /// TOML level table replacing the built-in levels
    #[clap(long)]
    levels: Option<PathBuf>,

    /// Text layout for the first level (one row of color letters per line)
    #[clap(long)]
    layout: Option<PathBuf>,

    /// Log level
    #[clap(long, default_value = "warn")]
    log_level: LevelFilter,

    /// Write logs to this file instead of stderr
    #[clap(long)]
    log_file: Option<PathBuf>,
}

/// Prints engine notifications as they happen.
struct Announcer;

impl EngineListener for Announcer {
    fn on_score_update(&mut self, score: u32) {
        if score > 0 {
            println!("  Score: {}", score);
        }
    }

    fn on_level_complete(&mut self, level: u32, score: u32, is_final_level: bool) {
        if is_final_level {
            println!("🏆 All levels cleared! Level {} finished with {} points.", level, score);
        } else {
            println!("🎉 Level {} complete with {} points!", level, score);
        }
    }

    fn on_game_over(&mut self, score: u32) {
        println!("💥 Out of moves. Final score: {}", score);
    }
}

fn prompt(text: &str) -> Result<Option<String>> {
    print!("{}", text);
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

fn confirm(text: &str) -> Result<bool> {
    Ok(matches!(prompt(text)?.as_deref(), Some("y") | Some("Y") | Some("")))
}

fn parse_move(input: &str) -> Option<(Pos, Pos)> {
    let numbers: Vec<usize> = input
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match numbers.as_slice() {
        &[r1, c1, r2, c2] => Some((Pos::new(r1, c1), Pos::new(r2, c2))),
        _ => None,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_log(args.log_level, args.log_file.as_deref())?;

    let levels = match &args.levels {
        Some(path) => LevelTable::load(path)?,
        None => LevelTable::default(),
    };
    let config = EngineConfig {
        seed: args.seed,
        levels,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config, Box::new(Announcer))?;

    match &args.layout {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read layout {}", path.display()))?;
            let grid = grid_from_text(&text, engine.palette())
                .with_context(|| format!("invalid layout {}", path.display()))?;
            engine.start_level_with_grid(args.level, &args.skin, grid)?;
        }
        None => engine.start_level(args.level, &args.skin),
    }
    println!("Welcome to Match-3!");

    loop {
        match engine.phase() {
            Phase::Ready => {
                println!(
                    "\n=== Level {}: reach {} points in {} moves ===",
                    engine.level(),
                    engine.target_score(),
                    engine.moves_left()
                );
                engine.open_gate();
            }
            Phase::LevelComplete => {
                if !confirm("Continue to the next level? [Y/n] ")? {
                    break;
                }
                if let Some(Advance::RunComplete) | None = engine.advance() {
                    break;
                }
            }
            Phase::GameOver => {
                if !confirm("Try again? [Y/n] ")? {
                    break;
                }
                engine.retry();
            }
            Phase::AwaitingInput => {
                println!("---------------------");
                println!(
                    "Level: {}, Moves left: {}, Score: {} / {}",
                    engine.level(),
                    engine.moves_left(),
                    engine.score(),
                    engine.target_score()
                );
                if let Some(grid) = engine.grid() {
                    println!("{}", grid);
                }
                if !engine.has_valid_move() {
                    println!("No moves left on this board.");
                    break;
                }

                let Some(input) =
                    prompt("Enter your move (r1 c1 r2 c2), 'h' for a hint, 'q' to quit: ")?
                else {
                    break;
                };
                match input.as_str() {
                    "q" => break,
                    "h" => {
                        if let Some(hint) = engine.hint() {
                            println!("Try swapping {} and {}.", hint.from, hint.to);
                            if let Some(grid) = engine.grid() {
                                println!("{}", grid.to_string_with_highlight(Some(hint.from)));
                            }
                        }
                    }
                    _ => match parse_move(&input) {
                        Some((a, b)) => match engine.submit_move(a, b) {
                            MoveOutcome::Resolved(report) => {
                                let chain = report.batches.len();
                                if chain > 1 {
                                    println!("  {}x combo!", chain);
                                }
                            }
                            MoveOutcome::Rejected(reason) => println!("Invalid move: {}.", reason),
                            MoveOutcome::Ignored => {}
                        },
                        None => println!(
                            "Invalid input format. Use 'r1 c1 r2 c2' (e.g. '3 4 3 5'), 'h' or 'q'."
                        ),
                    },
                }
            }
            Phase::Resolving | Phase::Idle => break,
        }
    }

    println!("Thanks for playing!");
    engine.teardown();
    Ok(())
}
