use anyhow::{bail, Result};
use clap::Parser;
use log::{debug, LevelFilter};
use match3_engine::engine::{Advance, Engine, EngineConfig, MoveOutcome};
use match3_engine::events::NullListener;
use match3_engine::heuristics::Strategy;
use match3_engine::level::{LevelTable, Phase};
use match3_engine::logging::init_log;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Compare move strategies over many seeded runs", long_about = None)]
struct Args {
    /// Number of seeded runs per strategy
    #[clap(short, long, default_value_t = 20)]
    runs: u64,

    /// First seed; runs use consecutive seeds
    #[clap(short, long, default_value_t = 0)]
    start_seed: u64,

    /// TOML level table replacing the built-in levels
    #[clap(long)]
    levels: Option<PathBuf>,

    /// Log level
    #[clap(long, default_value = "warn")]
    log_level: LevelFilter,
}

/// How far one run got.
#[derive(Clone, Copy, Debug, Default)]
struct RunResult {
    levels_cleared: u32,
    total_score: u32,
    moves_played: u32,
}

/// Plays from level 1 until the run is complete, a level is lost or the
/// board is stuck.
fn play_run(config: EngineConfig, strategy: Strategy) -> Result<RunResult> {
    let mut engine = Engine::new(config, Box::new(NullListener))?;
    let mut result = RunResult::default();
    engine.start_level(1, "orange");

    loop {
        match engine.phase() {
            Phase::Ready => {
                engine.open_gate();
            }
            Phase::AwaitingInput => {
                let Some(mv) = engine.grid().and_then(|grid| strategy.choose(grid)) else {
                    debug!("{}: board stuck at level {}", strategy, engine.level());
                    result.total_score += engine.score();
                    break;
                };
                match engine.submit_move(mv.from, mv.to) {
                    MoveOutcome::Resolved(_) => result.moves_played += 1,
                    outcome => bail!("{} chose a move the engine refused: {:?}", strategy, outcome),
                }
            }
            Phase::LevelComplete => {
                result.levels_cleared += 1;
                result.total_score += engine.score();
                if let Some(Advance::RunComplete) | None = engine.advance() {
                    break;
                }
            }
            Phase::GameOver => {
                result.total_score += engine.score();
                break;
            }
            Phase::Resolving | Phase::Idle => break,
        }
    }
    Ok(result)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_log(args.log_level, None)?;

    let levels = match &args.levels {
        Some(path) => LevelTable::load(path)?,
        None => LevelTable::default(),
    };

    let mut all_results: HashMap<Strategy, Vec<RunResult>> = HashMap::new();
    println!("Starting heuristic evaluation for {} runs...", args.runs);

    for run in 0..args.runs {
        let seed = args.start_seed + run;
        println!("\nRun {} (Seed: {})", run, seed);

        for strategy in Strategy::ALL {
            let config = EngineConfig {
                seed: Some(seed),
                levels: levels.clone(),
                ..EngineConfig::default()
            };
            let result = play_run(config, strategy)?;
            println!(
                "  Strategy: {:<6}, Levels: {:<3}, Score: {:<7}, Moves: {}",
                strategy.name(),
                result.levels_cleared,
                result.total_score,
                result.moves_played
            );
            all_results.entry(strategy).or_default().push(result);
        }
    }

    println!("\n--- Evaluation Complete ---");
    println!("Runs per strategy: {}", args.runs);
    println!("\n--- Averages ---");

    let mut averages: Vec<(Strategy, f64, f64)> = all_results
        .iter()
        .filter(|(_, results)| !results.is_empty())
        .map(|(&strategy, results)| {
            let n = results.len() as f64;
            let levels: u32 = results.iter().map(|r| r.levels_cleared).sum();
            let score: u32 = results.iter().map(|r| r.total_score).sum();
            (strategy, levels as f64 / n, score as f64 / n)
        })
        .collect();

    // Most levels first, then highest score.
    averages.sort_by(|a, b| b.1.total_cmp(&a.1).then(b.2.total_cmp(&a.2)));

    for (strategy, levels, score) in averages {
        println!(
            "Strategy {:<6}: Average Levels = {:.2}, Average Score = {:.2}",
            strategy.name(),
            levels,
            score
        );
    }
    Ok(())
}
