//! log4rs setup for the binaries.
//!
//! The library itself only talks to the `log` facade; hosts decide where the
//! records go. `init_log` is what the bundled binaries use.
use anyhow::{Context, Result};
use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use std::path::Path;

const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} {t} {m}{n}";
const CONSOLE_PATTERN: &str = "{h({l})} {t} {m}{n}";

/// Installs the global logger.
///
/// Records at `level` and above go to `file` when given (appending, with a
/// timestamp on every line), otherwise to stderr so they never mix with the
/// board printed on stdout.
///
/// # Errors
/// Fails if the log file cannot be opened or a logger is already installed.
pub fn init_log(level: LevelFilter, file: Option<&Path>) -> Result<()> {
    let appender = match file {
        Some(path) => {
            let logfile = FileAppender::builder()
                .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
                .build(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("main", Box::new(logfile))
        }
        None => {
            let console = ConsoleAppender::builder()
                .target(Target::Stderr)
                .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
                .build();
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("main", Box::new(console))
        }
    };

    let config = Config::builder()
        .appender(appender)
        .build(Root::builder().appender("main").build(level))
        .context("invalid log configuration")?;
    log4rs::init_config(config).context("a logger is already installed")?;
    Ok(())
}
