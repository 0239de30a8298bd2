//! Logging configuration for the fork-evme CLI tool.
//!
//! `RUST_LOG` takes precedence. Otherwise `-v` flags raise the level of the `fork_evm` and
//! `fork_evme` targets, starting from no logging at all.

use std::{fs::File, path::PathBuf};

use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use super::{EvmeError, Result};

/// Logging configuration arguments.
#[derive(Debug, Clone, Default, Parser)]
#[command(next_help_heading = "Logging Options")]
pub struct LogArgs {
    /// Increase logging verbosity (-v = error, -vv = warn, -vvv = info, -vvvv = debug, -vvvvv =
    /// trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log file path. If specified, logs are written to this file instead of stderr.
    #[arg(long = "log.file", visible_aliases = ["log-file"], global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable colorful console logging. Only applies when logging to stderr (no --log.file).
    #[arg(long = "log.no-color", visible_aliases = ["log-no-color"], global = true)]
    pub log_no_color: bool,
}

impl LogArgs {
    /// The filter selected by `RUST_LOG` or the verbosity flags.
    pub fn filter(&self) -> EnvFilter {
        if std::env::var("RUST_LOG").is_ok() {
            return EnvFilter::from_default_env();
        }
        match self.level() {
            Some(level) => EnvFilter::new(format!("fork_evme={level},fork_evm={level}")),
            None => EnvFilter::new("off"),
        }
    }

    fn level(&self) -> Option<Level> {
        match self.verbose {
            0 => None,
            1 => Some(Level::ERROR),
            2 => Some(Level::WARN),
            3 => Some(Level::INFO),
            4 => Some(Level::DEBUG),
            _ => Some(Level::TRACE),
        }
    }

    /// Installs the global tracing subscriber.
    ///
    /// Log targets are only shown from `-vvvv` on. Logs written to a file never carry ANSI
    /// colors.
    pub fn init(&self) -> Result<()> {
        let show_target = self.verbose >= 4;
        let builder = fmt().with_env_filter(self.filter()).with_target(show_target);
        let installed = match &self.log_file {
            Some(path) => {
                let file = File::create(path)?;
                builder.with_writer(file).with_ansi(false).try_init()
            }
            None => builder.with_writer(std::io::stderr).with_ansi(!self.log_no_color).try_init(),
        };
        installed.map_err(|e| EvmeError::Other(format!("failed to install logger: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let args = |verbose| LogArgs { verbose, ..Default::default() };
        assert_eq!(args(0).level(), None);
        assert_eq!(args(1).level(), Some(Level::ERROR));
        assert_eq!(args(3).level(), Some(Level::INFO));
        assert_eq!(args(9).level(), Some(Level::TRACE));
    }
}
