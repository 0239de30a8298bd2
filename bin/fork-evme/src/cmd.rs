use clap::{Parser, Subcommand};

use crate::common::{EvmeError, LogArgs};

/// Executable EVM with lazy forking of a remote chain
#[derive(Parser, Debug)]
#[command(infer_subcommands = true, version)]
pub struct MainCmd {
    /// The command to run
    #[command(subcommand)]
    pub command: Command,

    /// Logging configuration
    #[command(flatten)]
    pub log_args: LogArgs,
}

/// Subcommands of the fork-evme CLI tool
#[derive(Subcommand, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Command {
    /// Run arbitrary EVM bytecode
    Run(crate::run::Cmd),
    /// Serve JSON-RPC requests read line by line from stdin
    Rpc(crate::rpc::Cmd),
}

/// Error types for the main command system
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Evme error (used by every subcommand)
    #[error("{0}")]
    Evme(#[from] EvmeError),
}

impl MainCmd {
    /// Execute the main command
    pub async fn run(&self) -> Result<(), Error> {
        match &self.command {
            Command::Run(cmd) => cmd.run().await?,
            Command::Rpc(cmd) => cmd.run().await?,
        }
        Ok(())
    }
}
