use std::time::Duration;

use clap::Parser;
use fork_evm::fork::{BlockRef, ForkConfig, ForkMode};
use tracing::debug;

/// Upstream configuration arguments
#[derive(Parser, Debug, Clone)]
#[command(next_help_heading = "Fork Options")]
pub struct ForkArgs {
    /// Fork state from a remote RPC endpoint.
    #[arg(long = "fork")]
    pub fork: bool,

    /// Block to fork from: `latest`, a number, or a block hash. Only used if `fork` is true.
    #[arg(long = "fork.block", default_value = "latest")]
    pub fork_block: BlockRef,

    /// RPC URL to use for the fork. Only used if `fork` is true.
    #[arg(long = "fork.rpc", default_value = "http://localhost:8545", env = "RPC_URL")]
    pub fork_rpc: String,

    /// Follow the upstream head instead of pinning `fork.block`, re-checking the head at most
    /// once per the given number of milliseconds.
    #[arg(long = "fork.proxy", value_name = "BLOCK_TIME_MS")]
    pub proxy: Option<u64>,
}

impl ForkArgs {
    /// The upstream configuration, if forking is enabled.
    pub fn config(&self) -> Option<ForkConfig> {
        if !self.fork {
            debug!("No forking state specified");
            return None;
        }
        let mode = match self.proxy {
            Some(millis) => {
                ForkMode::Proxy { expected_block_time: Duration::from_millis(millis) }
            }
            None => ForkMode::Fork,
        };
        debug!(rpc_url = %self.fork_rpc, block = %self.fork_block, ?mode, "Forking state from RPC");
        Some(ForkConfig { mode, ..ForkConfig::new(self.fork_rpc.clone(), self.fork_block) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    struct Args {
        #[command(flatten)]
        fork: ForkArgs,
    }

    #[test]
    fn test_fork_disabled_by_default() {
        let args = Args::parse_from(["test"]);
        assert!(args.fork.config().is_none());
    }

    #[test]
    fn test_fork_config() {
        let args = Args::parse_from([
            "test",
            "--fork",
            "--fork.rpc",
            "http://node:8545",
            "--fork.block",
            "0x10",
        ]);
        let config = args.fork.config().unwrap();
        assert_eq!(config.url, "http://node:8545");
        assert_eq!(config.block, BlockRef::Number(16));
        assert_eq!(config.mode, ForkMode::Fork);

        let args = Args::parse_from(["test", "--fork", "--fork.proxy", "2000"]);
        assert_eq!(
            args.fork.config().unwrap().mode,
            ForkMode::Proxy { expected_block_time: Duration::from_millis(2000) }
        );
    }
}
