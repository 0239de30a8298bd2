use std::{str::FromStr, time::Duration};

use alloy_primitives::{Address, U256};

use crate::{evm::DEFAULT_CHAIN_ID, fork::ForkConfig, EvmConfig};

/// The base fee of every local block, 1 gwei.
pub const DEFAULT_BASE_FEE: u64 = 1_000_000_000;

/// The gas limit of every local block.
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 30_000_000;

/// When pending transactions are mined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MiningMode {
    /// Every transaction is mined into its own block as soon as it is sent.
    #[default]
    Auto,
    /// Transactions wait in the pool until a block is mined explicitly.
    Manual,
    /// A block is mined every interval, whether or not transactions are pending.
    Interval(Duration),
}

impl FromStr for MiningMode {
    type Err = String;

    /// Parses `auto`, `manual`, or an interval in milliseconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            millis => match millis.parse::<u64>() {
                Ok(0) => Err("mining interval must be positive".to_string()),
                Ok(millis) => Ok(Self::Interval(Duration::from_millis(millis))),
                Err(_) => Err(format!("invalid mining mode: {s}")),
            },
        }
    }
}

/// Configuration of a [`Node`](super::Node).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// When transactions are mined.
    pub mining: MiningMode,
    /// The beneficiary of every block.
    pub coinbase: Address,
    /// The gas limit of every block.
    pub gas_limit: u64,
    /// The base fee of every block.
    pub base_fee: u64,
    /// The chain id. Overrides the one in [`evm`](Self::evm).
    pub chain_id: u64,
    /// The upstream to fork, if any.
    pub fork: Option<ForkConfig>,
    /// Balances credited before the first block.
    pub accounts: Vec<(Address, U256)>,
    /// Execution parameters and custom precompiles.
    pub evm: EvmConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mining: MiningMode::Auto,
            coinbase: Address::ZERO,
            gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            base_fee: DEFAULT_BASE_FEE,
            chain_id: DEFAULT_CHAIN_ID,
            fork: None,
            accounts: Vec::new(),
            evm: EvmConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Sets the mining mode.
    pub fn with_mining(mut self, mining: MiningMode) -> Self {
        self.mining = mining;
        self
    }

    /// Forks `fork`.
    pub fn with_fork(mut self, fork: ForkConfig) -> Self {
        self.fork = Some(fork);
        self
    }

    /// Credits `balance` to `address` before the first block.
    pub fn with_account(mut self, address: Address, balance: U256) -> Self {
        self.accounts.push((address, balance));
        self
    }
}
