use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::{Address, B256, U256};
use auto_impl::auto_impl;

use super::{Precompile, Precompiles};
use crate::constants::limits::{CALL_DEPTH_LIMIT, MAX_CODE_SIZE, MAX_INITCODE_SIZE};

/// The chain id used when none is configured.
pub const DEFAULT_CHAIN_ID: u64 = 900;

/// The block a transaction executes in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEnv {
    /// Block number.
    pub number: u64,
    /// The beneficiary of priority fees.
    pub coinbase: Address,
    /// Block timestamp in seconds.
    pub timestamp: u64,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Base fee per gas (EIP-1559).
    pub basefee: u64,
    /// `PREVRANDAO` (EIP-4399).
    pub prevrandao: B256,
}

impl Default for BlockEnv {
    fn default() -> Self {
        Self {
            number: 0,
            coinbase: Address::ZERO,
            timestamp: 0,
            gas_limit: 30_000_000,
            basefee: 0,
            prevrandao: B256::ZERO,
        }
    }
}

/// The transaction-wide part of the execution environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxEnv {
    /// `ORIGIN`.
    pub origin: Address,
    /// `GASPRICE`: the effective gas price.
    pub gas_price: U256,
}

/// Access to the hashes of recent blocks for `BLOCKHASH`.
#[auto_impl(&, Box, Arc)]
pub trait BlockHashes {
    /// The hash of block `number`, if known.
    fn block_hash(&self, number: u64) -> Option<B256>;
}

/// No block history: every `BLOCKHASH` reads zero.
impl BlockHashes for () {
    fn block_hash(&self, _number: u64) -> Option<B256> {
        None
    }
}

impl BlockHashes for BTreeMap<u64, B256> {
    fn block_hash(&self, number: u64) -> Option<B256> {
        self.get(&number).copied()
    }
}

/// Execution parameters that stay fixed for a session.
#[derive(derive_more::Debug, Clone)]
pub struct EvmConfig {
    /// `CHAINID`.
    pub chain_id: u64,
    /// Maximum depth of nested frames.
    pub call_depth_limit: usize,
    /// Maximum size of deployed code (EIP-170).
    pub max_code_size: usize,
    /// Maximum size of init code (EIP-3860).
    pub max_initcode_size: usize,
    /// The precompiles, native ones included.
    #[debug(ignore)]
    pub precompiles: Precompiles,
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            call_depth_limit: CALL_DEPTH_LIMIT,
            max_code_size: MAX_CODE_SIZE,
            max_initcode_size: MAX_INITCODE_SIZE,
            precompiles: Precompiles::native(),
        }
    }
}

impl EvmConfig {
    /// Sets the chain id.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Registers a custom precompile, replacing whatever was at `address`.
    pub fn with_precompile(mut self, address: Address, precompile: Arc<dyn Precompile>) -> Self {
        self.precompiles.insert(address, precompile);
        self
    }
}
