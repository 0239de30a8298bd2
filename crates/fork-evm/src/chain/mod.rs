//! The local chain of a session: sealed blocks, mined transactions and per-block world
//! snapshots.

use std::collections::HashMap;

use alloy_consensus::{Header, Receipt, ReceiptWithBloom, EMPTY_OMMER_ROOT_HASH};
use alloy_primitives::{Address, Log, B256};
use alloy_trie::EMPTY_ROOT_HASH;

use crate::{
    evm::{BlockEnv, BlockHashes, ExecutionResult},
    runner::Transaction,
    trie::{MerkleTrie, WorldState},
};

/// A block of the local chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlock {
    /// The header.
    pub header: Header,
    /// `keccak256(rlp(header))`.
    pub hash: B256,
    /// Hashes of the block's transactions, in order.
    pub transactions: Vec<B256>,
}

impl SealedBlock {
    /// Seals `header`.
    pub fn new(header: Header, transactions: Vec<B256>) -> Self {
        Self { hash: header.hash_slow(), header, transactions }
    }

    /// The number.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// The environment the block's transactions ran in.
    pub fn env(&self) -> BlockEnv {
        BlockEnv {
            number: self.header.number,
            coinbase: self.header.beneficiary,
            timestamp: self.header.timestamp,
            gas_limit: self.header.gas_limit,
            basefee: self.header.base_fee_per_gas.unwrap_or_default(),
            prevrandao: self.header.mix_hash,
        }
    }
}

/// A transaction included in the local chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinedTransaction {
    /// The transaction hash.
    pub hash: B256,
    /// The transaction, with the nonce it used.
    pub transaction: Transaction,
    /// The including block.
    pub block_number: u64,
    /// Hash of the including block.
    pub block_hash: B256,
    /// Position in the block.
    pub index: usize,
    /// The price paid per gas.
    pub gas_price: u128,
    /// The execution result.
    pub result: ExecutionResult,
    /// The receipt, with the block's cumulative gas.
    pub receipt: ReceiptWithBloom<Receipt<Log>>,
}

impl MinedTransaction {
    /// The sender.
    pub fn from(&self) -> Address {
        self.transaction.caller
    }

    /// The created contract, for a successful creation.
    pub fn contract_address(&self) -> Option<Address> {
        match &self.result {
            ExecutionResult::Success { output, .. } => output.address(),
            _ => None,
        }
    }
}

/// Computes the transactions root over the transaction hashes.
pub fn transactions_root(hashes: &[B256]) -> B256 {
    if hashes.is_empty() {
        return EMPTY_ROOT_HASH;
    }
    let mut trie = MerkleTrie::new();
    for (index, hash) in hashes.iter().enumerate() {
        trie.insert(&alloy_rlp::encode(index), alloy_rlp::encode(hash));
    }
    trie.root()
}

/// The blocks of a session, starting at a genesis that is either block zero or the forked
/// block.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<SealedBlock>,
    by_hash: HashMap<B256, u64>,
    transactions: HashMap<B256, MinedTransaction>,
    /// The world state each block was executed against, by number.
    worlds: HashMap<u64, WorldState>,
}

impl Blockchain {
    /// Creates a chain whose first block is `genesis`, with `world` as its state.
    pub fn new(genesis: Header, world: WorldState) -> Self {
        let block = SealedBlock::new(genesis, Vec::new());
        let mut chain = Self {
            blocks: Vec::new(),
            by_hash: HashMap::new(),
            transactions: HashMap::new(),
            worlds: HashMap::new(),
        };
        chain.insert(block, world);
        chain
    }

    /// A genesis header for a chain starting at `number`.
    pub fn genesis_header(
        number: u64,
        timestamp: u64,
        gas_limit: u64,
        state_root: B256,
    ) -> Header {
        Header {
            number,
            timestamp,
            gas_limit,
            state_root,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            transactions_root: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            ..Default::default()
        }
    }

    fn insert(&mut self, block: SealedBlock, world: WorldState) {
        self.by_hash.insert(block.hash, block.number());
        self.worlds.insert(block.number(), world);
        self.blocks.push(block);
    }

    /// The most recent block.
    pub fn latest(&self) -> &SealedBlock {
        // The genesis block is inserted on construction and blocks are never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    /// The first block.
    pub fn genesis(&self) -> &SealedBlock {
        &self.blocks[0]
    }

    /// Appends a block with its transactions and the world state it was executed against.
    ///
    /// # Panics
    ///
    /// Panics if the header does not extend the latest block.
    pub fn push(
        &mut self,
        header: Header,
        transactions: Vec<MinedTransaction>,
        world: WorldState,
    ) -> &SealedBlock {
        let latest = self.latest();
        assert_eq!(header.number, latest.number() + 1, "block does not extend the chain");
        assert_eq!(header.parent_hash, latest.hash, "block does not extend the chain");

        let block = SealedBlock::new(header, transactions.iter().map(|tx| tx.hash).collect());
        for mut tx in transactions {
            tx.block_hash = block.hash;
            self.transactions.insert(tx.hash, tx);
        }
        self.insert(block, world);
        self.latest()
    }

    /// A block by number.
    pub fn block_by_number(&self, number: u64) -> Option<&SealedBlock> {
        let index = number.checked_sub(self.genesis().number())?;
        self.blocks.get(usize::try_from(index).ok()?)
    }

    /// A block by hash.
    pub fn block_by_hash(&self, hash: B256) -> Option<&SealedBlock> {
        self.block_by_number(*self.by_hash.get(&hash)?)
    }

    /// A mined transaction by hash.
    pub fn transaction(&self, hash: B256) -> Option<&MinedTransaction> {
        self.transactions.get(&hash)
    }

    /// The world state block `number` was executed against. For the first block, its own
    /// state.
    pub fn world_at(&self, number: u64) -> Option<&WorldState> {
        self.worlds.get(&number)
    }
}

impl BlockHashes for Blockchain {
    fn block_hash(&self, number: u64) -> Option<B256> {
        self.block_by_number(number).map(|block| block.hash)
    }
}
