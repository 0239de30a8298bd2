//! A single-session node: one state manager, the local chain and a pool of pending
//! transactions behind a mutex, so requests are applied one at a time.

mod config;
pub use config::*;

mod error;
pub use error::NodeError;

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Weak},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use alloy_consensus::{Header, EMPTY_OMMER_ROOT_HASH};
use alloy_primitives::{Address, B256, U256};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    chain::{transactions_root, Blockchain, MinedTransaction, SealedBlock},
    evm::{BlockEnv, NoOpInspector},
    fork::{BlockingBridge, ForkMode},
    runner::{
        run_block, run_call, run_tx, BlockContext, BlockInput, RunBlockError, Transaction,
        TxError, TxOutcome,
    },
    state::StateDump,
    tracers::{trace_call, TraceResult, TracerKind},
    AccountFields, DynStateManager, EvmConfig, ForkStateManager, NormalStateManager,
    ProxyStateManager, StateError, StateReader, StateWriter,
};

/// Changes to apply to an account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountUpdate {
    /// Nonce, balance and code.
    pub fields: AccountFields,
    /// Replaces the whole storage of the account.
    pub state: Option<BTreeMap<U256, U256>>,
    /// Slots to overwrite, keeping the rest of the storage.
    pub state_diff: Option<BTreeMap<U256, U256>>,
}

#[derive(Debug)]
struct PendingTransaction {
    hash: B256,
    tx: Transaction,
}

#[derive(Debug)]
struct Session {
    state: DynStateManager,
    chain: Blockchain,
    pool: VecDeque<PendingTransaction>,
}

/// The outcome of mining one block.
#[derive(Debug)]
struct Mined {
    /// `None` if nothing was left to include and empty blocks were not wanted.
    hash: Option<B256>,
    rejected: Vec<(B256, TxError)>,
}

/// A local chain on top of a normal, forked or proxied session.
#[derive(Debug)]
pub struct Node {
    config: NodeConfig,
    evm: EvmConfig,
    session: Mutex<Session>,
    miner: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Starts a node, connecting to the upstream when forking.
    ///
    /// A forked node borrows the ambient runtime for upstream requests if it is
    /// multi-threaded and starts its own otherwise. Interval mining needs an ambient
    /// runtime.
    pub async fn new(config: NodeConfig) -> Result<Arc<Self>, NodeError> {
        let Some(fork) = &config.fork else { return Self::local(config) };
        let bridge = BlockingBridge::current_or_new()?;
        let (state, number) = match fork.mode {
            ForkMode::Fork => {
                let state = ForkStateManager::fork(fork, bridge).await?;
                let number = state.fork_block();
                (state.boxed(), number)
            }
            ForkMode::Proxy { expected_block_time } => {
                let state = ProxyStateManager::proxy(fork, expected_block_time, bridge).await?;
                let number = state.fallback().block_number();
                (state.boxed(), number)
            }
        };
        Self::with_state(config, state, number)
    }

    /// Starts a node without an upstream.
    pub fn local(config: NodeConfig) -> Result<Arc<Self>, NodeError> {
        Self::with_state(config, NormalStateManager::new().boxed(), 0)
    }

    fn with_state(
        config: NodeConfig,
        mut state: DynStateManager,
        genesis_number: u64,
    ) -> Result<Arc<Self>, NodeError> {
        for (address, balance) in &config.accounts {
            state.modify_account_fields(
                *address,
                AccountFields { balance: Some(*balance), ..Default::default() },
            )?;
        }
        let state_root = state.flush()?;
        let header =
            Blockchain::genesis_header(genesis_number, unix_now(), config.gas_limit, state_root);
        let chain = Blockchain::new(header, state.world().clone());
        info!(
            target: "node",
            number = genesis_number,
            chain_id = config.chain_id,
            mining = ?config.mining,
            "Started node"
        );

        let evm = config.evm.clone().with_chain_id(config.chain_id);
        let node = Arc::new(Self {
            evm,
            session: Mutex::new(Session { state, chain, pool: VecDeque::new() }),
            miner: Mutex::new(None),
            config,
        });
        if let MiningMode::Interval(every) = node.config.mining {
            node.spawn_miner(every);
        }
        Ok(node)
    }

    fn spawn_miner(self: &Arc<Self>, every: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(target: "node", "No async runtime, interval mining disabled");
            return;
        };
        let node: Weak<Self> = Arc::downgrade(self);
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(node) = node.upgrade() else { break };
                if let Err(err) = node.mine(1) {
                    warn!(target: "node", %err, "Interval mining failed");
                }
            }
        });
        *self.miner.lock() = Some(task);
    }

    /// The configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The chain id.
    pub fn chain_id(&self) -> u64 {
        self.evm.chain_id
    }

    /// The number of the latest block.
    pub fn block_number(&self) -> u64 {
        self.session.lock().chain.latest().number()
    }

    /// A block by number.
    pub fn block(&self, number: u64) -> Option<SealedBlock> {
        self.session.lock().chain.block_by_number(number).cloned()
    }

    /// The number of transactions waiting to be mined.
    pub fn pending_transactions(&self) -> usize {
        self.session.lock().pool.len()
    }

    /// A mined transaction with its receipt.
    pub fn transaction(&self, hash: B256) -> Option<MinedTransaction> {
        self.session.lock().chain.transaction(hash).cloned()
    }

    /// Runs `f` against the latest state, with the upstream pinned. Writes stay pending until
    /// `f` flushes them.
    pub fn read_state<R>(
        &self,
        f: impl FnOnce(&mut DynStateManager) -> Result<R, StateError>,
    ) -> Result<R, NodeError> {
        let mut session = self.session.lock();
        let state = &mut session.state;
        state.lock()?;
        let result = f(state);
        state.unlock();
        Ok(result?)
    }

    /// Executes `tx` on top of the latest block without committing anything.
    pub fn call(&self, tx: &Transaction) -> Result<TxOutcome, NodeError> {
        self.with_pending_block(|state, ctx| Ok(run_call(state, ctx, tx, NoOpInspector)?))
    }

    /// Executes `tx` like [`call`](Self::call) under a tracer.
    pub fn trace_call(
        &self,
        tx: &Transaction,
        kind: TracerKind,
    ) -> Result<(TxOutcome, TraceResult), NodeError> {
        self.with_pending_block(|state, ctx| Ok(trace_call(state, ctx, tx, kind)?))
    }

    fn with_pending_block<R>(
        &self,
        f: impl FnOnce(&mut DynStateManager, BlockContext<'_>) -> Result<R, NodeError>,
    ) -> Result<R, NodeError> {
        let mut session = self.session.lock();
        let Session { state, chain, .. } = &mut *session;
        let block = self.next_block_env(chain);
        let ctx = BlockContext { config: &self.evm, block: &block, hashes: &*chain };
        state.lock()?;
        let result = f(state, ctx);
        state.unlock();
        result
    }

    /// Adds `tx` to the pool and returns its hash. A transaction without a nonce gets the
    /// next nonce of its sender, counting pending transactions.
    ///
    /// In [`MiningMode::Auto`] the transaction is mined right away, and rejected with an
    /// error if it is invalid.
    pub fn send_transaction(&self, mut tx: Transaction) -> Result<B256, NodeError> {
        let mut session = self.session.lock();
        let nonce = match tx.nonce {
            Some(nonce) => nonce,
            None => {
                let state = &mut session.state;
                state.lock()?;
                let account = state.get_account(tx.caller);
                state.unlock();
                let pending = session.pool.iter().filter(|p| p.tx.caller == tx.caller).count();
                account?.map_or(0, |account| account.nonce) + pending as u64
            }
        };
        tx.nonce = Some(nonce);
        let hash = tx.hash(nonce);
        debug!(target: "node", %hash, caller = %tx.caller, nonce, "Received transaction");
        session.pool.push_back(PendingTransaction { hash, tx });

        if self.config.mining == MiningMode::Auto {
            let mined = match self.mine_block(&mut session, false) {
                Ok(mined) => mined,
                Err(err) => {
                    session.pool.retain(|pending| pending.hash != hash);
                    return Err(err);
                }
            };
            if let Some((_, err)) = mined.rejected.into_iter().find(|(rejected, _)| *rejected == hash)
            {
                return Err(err.into());
            }
        }
        Ok(hash)
    }

    /// Mines `blocks` blocks from the pool and returns their hashes. Invalid pending
    /// transactions are dropped.
    pub fn mine(&self, blocks: u64) -> Result<Vec<B256>, NodeError> {
        let mut session = self.session.lock();
        let mut hashes = Vec::new();
        for _ in 0..blocks {
            hashes.extend(self.mine_block(&mut session, true)?.hash);
        }
        Ok(hashes)
    }

    fn mine_block(&self, session: &mut Session, seal_empty: bool) -> Result<Mined, NodeError> {
        let env = self.next_block_env(&session.chain);
        let pre_state = session.state.snapshot()?;
        let mut included = Vec::new();
        let mut gas = 0u64;
        while let Some(pending) = session.pool.front() {
            if !included.is_empty() && gas.saturating_add(pending.tx.gas_limit) > env.gas_limit {
                break;
            }
            gas = gas.saturating_add(pending.tx.gas_limit);
            included.extend(session.pool.pop_front());
        }

        let mut rejected = Vec::new();
        session.state.lock()?;
        let outcome = loop {
            let input = BlockInput {
                env: env.clone(),
                transactions: included.iter().map(|p: &PendingTransaction| p.tx.clone()).collect(),
                withdrawals: Vec::new(),
            };
            match run_block(&mut session.state, &self.evm, &session.chain, &input) {
                Err(RunBlockError::Transaction { index, source }) => {
                    let dropped = included.remove(index);
                    warn!(
                        target: "node",
                        hash = %dropped.hash,
                        err = %source,
                        "Dropping invalid transaction"
                    );
                    rejected.push((dropped.hash, source));
                }
                other => break other,
            }
        };
        session.state.unlock();
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                for pending in included.into_iter().rev() {
                    session.pool.push_front(pending);
                }
                return Err(err.into());
            }
        };
        if included.is_empty() && !seal_empty {
            return Ok(Mined { hash: None, rejected });
        }

        let hashes: Vec<B256> = included.iter().map(|p| p.hash).collect();
        let parent = session.chain.latest();
        let header = Header {
            parent_hash: parent.hash,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: env.coinbase,
            state_root: outcome.state_root,
            transactions_root: transactions_root(&hashes),
            receipts_root: outcome.receipts_root,
            logs_bloom: outcome.logs_bloom,
            number: env.number,
            gas_limit: env.gas_limit,
            gas_used: outcome.gas_used,
            timestamp: env.timestamp,
            mix_hash: env.prevrandao,
            base_fee_per_gas: Some(env.basefee),
            ..Default::default()
        };
        let mined = included
            .into_iter()
            .zip(outcome.results)
            .zip(outcome.receipts)
            .zip(outcome.gas_prices)
            .enumerate()
            .map(|(index, (((pending, result), receipt), gas_price))| MinedTransaction {
                hash: pending.hash,
                transaction: pending.tx,
                block_number: env.number,
                block_hash: B256::ZERO,
                index,
                gas_price,
                result,
                receipt,
            })
            .collect();
        let block = session.chain.push(header, mined, pre_state);
        info!(
            target: "node",
            number = block.number(),
            hash = %block.hash,
            txs = block.transactions.len(),
            gas_used = block.header.gas_used,
            "Mined block"
        );
        Ok(Mined { hash: Some(block.hash), rejected })
    }

    fn next_block_env(&self, chain: &Blockchain) -> BlockEnv {
        let latest = chain.latest();
        BlockEnv {
            number: latest.number() + 1,
            coinbase: self.config.coinbase,
            timestamp: unix_now().max(latest.header.timestamp + 1),
            gas_limit: self.config.gas_limit,
            basefee: self.config.base_fee,
            prevrandao: B256::ZERO,
        }
    }

    /// Applies `update` to the account at `address` and flushes it.
    pub fn set_account(&self, address: Address, update: AccountUpdate) -> Result<B256, NodeError> {
        let root = self.read_state(|state| {
            state.modify_account_fields(address, update.fields)?;
            if let Some(storage) = update.state {
                state.clear_storage(address);
                for (slot, value) in storage {
                    state.put_storage(address, slot, value);
                }
            }
            for (slot, value) in update.state_diff.into_iter().flatten() {
                state.put_storage(address, slot, value);
            }
            state.flush()
        })?;
        debug!(target: "node", %address, %root, "Updated account");
        Ok(root)
    }

    /// Dumps every locally known account.
    pub fn dump_state(&self) -> Result<StateDump, NodeError> {
        Ok(self.session.lock().state.dump_state()?)
    }

    /// Loads a dump on top of the latest state and returns the new state root.
    pub fn load_state(&self, dump: &StateDump) -> Result<B256, NodeError> {
        Ok(self.session.lock().state.load_state(dump)?)
    }

    /// Re-executes a mined transaction under a tracer.
    ///
    /// The world state the block was executed against is restored, the transactions
    /// preceding `hash` in its block are replayed, and the latest state is put back
    /// afterwards.
    pub fn trace_transaction(
        &self,
        hash: B256,
        kind: TracerKind,
    ) -> Result<TraceResult, NodeError> {
        let mut session = self.session.lock();
        let Session { state, chain, .. } = &mut *session;
        let mined = chain.transaction(hash).ok_or(NodeError::TransactionNotFound(hash))?;
        let block = chain
            .block_by_number(mined.block_number)
            .ok_or(NodeError::BlockNotFound(mined.block_number))?;
        let pre_state =
            chain.world_at(mined.block_number).ok_or(NodeError::BlockNotFound(mined.block_number))?;
        let preceding: Vec<&Transaction> = block.transactions[..mined.index]
            .iter()
            .filter_map(|hash| chain.transaction(*hash))
            .map(|preceding| &preceding.transaction)
            .collect();
        let env = block.env();
        let ctx = BlockContext { config: &self.evm, block: &env, hashes: &*chain };

        let latest = state.snapshot()?;
        state.restore(pre_state.clone());
        let traced = replay(state, ctx, &preceding, &mined.transaction, kind);
        state.restore(latest);
        traced
    }
}

fn replay(
    state: &mut DynStateManager,
    ctx: BlockContext<'_>,
    preceding: &[&Transaction],
    tx: &Transaction,
    kind: TracerKind,
) -> Result<TraceResult, NodeError> {
    state.lock()?;
    let traced = (|| -> Result<TraceResult, NodeError> {
        for preceding in preceding {
            run_tx(state, ctx, preceding, NoOpInspector)?;
        }
        Ok(trace_call(state, ctx, tx, kind)?.1)
    })();
    state.unlock();
    traced
}

impl Drop for Node {
    fn drop(&mut self) {
        if let Some(miner) = self.miner.lock().take() {
            miner.abort();
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::BytecodeBuilder, ExecutionResult};
    use alloy_primitives::{address, Bytes};

    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0000000000000000000000000000000000000b0b");

    fn node(mining: MiningMode) -> Arc<Node> {
        let config = NodeConfig::default()
            .with_mining(mining)
            .with_account(ALICE, U256::from(10).pow(U256::from(18)));
        Node::local(config).unwrap()
    }

    fn transfer(value: u64) -> Transaction {
        Transaction {
            value: U256::from(value),
            gas_limit: 21_000,
            ..Transaction::call(ALICE, BOB, Bytes::new())
        }
    }

    fn balance(node: &Node, address: Address) -> U256 {
        node.read_state(|state| Ok(state.get_account(address)?.unwrap_or_default().balance))
            .unwrap()
    }

    #[test]
    fn test_auto_mining_mines_each_transaction() {
        let node = node(MiningMode::Auto);
        let hash = node.send_transaction(transfer(5)).unwrap();

        assert_eq!(node.block_number(), 1);
        assert_eq!(node.pending_transactions(), 0);
        assert_eq!(balance(&node, BOB), U256::from(5));

        let mined = node.transaction(hash).unwrap();
        assert_eq!(mined.block_number, 1);
        assert_eq!(mined.block_hash, node.block(1).unwrap().hash);
        assert_eq!(mined.transaction.nonce, Some(0));
        assert!(mined.result.is_success());
    }

    #[test]
    fn test_auto_mining_rejects_invalid_transaction() {
        let node = node(MiningMode::Auto);
        let tx = Transaction { nonce: Some(3), ..transfer(1) };
        let err = node.send_transaction(tx).unwrap_err();

        assert!(matches!(
            err,
            NodeError::InvalidTransaction(TxError::NonceTooHigh { expected: 0, got: 3 })
        ));
        assert_eq!(node.block_number(), 0);
        assert_eq!(node.pending_transactions(), 0);
    }

    #[test]
    fn test_manual_mining_waits_for_mine() {
        let node = node(MiningMode::Manual);
        let first = node.send_transaction(transfer(1)).unwrap();
        let second = node.send_transaction(transfer(2)).unwrap();
        assert_ne!(first, second);
        assert_eq!(node.pending_transactions(), 2);
        assert_eq!(node.block_number(), 0);
        assert_eq!(balance(&node, BOB), U256::ZERO);

        let blocks = node.mine(2).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(node.block_number(), 2);
        assert_eq!(node.block(1).unwrap().transactions, vec![first, second]);
        assert!(node.block(2).unwrap().transactions.is_empty());
        assert_eq!(balance(&node, BOB), U256::from(3));
        assert_eq!(node.transaction(second).unwrap().transaction.nonce, Some(1));
    }

    #[test]
    fn test_call_does_not_commit() {
        let node = node(MiningMode::Auto);
        let outcome = node.call(&transfer(7)).unwrap();
        assert!(outcome.result.is_success());
        assert_eq!(balance(&node, BOB), U256::ZERO);
        assert_eq!(node.block_number(), 0);
    }

    #[test]
    fn test_set_account_storage_replace_and_diff() {
        let node = node(MiningMode::Auto);
        let slot = |n: u64| U256::from(n);
        node.set_account(
            BOB,
            AccountUpdate {
                fields: AccountFields { nonce: Some(4), ..Default::default() },
                state: Some(BTreeMap::from([(slot(1), slot(10)), (slot(2), slot(20))])),
                ..Default::default()
            },
        )
        .unwrap();
        node.set_account(
            BOB,
            AccountUpdate {
                state_diff: Some(BTreeMap::from([(slot(2), slot(21))])),
                ..Default::default()
            },
        )
        .unwrap();
        node.set_account(
            BOB,
            AccountUpdate { state: Some(BTreeMap::from([(slot(3), slot(30))])), ..Default::default() },
        )
        .unwrap();

        let read = |n| node.read_state(|state| state.get_storage(BOB, slot(n))).unwrap();
        assert_eq!(read(1), U256::ZERO);
        assert_eq!(read(2), U256::ZERO);
        assert_eq!(read(3), slot(30));
        let nonce = node.read_state(|state| Ok(state.get_account(BOB)?.unwrap().nonce)).unwrap();
        assert_eq!(nonce, 4);
    }

    #[test]
    fn test_trace_transaction_replays_in_block_context() {
        let node = node(MiningMode::Manual);
        let counter = address!("1000000000000000000000000000000000000001");
        let code = BytecodeBuilder::default()
            .sload(0)
            .push_number(1u8)
            .append(revm_bytecode::opcode::ADD)
            .push_number(0u8)
            .append(revm_bytecode::opcode::SSTORE)
            .return_empty()
            .build();
        node.set_account(
            counter,
            AccountUpdate {
                fields: AccountFields { code: Some(code), ..Default::default() },
                ..Default::default()
            },
        )
        .unwrap();

        let bump = Transaction {
            gas_limit: 100_000,
            ..Transaction::call(ALICE, counter, Bytes::new())
        };
        node.send_transaction(bump.clone()).unwrap();
        let second = node.send_transaction(bump).unwrap();
        node.mine(1).unwrap();

        let trace = node.trace_transaction(second, TracerKind::Prestate).unwrap();
        let TraceResult::Prestate(trace) = trace else { panic!("expected a prestate trace") };
        // the first transaction of the block already bumped the counter
        assert_eq!(trace[&counter].storage[&B256::ZERO], B256::from(U256::from(1)));
        assert_eq!(trace[&ALICE].nonce, 1);

        // the latest state is back in place
        let value = node.read_state(|state| state.get_storage(counter, U256::ZERO)).unwrap();
        assert_eq!(value, U256::from(2));

        let TraceResult::Call(frame) = node.trace_transaction(second, TracerKind::Call).unwrap()
        else {
            panic!("expected a call trace")
        };
        assert_eq!(frame.to, Some(counter));
        assert!(frame.error.is_none());
        assert!(matches!(
            node.transaction(second).unwrap().result,
            ExecutionResult::Success { .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interval_mining_seals_empty_blocks() {
        let node = node(MiningMode::Interval(Duration::from_millis(20)));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(node.block_number() >= 1);
        assert!(node.block(1).unwrap().transactions.is_empty());
    }
}
