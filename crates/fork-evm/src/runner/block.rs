use alloy_consensus::{Receipt, ReceiptWithBloom};
use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Bloom, Log, B256, U256};
use tracing::{debug, info};

use super::{execute::run_tx_with_available_gas, BlockContext, RunBlockError, RunTxError, Transaction};
use crate::{
    evm::{BlockEnv, BlockHashes, EvmConfig, ExecutionResult, NoOpInspector},
    state::Fallback,
    trie::MerkleTrie,
    StateManager, StateWriter,
};

/// Wei per gwei: withdrawal amounts are denominated in gwei.
const GWEI_TO_WEI: u64 = 1_000_000_000;

/// A block to execute.
#[derive(Debug, Clone, Default)]
pub struct BlockInput {
    /// The block environment.
    pub env: BlockEnv,
    /// Transactions, in order.
    pub transactions: Vec<Transaction>,
    /// Withdrawals, credited after the transactions.
    pub withdrawals: Vec<Withdrawal>,
}

/// The result of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    /// The state root after the block.
    pub state_root: B256,
    /// The execution result of each transaction.
    pub results: Vec<ExecutionResult>,
    /// The receipt of each transaction, with cumulative gas.
    pub receipts: Vec<ReceiptWithBloom<Receipt<Log>>>,
    /// The nonce each transaction used.
    pub nonces: Vec<u64>,
    /// The price per gas each transaction paid.
    pub gas_prices: Vec<u128>,
    /// The root of the receipts trie.
    pub receipts_root: B256,
    /// The union of the receipt blooms.
    pub logs_bloom: Bloom,
    /// Total gas used.
    pub gas_used: u64,
}

/// Runs every transaction of a block, credits withdrawals and flushes the result.
///
/// The block is all-or-nothing: if a transaction is invalid or state cannot be accessed,
/// every change since the start of the block, flushes included, is undone.
pub fn run_block<F: Fallback>(
    state: &mut StateManager<F>,
    config: &EvmConfig,
    hashes: &dyn BlockHashes,
    block: &BlockInput,
) -> Result<BlockOutcome, RunBlockError> {
    state.flush()?;
    state.checkpoint_world();
    let checkpoint = state.checkpoint();
    let ctx = BlockContext { config, block: &block.env, hashes };
    let executed = execute_block(state, ctx, block);
    let mut outcome = match executed {
        Ok(outcome) => {
            state.commit(checkpoint);
            outcome
        }
        Err(err) => {
            state.revert(checkpoint);
            state.revert_world();
            return Err(err);
        }
    };
    match state.flush() {
        Ok(root) => {
            state.commit_world();
            outcome.state_root = root;
        }
        Err(err) => {
            state.revert_world();
            return Err(err.into());
        }
    }
    info!(
        target: "runner",
        number = block.env.number,
        txs = block.transactions.len(),
        gas_used = outcome.gas_used,
        root = %outcome.state_root,
        "Executed block"
    );
    Ok(outcome)
}

fn execute_block<S: StateWriter>(
    state: &mut S,
    ctx: BlockContext<'_>,
    block: &BlockInput,
) -> Result<BlockOutcome, RunBlockError> {
    let mut outcome = BlockOutcome {
        state_root: B256::ZERO,
        results: Vec::with_capacity(block.transactions.len()),
        receipts: Vec::with_capacity(block.transactions.len()),
        nonces: Vec::with_capacity(block.transactions.len()),
        gas_prices: Vec::with_capacity(block.transactions.len()),
        receipts_root: B256::ZERO,
        logs_bloom: Bloom::ZERO,
        gas_used: 0,
    };
    let mut receipts_trie = MerkleTrie::new();

    for (index, tx) in block.transactions.iter().enumerate() {
        let available = block.env.gas_limit - outcome.gas_used;
        let mut executed = run_tx_with_available_gas(state, ctx, tx, available, NoOpInspector)
            .map_err(|err| match err {
                RunTxError::Invalid(source) => RunBlockError::Transaction { index, source },
                RunTxError::State(err) => RunBlockError::State(err),
            })?;
        outcome.gas_used += executed.gas_used();
        executed.receipt.receipt.cumulative_gas_used = outcome.gas_used;
        debug!(target: "runner", index, gas_used = executed.gas_used(), "Block transaction");

        receipts_trie.insert(&alloy_rlp::encode(index), alloy_rlp::encode(&executed.receipt));
        outcome.logs_bloom.accrue_bloom(&executed.receipt.logs_bloom);
        outcome.results.push(executed.result);
        outcome.receipts.push(executed.receipt);
        outcome.nonces.push(executed.nonce);
        outcome.gas_prices.push(executed.effective_gas_price);
    }

    for withdrawal in &block.withdrawals {
        if withdrawal.amount == 0 {
            continue;
        }
        let mut account = state.get_account(withdrawal.address)?.unwrap_or_default();
        account.balance += U256::from(withdrawal.amount) * U256::from(GWEI_TO_WEI);
        state.put_account(withdrawal.address, account);
    }

    outcome.receipts_root = receipts_trie.root();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        runner::TxError, test_utils::BytecodeBuilder, Account, NormalStateManager, StateReader,
    };
    use alloy_primitives::{address, Address, Bytes};
    use alloy_trie::EMPTY_ROOT_HASH;

    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0000000000000000000000000000000000000b0b");

    fn funded() -> NormalStateManager {
        let mut state = NormalStateManager::new();
        state.put_account(ALICE, Account::with_balance(U256::from(10).pow(U256::from(18))));
        state
    }

    fn transfer(nonce: u64, value: u64) -> Transaction {
        Transaction {
            value: U256::from(value),
            nonce: Some(nonce),
            gas_limit: 21_000,
            ..Transaction::call(ALICE, BOB, Bytes::new())
        }
    }

    #[test]
    fn test_block_accumulates_gas_and_receipts() {
        let mut state = funded();
        let block = BlockInput {
            transactions: vec![transfer(0, 1), transfer(1, 2)],
            withdrawals: vec![Withdrawal { address: BOB, amount: 1, ..Default::default() }],
            ..Default::default()
        };
        let outcome = run_block(&mut state, &EvmConfig::default(), &(), &block).unwrap();

        assert_eq!(outcome.gas_used, 42_000);
        assert_eq!(outcome.receipts[0].receipt.cumulative_gas_used, 21_000);
        assert_eq!(outcome.receipts[1].receipt.cumulative_gas_used, 42_000);
        assert_ne!(outcome.receipts_root, EMPTY_ROOT_HASH);
        assert_eq!(outcome.nonces, vec![0, 1]);
        assert_eq!(outcome.state_root, state.state_root().unwrap());
        assert_eq!(
            state.get_account(BOB).unwrap().unwrap().balance,
            U256::from(3) + U256::from(GWEI_TO_WEI)
        );
    }

    #[test]
    fn test_invalid_transaction_aborts_block() {
        let mut state = funded();
        let before = state.flush().unwrap();
        let block = BlockInput {
            transactions: vec![transfer(0, 1), transfer(5, 1)],
            ..Default::default()
        };
        let err = run_block(&mut state, &EvmConfig::default(), &(), &block).unwrap_err();

        assert!(matches!(
            err,
            RunBlockError::Transaction {
                index: 1,
                source: TxError::NonceTooHigh { expected: 1, got: 5 }
            }
        ));
        assert_eq!(state.state_root().unwrap(), before);
        assert_eq!(state.get_account(BOB).unwrap(), None);
        assert_eq!(state.checkpoint_depth(), 0);
    }

    #[test]
    fn test_reverting_transaction_is_kept() {
        let mut state = funded();
        state.put_code(BOB, BytecodeBuilder::default().revert().build()).unwrap();
        let block = BlockInput {
            transactions: vec![Transaction { gas_limit: 50_000, ..transfer(0, 0) }],
            ..Default::default()
        };
        let outcome = run_block(&mut state, &EvmConfig::default(), &(), &block).unwrap();
        assert!(matches!(outcome.results[0], ExecutionResult::Revert { .. }));
        assert_eq!(state.get_account(ALICE).unwrap().unwrap().nonce, 1);
    }
}
