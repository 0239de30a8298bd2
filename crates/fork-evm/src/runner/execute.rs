use alloy_consensus::{Eip658Value, Receipt, ReceiptWithBloom};
use alloy_primitives::{Address, Bytes, Log, TxKind, U256};
use tracing::{debug, trace};

use super::{validate_static, RunTxError, Transaction, TxError};
use crate::{
    constants::gas::MAX_REFUND_QUOTIENT,
    evm::{BlockEnv, BlockHashes, Evm, EvmConfig, ExecutionResult, Inspector, Output, TxEnv},
    interpreter::{
        CallInputs, CallScheme, CreateInputs, CreateScheme, InterpreterResult, Outcome,
    },
    Account, StateError, StateWriter,
};

/// The block a transaction runs in, together with the session configuration.
#[derive(derive_more::Debug, Clone, Copy)]
pub struct BlockContext<'a> {
    /// Execution parameters.
    pub config: &'a EvmConfig,
    /// The block.
    pub block: &'a BlockEnv,
    /// Hashes of previous blocks.
    #[debug(ignore)]
    pub hashes: &'a dyn BlockHashes,
}

/// The result of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    /// The execution result.
    pub result: ExecutionResult,
    /// The receipt. Its cumulative gas covers this transaction only, unless it was produced by
    /// [`run_block`](super::run_block).
    pub receipt: ReceiptWithBloom<Receipt<Log>>,
    /// The price paid per gas.
    pub effective_gas_price: u128,
    /// The nonce the transaction used.
    pub nonce: u64,
}

impl TxOutcome {
    /// Gas charged to the sender.
    pub fn gas_used(&self) -> u64 {
        self.result.gas_used()
    }

    /// Logs of the transaction.
    pub fn logs(&self) -> &[Log] {
        self.result.logs()
    }

    /// The created contract, for a successful creation.
    pub fn contract_address(&self) -> Option<Address> {
        match &self.result {
            ExecutionResult::Success { output, .. } => output.address(),
            _ => None,
        }
    }
}

/// Runs a transaction and commits its effects.
///
/// Validation happens first: an invalid transaction is rejected with [`RunTxError::Invalid`]
/// and leaves the state untouched. Reverts and exceptional halts are valid outcomes and are
/// committed (nonce and gas payment persist). A state access failure reverts everything and
/// is returned as [`RunTxError::State`].
pub fn run_tx<S: StateWriter, I: Inspector>(
    state: &mut S,
    ctx: BlockContext<'_>,
    tx: &Transaction,
    inspector: I,
) -> Result<TxOutcome, RunTxError> {
    run_tx_with_available_gas(state, ctx, tx, ctx.block.gas_limit, inspector)
}

/// Runs a transaction with `eth_call` semantics: everything it did is reverted afterwards.
pub fn run_call<S: StateWriter, I: Inspector>(
    state: &mut S,
    ctx: BlockContext<'_>,
    tx: &Transaction,
    inspector: I,
) -> Result<TxOutcome, RunTxError> {
    let checkpoint = state.checkpoint();
    let outcome = run_tx(state, ctx, tx, inspector);
    state.revert(checkpoint);
    outcome
}

pub(crate) fn run_tx_with_available_gas<S: StateWriter, I: Inspector>(
    state: &mut S,
    ctx: BlockContext<'_>,
    tx: &Transaction,
    available_gas: u64,
    inspector: I,
) -> Result<TxOutcome, RunTxError> {
    let (intrinsic, gas_price) =
        validate_static(tx, available_gas, ctx.block.basefee, ctx.config.max_initcode_size)?;

    let mut sender = state.get_account(tx.caller)?.unwrap_or_default();
    if let Some(nonce) = tx.nonce {
        if nonce < sender.nonce {
            return Err(TxError::NonceTooLow { expected: sender.nonce, got: nonce }.into());
        }
        if nonce > sender.nonce {
            return Err(TxError::NonceTooHigh { expected: sender.nonce, got: nonce }.into());
        }
    }
    if sender.is_contract() {
        return Err(TxError::SenderNotEoa.into());
    }
    if sender.nonce == u64::MAX {
        return Err(TxError::NonceOverflow.into());
    }
    let required = U256::from(tx.gas_limit)
        .checked_mul(U256::from(tx.fee_cap()))
        .and_then(|gas_cost| gas_cost.checked_add(tx.value))
        .ok_or(TxError::CostOverflow)?;
    if sender.balance < required {
        if !tx.skip_balance {
            return Err(
                TxError::InsufficientFunds { required, available: sender.balance }.into()
            );
        }
        trace!(target: "runner", caller = %tx.caller, %required, "Topping up impersonated sender");
        sender.balance = required;
    }

    let checkpoint = state.checkpoint();
    match execute(state, ctx, tx, sender, intrinsic, gas_price, inspector) {
        Ok(outcome) => {
            state.commit(checkpoint);
            Ok(outcome)
        }
        Err(err) => {
            state.revert(checkpoint);
            Err(err.into())
        }
    }
}

fn execute<S: StateWriter, I: Inspector>(
    state: &mut S,
    ctx: BlockContext<'_>,
    tx: &Transaction,
    mut sender: Account,
    intrinsic: u64,
    gas_price: u128,
    inspector: I,
) -> Result<TxOutcome, StateError> {
    let nonce = sender.nonce;
    sender.balance -= U256::from(tx.gas_limit) * U256::from(gas_price);
    // A creation bumps the nonce when deriving the contract address.
    if !tx.is_create() {
        sender.nonce += 1;
    }
    state.put_account(tx.caller, sender);

    let tx_env = TxEnv { origin: tx.caller, gas_price: U256::from(gas_price) };
    let mut evm = Evm::new(state, ctx.config, ctx.hashes, ctx.block.clone(), tx_env, inspector);
    warm_up(&mut evm, ctx, tx);

    let gas_limit = tx.gas_limit - intrinsic;
    let (result, created) = match tx.kind {
        TxKind::Call(to) => {
            let result = evm.call(CallInputs {
                scheme: CallScheme::Call,
                caller: tx.caller,
                target_address: to,
                bytecode_address: to,
                value: tx.value,
                transfer: true,
                input: tx.input.clone(),
                gas_limit,
                is_static: false,
            })?;
            (result, None)
        }
        TxKind::Create => {
            let outcome = evm.create(CreateInputs {
                caller: tx.caller,
                scheme: CreateScheme::Create,
                value: tx.value,
                init_code: tx.input.clone(),
                gas_limit,
            })?;
            (outcome.result, outcome.address)
        }
    };
    let (journal, _) = evm.finish();

    let InterpreterResult { outcome, output, gas } = result;
    let spent = tx.gas_limit - gas.remaining();
    let refund = if outcome.is_success() {
        u64::try_from(gas.refunded()).unwrap_or_default().min(spent / MAX_REFUND_QUOTIENT)
    } else {
        0
    };
    let gas_used = spent - refund;

    let mut sender = state.get_account(tx.caller)?.unwrap_or_default();
    sender.balance += U256::from(tx.gas_limit - gas_used) * U256::from(gas_price);
    state.put_account(tx.caller, sender);

    let tip = gas_price.saturating_sub(u128::from(ctx.block.basefee));
    if tip > 0 {
        let coinbase = ctx.block.coinbase;
        let mut beneficiary = state.get_account(coinbase)?.unwrap_or_default();
        beneficiary.balance += U256::from(gas_used) * U256::from(tip);
        state.put_account(coinbase, beneficiary);
    }

    for address in &journal.destroyed {
        trace!(target: "runner", %address, "Removing self-destructed account");
        state.delete_account(*address);
    }
    for address in journal.touched {
        if state.get_account(address)?.is_some_and(|account| account.is_empty()) {
            trace!(target: "runner", %address, "Removing touched empty account");
            state.delete_account(address);
        }
    }

    let result = match outcome {
        Outcome::Success => ExecutionResult::Success {
            gas_used,
            gas_refunded: refund,
            logs: journal.logs,
            output: match tx.kind {
                TxKind::Call(_) => Output::Call(output),
                TxKind::Create => Output::Create(output, created),
            },
        },
        Outcome::Revert => ExecutionResult::Revert { gas_used, output },
        Outcome::Halt(reason) => ExecutionResult::Halt { reason, gas_used },
    };
    debug!(
        target: "runner",
        caller = %tx.caller,
        nonce,
        gas_used,
        success = result.is_success(),
        "Executed transaction"
    );
    Ok(TxOutcome {
        receipt: receipt(&result, gas_used),
        result,
        effective_gas_price: gas_price,
        nonce,
    })
}

/// Pre-warms the sender, the target, the coinbase (EIP-3651), the precompiles and the access
/// list (EIP-2930).
fn warm_up<S: StateWriter, I: Inspector>(
    evm: &mut Evm<'_, S, I>,
    ctx: BlockContext<'_>,
    tx: &Transaction,
) {
    evm.warm_account(tx.caller);
    evm.warm_account(ctx.block.coinbase);
    if let TxKind::Call(to) = tx.kind {
        evm.warm_account(to);
    }
    for address in ctx.config.precompiles.addresses() {
        evm.warm_account(*address);
    }
    for item in &tx.access_list.0 {
        evm.warm_account(item.address);
        for key in &item.storage_keys {
            evm.warm_slot(item.address, U256::from_be_bytes(key.0));
        }
    }
}

pub(crate) fn receipt(
    result: &ExecutionResult,
    cumulative_gas_used: u64,
) -> ReceiptWithBloom<Receipt<Log>> {
    Receipt {
        status: Eip658Value::Eip658(result.is_success()),
        cumulative_gas_used,
        logs: result.logs().to_vec(),
    }
    .with_bloom()
}

/// The revert data of a result, if it reverted.
pub fn revert_data(result: &ExecutionResult) -> Option<&Bytes> {
    match result {
        ExecutionResult::Revert { output, .. } => Some(output),
        _ => None,
    }
}
