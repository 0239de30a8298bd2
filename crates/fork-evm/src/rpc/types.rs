//! Parameter and result payloads of the procedures.

use std::collections::BTreeMap;

use alloy_consensus::{Receipt, ReceiptEnvelope, ReceiptWithBloom};
use alloy_primitives::{Address, Bytes, Log, TxKind, B256, U256, U64};
use alloy_rpc_types_eth::{TransactionReceipt, TransactionRequest};
use serde::{Deserialize, Serialize};

use super::ErrorKind;
use crate::{
    chain::{MinedTransaction, SealedBlock},
    runner::{intrinsic_gas, Transaction, TxOutcome, DEFAULT_TX_GAS_LIMIT},
    tracers::TracerKind,
    ExecutionResult,
};

/// A receipt as returned by `eth_getTransactionReceipt`.
pub type RpcReceipt = TransactionReceipt<ReceiptEnvelope<alloy_rpc_types_eth::Log>>;

/// Converts a call request into a transaction. A request without `to` is a creation, and
/// one without `gas` gets [`DEFAULT_TX_GAS_LIMIT`].
pub fn into_transaction(request: TransactionRequest) -> Transaction {
    Transaction {
        caller: request.from.unwrap_or_default(),
        kind: request.to.unwrap_or(TxKind::Create),
        value: request.value.unwrap_or_default(),
        input: request.input.into_input().unwrap_or_default(),
        gas_limit: request.gas.unwrap_or(DEFAULT_TX_GAS_LIMIT),
        nonce: request.nonce,
        gas_price: request.gas_price,
        max_fee_per_gas: request.max_fee_per_gas,
        max_priority_fee_per_gas: request.max_priority_fee_per_gas,
        access_list: request.access_list.unwrap_or_default(),
        skip_balance: false,
    }
}

/// Parameters of `tevm_call`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TevmCallParams {
    /// The call.
    #[serde(flatten)]
    pub request: TransactionRequest,
    /// Top up the sender instead of failing on an insufficient balance.
    #[serde(default)]
    pub skip_balance: bool,
    /// Also send the call as a transaction when it succeeds.
    #[serde(default)]
    pub create_transaction: bool,
}

/// Why a `tevm_call` did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionError {
    /// [`ErrorKind::ExecutionReverted`] or [`ErrorKind::ExecutionHalted`].
    pub kind: ErrorKind,
    /// A description.
    pub message: String,
}

/// The result of `tevm_call`. A reverted call is a result too, with `errors` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    /// Return or revert data.
    pub raw_data: Bytes,
    /// Gas used beyond the intrinsic cost.
    #[serde(with = "alloy_serde::quantity")]
    pub execution_gas_used: u64,
    /// Gas charged to the sender.
    #[serde(with = "alloy_serde::quantity")]
    pub total_gas_spent: u64,
    /// Gas refunded.
    #[serde(with = "alloy_serde::quantity")]
    pub gas_refund: u64,
    /// Emitted logs.
    pub logs: Vec<Log>,
    /// The created contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_address: Option<Address>,
    /// Why the call failed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ExecutionError>,
    /// The hash of the transaction sent for the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

impl CallResult {
    /// Summarizes the outcome of `tx`.
    pub fn new(tx: &Transaction, outcome: &TxOutcome) -> Self {
        let gas_used = outcome.gas_used();
        let (raw_data, gas_refund, errors) = match &outcome.result {
            ExecutionResult::Success { output, gas_refunded, .. } => {
                (output.data().clone(), *gas_refunded, Vec::new())
            }
            ExecutionResult::Revert { output, .. } => {
                let message = super::RpcError::reverted(output).message;
                let error = ExecutionError { kind: ErrorKind::ExecutionReverted, message };
                (output.clone(), 0, vec![error])
            }
            ExecutionResult::Halt { reason, .. } => {
                let error =
                    ExecutionError { kind: ErrorKind::ExecutionHalted, message: reason.to_string() };
                (Bytes::new(), 0, vec![error])
            }
        };
        Self {
            raw_data,
            execution_gas_used: gas_used.saturating_sub(intrinsic_gas(tx)),
            total_gas_spent: gas_used,
            gas_refund,
            logs: outcome.logs().to_vec(),
            created_address: outcome.contract_address(),
            errors,
            tx_hash: None,
        }
    }
}

/// Parameters of `tevm_getAccount`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAccountParams {
    /// The account.
    pub address: Address,
    /// Include the locally known storage.
    #[serde(default)]
    pub return_storage: bool,
}

/// The result of `tevm_getAccount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResult {
    /// The account.
    pub address: Address,
    /// Nonce.
    #[serde(with = "alloy_serde::quantity")]
    pub nonce: u64,
    /// Balance.
    pub balance: U256,
    /// Deployed code.
    pub deployed_bytecode: Bytes,
    /// Root of the storage trie.
    pub storage_root: B256,
    /// Hash of the code.
    pub code_hash: B256,
    /// Whether the account has code.
    pub is_contract: bool,
    /// Whether the account is empty (EIP-161).
    pub is_empty: bool,
    /// Storage, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<U256, U256>>,
}

/// Parameters of `tevm_setAccount`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAccountParams {
    /// The account.
    pub address: Address,
    /// New nonce.
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub nonce: Option<u64>,
    /// New balance.
    #[serde(default)]
    pub balance: Option<U256>,
    /// New code.
    #[serde(default)]
    pub deployed_bytecode: Option<Bytes>,
    /// Replaces the whole storage.
    #[serde(default)]
    pub state: Option<BTreeMap<U256, U256>>,
    /// Overwrites single slots.
    #[serde(default)]
    pub state_diff: Option<BTreeMap<U256, U256>>,
}

/// Parameters of `tevm_mine`: a block count, or an object with one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MineParams {
    /// `[count]`
    Count(U64),
    /// `[{ "blockCount": count }]`
    Options {
        /// Blocks to mine, one if unset.
        #[serde(rename = "blockCount", default)]
        block_count: Option<U64>,
    },
}

impl MineParams {
    /// The number of blocks to mine.
    pub fn blocks(&self) -> u64 {
        match self {
            Self::Count(count) => count.to(),
            Self::Options { block_count } => block_count.map_or(1, |count| count.to()),
        }
    }
}

/// Options of the `debug_trace*` procedures.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceOptions {
    /// The tracer, `callTracer` if unset.
    #[serde(default)]
    pub tracer: TracerKind,
}

/// Builds the receipt of a mined transaction. `first_log_index` is the number of logs
/// emitted by the transactions before it in its block.
pub fn receipt(mined: &MinedTransaction, block: &SealedBlock, first_log_index: u64) -> RpcReceipt {
    let logs = mined
        .receipt
        .receipt
        .logs
        .iter()
        .zip(first_log_index..)
        .map(|(log, log_index)| alloy_rpc_types_eth::Log {
            inner: log.clone(),
            block_hash: Some(block.hash),
            block_number: Some(block.number()),
            block_timestamp: Some(block.header.timestamp),
            transaction_hash: Some(mined.hash),
            transaction_index: Some(mined.index as u64),
            log_index: Some(log_index),
            removed: false,
        })
        .collect();
    let receipt = ReceiptWithBloom {
        receipt: Receipt {
            status: mined.receipt.receipt.status,
            cumulative_gas_used: mined.receipt.receipt.cumulative_gas_used,
            logs,
        },
        logs_bloom: mined.receipt.logs_bloom,
    };
    let tx = &mined.transaction;
    let inner = if tx.max_fee_per_gas.is_some() || tx.max_priority_fee_per_gas.is_some() {
        ReceiptEnvelope::Eip1559(receipt)
    } else if !tx.access_list.0.is_empty() {
        ReceiptEnvelope::Eip2930(receipt)
    } else {
        ReceiptEnvelope::Legacy(receipt)
    };

    TransactionReceipt {
        inner,
        transaction_hash: mined.hash,
        transaction_index: Some(mined.index as u64),
        block_hash: Some(block.hash),
        block_number: Some(block.number()),
        gas_used: mined.result.gas_used(),
        effective_gas_price: mined.gas_price,
        blob_gas_used: None,
        blob_gas_price: None,
        from: mined.from(),
        to: tx.kind.to().copied(),
        contract_address: mined.contract_address(),
    }
}
