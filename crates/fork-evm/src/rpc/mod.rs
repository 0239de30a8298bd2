//! The JSON-RPC procedures of a [`Node`]: the `eth_*` subset used by tooling, the `tevm_*`
//! state-manipulation procedures and the `debug_trace*` procedures.
//!
//! Transport is left to the embedder. [`RpcHandler::handle_json`] turns one request body
//! (a single request or a batch) into one response body.

mod envelope;
pub use envelope::*;

mod types;
pub use types::*;

use std::sync::Arc;

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, B256, U256, U64};
use alloy_rpc_types_eth::TransactionRequest;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    node::{AccountUpdate, Node},
    state::StateDump,
    AccountFields, ExecutionResult, StateReader, StateWriter,
};

/// Serves JSON-RPC requests against a node.
#[derive(Debug, Clone)]
pub struct RpcHandler {
    node: Arc<Node>,
}

/// The `{ state }` object of `tevm_dumpState` and `tevm_loadState`.
#[derive(Debug, Serialize, Deserialize)]
struct StateObject {
    state: StateDump,
}

impl RpcHandler {
    /// A handler serving `node`.
    pub const fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    /// The node.
    pub const fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Handles a raw request body. A batch yields a batch of responses.
    pub fn handle_json(&self, body: &str) -> String {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(err) => {
                let error = RpcError::new(ErrorKind::ParseError, err.to_string());
                return encode(&Response::new(Value::Null, Err(error)));
            }
        };
        match value {
            Value::Array(batch) if batch.is_empty() => {
                let error = RpcError::new(ErrorKind::InvalidRequest, "empty batch");
                encode(&Response::new(Value::Null, Err(error)))
            }
            Value::Array(batch) => {
                let responses: Vec<_> =
                    batch.into_iter().map(|request| self.handle_value(request)).collect();
                encode(&responses)
            }
            single => encode(&self.handle_value(single)),
        }
    }

    fn handle_value(&self, value: Value) -> Response {
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<Request>(value) {
            Ok(request) => self.handle(request),
            Err(err) => {
                Response::new(id, Err(RpcError::new(ErrorKind::InvalidRequest, err.to_string())))
            }
        }
    }

    /// Handles one request.
    pub fn handle(&self, request: Request) -> Response {
        trace!(target: "rpc", method = %request.method, params = %request.params, "Handling request");
        let outcome = self.dispatch(&request.method, request.params);
        if let Err(err) = &outcome {
            debug!(target: "rpc", method = %request.method, %err, "Request failed");
        }
        Response::new(request.id, outcome)
    }

    fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "eth_chainId" => {
                no_params(params)?;
                to_json(U64::from(self.node.chain_id()))
            }
            "eth_blockNumber" => {
                no_params(params)?;
                to_json(U64::from(self.node.block_number()))
            }
            "eth_call" => {
                let (request, block): (TransactionRequest, Option<BlockNumberOrTag>) =
                    parse(params, 2)?;
                self.check_block(block)?;
                self.eth_call(request)
            }
            "eth_sendTransaction" => {
                let (request,): (TransactionRequest,) = parse(params, 1)?;
                to_json(self.node.send_transaction(into_transaction(request))?)
            }
            "eth_getBalance" => {
                let (address, block): (Address, Option<BlockNumberOrTag>) = parse(params, 2)?;
                self.check_block(block)?;
                let account = self.node.read_state(|state| state.get_account(address))?;
                to_json(account.map(|account| account.balance).unwrap_or_default())
            }
            "eth_getTransactionCount" => {
                let (address, block): (Address, Option<BlockNumberOrTag>) = parse(params, 2)?;
                self.check_block(block)?;
                let account = self.node.read_state(|state| state.get_account(address))?;
                to_json(U64::from(account.map_or(0, |account| account.nonce)))
            }
            "eth_getCode" => {
                let (address, block): (Address, Option<BlockNumberOrTag>) = parse(params, 2)?;
                self.check_block(block)?;
                to_json(self.node.read_state(|state| state.get_code(address))?)
            }
            "eth_getStorageAt" => {
                let (address, slot, block): (Address, U256, Option<BlockNumberOrTag>) =
                    parse(params, 3)?;
                self.check_block(block)?;
                let value = self.node.read_state(|state| state.get_storage(address, slot))?;
                to_json(B256::from(value))
            }
            "eth_getTransactionReceipt" => {
                let (hash,): (B256,) = parse(params, 1)?;
                self.receipt(hash)
            }
            "tevm_call" => {
                let (params,): (TevmCallParams,) = parse(params, 1)?;
                self.tevm_call(params)
            }
            "tevm_getAccount" => {
                let (params,): (GetAccountParams,) = parse(params, 1)?;
                self.get_account(params)
            }
            "tevm_setAccount" => {
                let (params,): (SetAccountParams,) = parse(params, 1)?;
                let update = AccountUpdate {
                    fields: AccountFields {
                        nonce: params.nonce,
                        balance: params.balance,
                        code: params.deployed_bytecode,
                    },
                    state: params.state,
                    state_diff: params.state_diff,
                };
                self.node.set_account(params.address, update)?;
                Ok(Value::Null)
            }
            "tevm_dumpState" => {
                no_params(params)?;
                to_json(StateObject { state: self.node.dump_state()? })
            }
            "tevm_loadState" => {
                let (StateObject { state },): (StateObject,) = parse(params, 1)?;
                let root = self.node.load_state(&state)?;
                Ok(serde_json::json!({ "stateRoot": root }))
            }
            "tevm_mine" => {
                let (mine,): (Option<MineParams>,) = parse(params, 1)?;
                let blocks = mine.map_or(1, |mine| mine.blocks());
                let hashes = self.node.mine(blocks)?;
                Ok(serde_json::json!({ "blockHashes": hashes }))
            }
            "debug_traceCall" => {
                let (request, block, options): (
                    TransactionRequest,
                    Option<BlockNumberOrTag>,
                    Option<TraceOptions>,
                ) = parse(params, 3)?;
                self.check_block(block)?;
                let kind = options.unwrap_or_default().tracer;
                let (_, trace) = self.node.trace_call(&into_transaction(request), kind)?;
                to_json(trace)
            }
            "debug_traceTransaction" => {
                let (hash, options): (B256, Option<TraceOptions>) = parse(params, 2)?;
                let kind = options.unwrap_or_default().tracer;
                to_json(self.node.trace_transaction(hash, kind)?)
            }
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    /// Only the latest state is served.
    fn check_block(&self, block: Option<BlockNumberOrTag>) -> Result<(), RpcError> {
        match block {
            None
            | Some(
                BlockNumberOrTag::Latest
                | BlockNumberOrTag::Pending
                | BlockNumberOrTag::Safe
                | BlockNumberOrTag::Finalized,
            ) => Ok(()),
            Some(BlockNumberOrTag::Number(number)) if number == self.node.block_number() => Ok(()),
            Some(block) => Err(RpcError::invalid_params(format!(
                "state at block {block} is not available, only the latest state is served"
            ))),
        }
    }

    fn eth_call(&self, request: TransactionRequest) -> Result<Value, RpcError> {
        let outcome = self.node.call(&into_transaction(request))?;
        match outcome.result {
            ExecutionResult::Success { output, .. } => to_json(output.data()),
            ExecutionResult::Revert { output, .. } => Err(RpcError::reverted(&output)),
            ExecutionResult::Halt { reason, .. } => {
                Err(RpcError::new(ErrorKind::ExecutionHalted, reason.to_string()))
            }
        }
    }

    fn tevm_call(&self, params: TevmCallParams) -> Result<Value, RpcError> {
        let mut tx = into_transaction(params.request);
        tx.skip_balance = params.skip_balance;
        let outcome = self.node.call(&tx)?;
        let mut result = CallResult::new(&tx, &outcome);
        if params.create_transaction && outcome.result.is_success() {
            result.tx_hash = Some(self.node.send_transaction(tx)?);
        }
        to_json(result)
    }

    fn get_account(&self, params: GetAccountParams) -> Result<Value, RpcError> {
        let address = params.address;
        let (account, code, storage) = self.node.read_state(|state| {
            state.flush()?;
            let account = state.get_account(address)?;
            let code = state.get_code(address)?;
            let storage = params
                .return_storage
                .then(|| state.world().storage_entries(address))
                .transpose()?;
            Ok((account, code, storage))
        })?;
        let account = account.unwrap_or_default();
        to_json(AccountResult {
            address,
            nonce: account.nonce,
            balance: account.balance,
            is_contract: !code.is_empty(),
            is_empty: account.is_empty(),
            deployed_bytecode: code,
            storage_root: account.storage_root,
            code_hash: account.code_hash,
            storage: storage.map(|entries| entries.into_iter().collect()),
        })
    }

    fn receipt(&self, hash: B256) -> Result<Value, RpcError> {
        let Some(mined) = self.node.transaction(hash) else { return Ok(Value::Null) };
        let Some(block) = self.node.block(mined.block_number) else { return Ok(Value::Null) };
        let first_log_index = block.transactions[..mined.index]
            .iter()
            .filter_map(|hash| self.node.transaction(*hash))
            .map(|preceding| preceding.receipt.receipt.logs.len() as u64)
            .sum();
        to_json(receipt(&mined, &block, first_log_index))
    }
}

fn no_params(params: Value) -> Result<(), RpcError> {
    match params {
        Value::Null => Ok(()),
        Value::Array(params) if params.is_empty() => Ok(()),
        _ => Err(RpcError::invalid_params("expected no params")),
    }
}

/// Parses positional parameters into a tuple of `arity` elements. Missing trailing
/// parameters are `null`.
fn parse<T: DeserializeOwned>(params: Value, arity: usize) -> Result<T, RpcError> {
    let mut params = match params {
        Value::Null => Vec::new(),
        Value::Array(params) => params,
        _ => return Err(RpcError::invalid_params("params must be an array")),
    };
    if params.len() > arity {
        return Err(RpcError::invalid_params(format!(
            "expected at most {arity} params, got {}",
            params.len()
        )));
    }
    params.resize(arity, Value::Null);
    serde_json::from_value(Value::Array(params)).map_err(RpcError::invalid_params)
}

fn to_json<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|err| RpcError::new(ErrorKind::InternalError, err.to_string()))
}

fn encode<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|err| {
        format!(
            r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":{},"message":"{err}","kind":"InternalError"}}}}"#,
            ErrorKind::InternalError.code()
        )
    })
}
