use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use super::{decode_revert_reason, non_empty};
use crate::{
    evm::Inspector,
    interpreter::{
        CallInputs, CallScheme, CreateInputs, CreateOutcome, CreateScheme, InterpreterResult,
        Outcome,
    },
    runner::Transaction,
};

/// One frame of a call trace, in the layout of geth's `callTracer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// `CALL`, `STATICCALL`, `CREATE2`, `SELFDESTRUCT`, ...
    #[serde(rename = "type")]
    pub kind: String,
    /// The caller.
    pub from: Address,
    /// The callee, or the created contract. Unset for a failed creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// The value. Unset for `STATICCALL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    /// Gas given to the frame.
    #[serde(with = "alloy_serde::quantity")]
    pub gas: u64,
    /// Gas used by the frame, children included.
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    /// Call data or init code.
    pub input: Bytes,
    /// Return data, revert data, or the deployed code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Bytes>,
    /// Why the frame failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The decoded `Error(string)` of a revert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    /// Nested frames, in execution order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<CallFrame>,
}

impl CallFrame {
    fn open(
        kind: &str,
        from: Address,
        to: Address,
        value: Option<U256>,
        gas: u64,
        input: Bytes,
    ) -> Self {
        Self {
            kind: kind.to_string(),
            from,
            to: Some(to),
            value,
            gas,
            gas_used: 0,
            input,
            output: None,
            error: None,
            revert_reason: None,
            calls: Vec::new(),
        }
    }

    fn close(&mut self, result: &InterpreterResult) {
        self.gas_used = result.gas.spent();
        match result.outcome {
            Outcome::Success => self.output = non_empty(&result.output),
            Outcome::Revert => {
                self.error = Some("execution reverted".to_string());
                self.revert_reason = decode_revert_reason(&result.output);
                self.output = non_empty(&result.output);
            }
            Outcome::Halt(reason) => self.error = Some(reason.to_string()),
        }
    }
}

/// Builds the tree of message calls of a transaction.
#[derive(Debug, Default)]
pub struct CallTracer {
    open: Vec<CallFrame>,
    root: Option<CallFrame>,
}

impl CallTracer {
    /// Creates an empty tracer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the trace of `tx`. The root frame reports the transaction gas limit and the gas
    /// charged to the sender, intrinsic cost and refunds included.
    pub fn into_trace(self, tx: &Transaction, gas_used: u64) -> CallFrame {
        let mut root = self.root.unwrap_or_else(|| {
            let kind = if tx.is_create() { "CREATE" } else { "CALL" };
            let mut frame = CallFrame::open(
                kind,
                tx.caller,
                Address::ZERO,
                Some(tx.value),
                tx.gas_limit,
                tx.input.clone(),
            );
            frame.to = tx.kind.to().copied();
            frame
        });
        root.gas = tx.gas_limit;
        root.gas_used = gas_used;
        root
    }

    fn finish(&mut self, frame: CallFrame) {
        match self.open.last_mut() {
            Some(parent) => parent.calls.push(frame),
            None => self.root = Some(frame),
        }
    }
}

impl Inspector for CallTracer {
    fn call(&mut self, inputs: &CallInputs, _depth: usize) {
        let value = (inputs.scheme != CallScheme::StaticCall).then_some(inputs.value);
        self.open.push(CallFrame::open(
            inputs.scheme.name(),
            inputs.caller,
            inputs.target_address,
            value,
            inputs.gas_limit,
            inputs.input.clone(),
        ));
    }

    fn call_end(&mut self, _inputs: &CallInputs, result: &InterpreterResult) {
        if let Some(mut frame) = self.open.pop() {
            frame.close(result);
            self.finish(frame);
        }
    }

    fn create(&mut self, inputs: &CreateInputs, address: Address, _depth: usize) {
        let kind = match inputs.scheme {
            CreateScheme::Create => "CREATE",
            CreateScheme::Create2 { .. } => "CREATE2",
        };
        self.open.push(CallFrame::open(
            kind,
            inputs.caller,
            address,
            Some(inputs.value),
            inputs.gas_limit,
            inputs.init_code.clone(),
        ));
    }

    fn create_end(&mut self, _inputs: &CreateInputs, outcome: &CreateOutcome) {
        if let Some(mut frame) = self.open.pop() {
            frame.close(&outcome.result);
            if outcome.address.is_none() {
                frame.to = None;
            }
            self.finish(frame);
        }
    }

    fn selfdestruct(&mut self, contract: Address, target: Address, value: U256) {
        let frame = CallFrame::open("SELFDESTRUCT", contract, target, Some(value), 0, Bytes::new());
        self.finish(frame);
    }
}
