//! Execution tracers producing the JSON layouts of geth's `callTracer` and `prestateTracer`.

mod call;
pub use call::*;

mod prestate;
pub use prestate::*;

use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    runner::{run_call, BlockContext, RunTxError, Transaction, TxOutcome},
    StateWriter,
};

/// The built-in tracers understood by the `debug_trace*` procedures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum TracerKind {
    /// A tree of message calls.
    #[default]
    #[serde(rename = "callTracer")]
    Call,
    /// Every touched account before execution.
    #[serde(rename = "prestateTracer")]
    Prestate,
}

/// The output of a built-in tracer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TraceResult {
    /// From [`CallTracer`].
    Call(CallFrame),
    /// From [`PrestateTracer`].
    Prestate(PrestateTrace),
}

/// Runs `tx` under the tracer `kind` and reverts it.
pub fn trace_call<S: StateWriter>(
    state: &mut S,
    ctx: BlockContext<'_>,
    tx: &Transaction,
    kind: TracerKind,
) -> Result<(TxOutcome, TraceResult), RunTxError> {
    match kind {
        TracerKind::Call => {
            let mut tracer = CallTracer::new();
            let outcome = run_call(state, ctx, tx, &mut tracer)?;
            let frame = tracer.into_trace(tx, outcome.gas_used());
            Ok((outcome, TraceResult::Call(frame)))
        }
        TracerKind::Prestate => {
            let mut tracer = PrestateTracer::new();
            tracer.touch(ctx.block.coinbase);
            let outcome = run_call(state, ctx, tx, &mut tracer)?;
            let trace = tracer.into_trace(state)?;
            Ok((outcome, TraceResult::Prestate(trace)))
        }
    }
}

/// Decodes the message of a reverted `Error(string)`.
pub fn decode_revert_reason(output: &[u8]) -> Option<String> {
    const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

    let data = output.strip_prefix(&ERROR_SELECTOR)?;
    let word = |at: usize| -> Option<usize> {
        let word = data.get(at..at + 32)?;
        // Anything beyond 8 bytes cannot index into the output.
        if word[..24].iter().any(|b| *b != 0) {
            return None;
        }
        usize::try_from(u64::from_be_bytes(word[24..].try_into().ok()?)).ok()
    };
    let offset = word(0)?;
    let len = word(offset)?;
    let start = offset.checked_add(32)?;
    let message = data.get(start..start.checked_add(len)?)?;
    String::from_utf8(message.to_vec()).ok()
}

pub(crate) fn non_empty(bytes: &Bytes) -> Option<Bytes> {
    (!bytes.is_empty()).then(|| bytes.clone())
}
