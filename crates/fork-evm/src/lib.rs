//! An EVM execution core with a checkpointed, trie-backed world state that can lazily fork
//! a remote chain at a pinned block.
//!
//! The crate is layered bottom-up:
//! - [`primitives`]: the account model and CREATE/CREATE2 address derivation.
//! - [`trie`]: an in-memory Merkle-Patricia trie and the [`trie::WorldState`] composite.
//! - [`state`]: the layered state cache with LIFO checkpoints and the state managers.
//! - [`fork`]: the upstream fallback resolver used by forked and proxied sessions.
//! - [`interpreter`] and [`evm`]: the bytecode loop, call/create dispatch and precompiles.
//! - [`runner`]: transaction and block execution, receipts.
//! - [`chain`], [`node`] and [`rpc`]: a single-session node and its JSON-RPC procedures.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod error;
pub use error::*;

pub mod primitives;
pub use primitives::*;

pub mod trie;

pub mod state;
pub use state::{
    AccountFields, Checkpoint, DynStateManager, Fallback, ForkStateManager, NoFallback,
    NormalStateManager, ProxyStateManager, StateDump, StateManager, StateReader, StateWriter,
};

pub mod fork;

pub mod interpreter;

pub mod evm;
pub use evm::{
    BlockEnv, BlockHashes, EvmConfig, ExecutionResult, HaltReason, Inspector, NoOpInspector,
    Precompile, PrecompileOutput,
};

pub mod tracers;

pub mod runner;
pub use runner::{BlockInput, BlockOutcome, Transaction, TxOutcome};

pub mod chain;

pub mod node;
pub use node::{MiningMode, Node, NodeConfig};

pub mod rpc;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
