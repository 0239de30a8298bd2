use alloy_primitives::B256;

use crate::{
    runner::{RunBlockError, RunTxError, TxError},
    ForkError, StateError,
};

/// Why a [`Node`](super::Node) request failed.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The transaction is invalid.
    #[error(transparent)]
    InvalidTransaction(#[from] TxError),
    /// State could not be accessed.
    #[error(transparent)]
    State(#[from] StateError),
    /// The upstream could not be reached at startup.
    #[error(transparent)]
    Fork(#[from] ForkError),
    /// No mined transaction has this hash.
    #[error("transaction {0} not found")]
    TransactionNotFound(B256),
    /// No block has this number.
    #[error("block {0} not found")]
    BlockNotFound(u64),
    /// A runtime for upstream requests could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl From<RunTxError> for NodeError {
    fn from(err: RunTxError) -> Self {
        match err {
            RunTxError::Invalid(err) => Self::InvalidTransaction(err),
            RunTxError::State(err) => Self::State(err),
        }
    }
}

impl From<RunBlockError> for NodeError {
    fn from(err: RunBlockError) -> Self {
        match err {
            RunBlockError::Transaction { source, .. } => Self::InvalidTransaction(source),
            RunBlockError::State(err) => Self::State(err),
        }
    }
}
