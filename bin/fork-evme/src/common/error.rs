use alloy_primitives::hex::FromHexError;
use fork_evm::{node::NodeError, runner::RunTxError, ForkError, StateError};

/// Error types for the fork-evme commands
#[derive(Debug, thiserror::Error)]
pub enum EvmeError {
    /// The upstream could not be reached or resolved
    #[error("Fork error: {0}")]
    Fork(#[from] ForkError),

    /// State access failed
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// The transaction was rejected or could not be executed
    #[error("Transaction error: {0}")]
    Transaction(#[from] RunTxError),

    /// The node could not be started
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    /// Failed to read or write a file or stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid hex string
    #[error("Invalid hex string: {0}")]
    InvalidHex(#[from] FromHexError),

    /// Malformed JSON
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for the fork-evme commands
pub type Result<T> = std::result::Result<T, EvmeError>;
