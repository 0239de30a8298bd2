use alloy_primitives::{Address, B256};

/// An error reaching or decoding the upstream provider of a forked session.
#[derive(Debug, thiserror::Error)]
pub enum ForkError {
    /// The upstream request failed or returned a malformed response.
    #[error("upstream {method} failed: {message}")]
    Upstream {
        /// The JSON-RPC method that failed.
        method: &'static str,
        /// The transport or decoding error message.
        message: String,
    },
    /// The pinned block reference does not exist upstream.
    #[error("block {0} not found upstream")]
    BlockNotFound(String),
    /// The fork URL could not be parsed.
    #[error("invalid fork url {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// The parse error message.
        message: String,
    },
}

impl ForkError {
    pub(crate) fn upstream(method: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Upstream { method, message: err.to_string() }
    }
}

/// An infrastructure failure while accessing state.
///
/// These are not EVM outcomes: a state error aborts the enclosing top-level call and no
/// partial state is committed.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A value could not be fetched from the upstream of a forked session.
    #[error("fork fetch failed: {0}")]
    Fork(#[from] ForkError),
    /// A value stored in the trie could not be decoded.
    #[error("corrupt trie entry for {key}: {source}")]
    Decode {
        /// The hashed key of the entry.
        key: B256,
        /// The RLP error.
        #[source]
        source: alloy_rlp::Error,
    },
    /// A loaded account carries code whose hash differs from its `codeHash`.
    #[error("code hash mismatch for {address}: expected {expected}, got {actual}")]
    CodeHashMismatch {
        /// The account address.
        address: Address,
        /// The declared code hash.
        expected: B256,
        /// The hash of the provided code.
        actual: B256,
    },
}
