use alloy_primitives::U256;

use crate::StateError;

/// A transaction that cannot be executed. Returned before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    /// The gas limit does not cover the intrinsic cost.
    #[error("intrinsic gas too low: gas_limit={gas_limit} < intrinsic={intrinsic}")]
    IntrinsicGasTooLow {
        /// The transaction gas limit.
        gas_limit: u64,
        /// The intrinsic cost.
        intrinsic: u64,
    },
    /// The gas limit exceeds the gas left in the block.
    #[error("gas limit exceeds block: gas_limit={gas_limit} > available={available}")]
    GasLimitExceedsBlock {
        /// The transaction gas limit.
        gas_limit: u64,
        /// The gas left in the block.
        available: u64,
    },
    /// The init code is larger than allowed (EIP-3860).
    #[error("init code too large: size={size} > limit={limit}")]
    InitcodeTooLarge {
        /// The init code size.
        size: usize,
        /// The limit.
        limit: usize,
    },
    /// `max_priority_fee_per_gas` is above `max_fee_per_gas`.
    #[error("max priority fee per gas higher than max fee per gas")]
    PriorityFeeAboveMaxFee,
    /// The fee cap does not cover the base fee.
    #[error("max fee per gas less than block base fee: fee_cap={fee_cap} < base_fee={base_fee}")]
    FeeCapBelowBaseFee {
        /// The offered fee cap.
        fee_cap: u128,
        /// The block base fee.
        base_fee: u64,
    },
    /// The nonce was already used.
    #[error("nonce too low: expected={expected}, got={got}")]
    NonceTooLow {
        /// The sender's nonce.
        expected: u64,
        /// The transaction nonce.
        got: u64,
    },
    /// The nonce is ahead of the sender.
    #[error("nonce too high: expected={expected}, got={got}")]
    NonceTooHigh {
        /// The sender's nonce.
        expected: u64,
        /// The transaction nonce.
        got: u64,
    },
    /// The sender's nonce cannot be incremented.
    #[error("nonce has max value")]
    NonceOverflow,
    /// The sender has code (EIP-3607).
    #[error("sender is not an EOA")]
    SenderNotEoa,
    /// The sender cannot pay for value and gas.
    #[error("insufficient funds for gas * price + value: required={required}, available={available}")]
    InsufficientFunds {
        /// Upfront gas cost plus value.
        required: U256,
        /// The sender's balance.
        available: U256,
    },
    /// Upfront gas cost plus value does not fit in 256 bits.
    #[error("gas * price + value overflows")]
    CostOverflow,
}

/// Why [`run_tx`](super::run_tx) failed.
#[derive(Debug, thiserror::Error)]
pub enum RunTxError {
    /// The transaction is invalid. No state was touched.
    #[error(transparent)]
    Invalid(#[from] TxError),
    /// State could not be accessed. Every change of the transaction was reverted.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Why [`run_block`](super::run_block) failed. The pre-block state is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum RunBlockError {
    /// A transaction of the block is invalid.
    #[error("transaction {index} is invalid: {source}")]
    Transaction {
        /// Position of the transaction in the block.
        index: usize,
        /// The validation error.
        #[source]
        source: TxError,
    },
    /// State could not be accessed.
    #[error(transparent)]
    State(#[from] StateError),
}
