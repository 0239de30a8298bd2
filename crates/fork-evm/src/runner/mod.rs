//! Transaction and block execution.
//!
//! [`run_tx`] validates a [`Transaction`], buys its gas, runs it through an
//! [`Evm`](crate::evm::Evm) and settles refunds and fees. [`run_call`] does the same inside a
//! checkpoint that is always reverted. [`run_block`] runs a whole block atomically and
//! produces receipts.

mod block;
pub use block::*;

mod error;
pub use error::*;

mod execute;
pub use execute::{revert_data, run_call, run_tx, BlockContext, TxOutcome};

mod tx;
pub use tx::*;
