//! Run module for executing arbitrary EVM bytecode, similar to go-ethereum's `evm run`.

mod cmd;

pub use cmd::*;
