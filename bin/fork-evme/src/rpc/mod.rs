//! Line-delimited JSON-RPC over stdio.

mod cmd;

pub use cmd::*;
