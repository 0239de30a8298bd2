//! Test utilities: a bytecode builder and a mock upstream JSON-RPC node.

mod bytecode;
pub use bytecode::*;

#[cfg(feature = "test-utils")]
mod upstream;
#[cfg(feature = "test-utils")]
pub use upstream::*;
