//! Natively implemented contracts.
//!
//! The native set covers `ecrecover` (0x01), `sha256` (0x02) and `identity` (0x04). Custom
//! precompiles are registered by address and share the same calling convention.

use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::{Address, Bytes, Signature, B256, U256};
use sha2::{Digest, Sha256};

use crate::interpreter::num_words;

/// The result of running a precompile.
pub type PrecompileResult = Result<PrecompileOutput, PrecompileError>;

/// The successful output of a precompile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecompileOutput {
    /// Gas consumed.
    pub gas_used: u64,
    /// Return data.
    pub bytes: Bytes,
    /// Whether the call reverts, keeping `bytes` as revert data.
    pub reverted: bool,
}

impl PrecompileOutput {
    /// A successful output.
    pub fn new(gas_used: u64, bytes: Bytes) -> Self {
        Self { gas_used, bytes, reverted: false }
    }
}

/// A precompile failure. The call halts and consumes all of its gas.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrecompileError {
    /// The gas limit does not cover the cost.
    #[error("out of gas")]
    OutOfGas,
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// A contract implemented natively.
pub trait Precompile: Send + Sync {
    /// Runs the precompile on `input` with at most `gas_limit` gas.
    fn call(&self, input: &[u8], gas_limit: u64) -> PrecompileResult;
}

impl<F> Precompile for F
where
    F: Fn(&[u8], u64) -> PrecompileResult + Send + Sync,
{
    fn call(&self, input: &[u8], gas_limit: u64) -> PrecompileResult {
        self(input, gas_limit)
    }
}

/// The set of precompiles of a session, keyed by address.
#[derive(Clone, Default)]
pub struct Precompiles {
    inner: BTreeMap<Address, Arc<dyn Precompile>>,
}

impl Precompiles {
    /// The native precompiles.
    pub fn native() -> Self {
        let mut precompiles = Self::default();
        precompiles.insert(ECRECOVER, Arc::new(ecrecover));
        precompiles.insert(SHA256, Arc::new(sha256));
        precompiles.insert(IDENTITY, Arc::new(identity));
        precompiles
    }

    /// Registers `precompile` at `address`.
    pub fn insert(&mut self, address: Address, precompile: Arc<dyn Precompile>) {
        self.inner.insert(address, precompile);
    }

    /// Looks up the precompile at `address`.
    pub fn get(&self, address: &Address) -> Option<&Arc<dyn Precompile>> {
        self.inner.get(address)
    }

    /// Returns `true` if `address` is a precompile.
    pub fn contains(&self, address: &Address) -> bool {
        self.inner.contains_key(address)
    }

    /// Every precompile address. These are warm from the start of a transaction.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.inner.keys()
    }
}

/// Address of `ecrecover`.
pub const ECRECOVER: Address = Address::with_last_byte(1);
/// Address of `sha256`.
pub const SHA256: Address = Address::with_last_byte(2);
/// Address of `identity`.
pub const IDENTITY: Address = Address::with_last_byte(4);

const ECRECOVER_COST: u64 = 3_000;
const SHA256_BASE: u64 = 60;
const SHA256_WORD: u64 = 12;
const IDENTITY_BASE: u64 = 15;
const IDENTITY_WORD: u64 = 3;

fn linear_cost(len: usize, base: u64, word: u64, gas_limit: u64) -> Result<u64, PrecompileError> {
    let cost = base + word * num_words(len as u64);
    if cost > gas_limit {
        return Err(PrecompileError::OutOfGas);
    }
    Ok(cost)
}

/// Recovers the signer of a message hash. Invalid signatures return empty output.
pub fn ecrecover(input: &[u8], gas_limit: u64) -> PrecompileResult {
    if ECRECOVER_COST > gas_limit {
        return Err(PrecompileError::OutOfGas);
    }
    let mut padded = [0u8; 128];
    let len = input.len().min(128);
    padded[..len].copy_from_slice(&input[..len]);

    let hash = B256::from_slice(&padded[..32]);
    let v = U256::from_be_slice(&padded[32..64]);
    let r = U256::from_be_slice(&padded[64..96]);
    let s = U256::from_be_slice(&padded[96..128]);
    if v != U256::from(27) && v != U256::from(28) {
        return Ok(PrecompileOutput::new(ECRECOVER_COST, Bytes::new()));
    }
    let signature = Signature::new(r, s, v == U256::from(28));
    let output = match signature.recover_address_from_prehash(&hash) {
        Ok(address) => Bytes::copy_from_slice(address.into_word().as_slice()),
        Err(_) => Bytes::new(),
    };
    Ok(PrecompileOutput::new(ECRECOVER_COST, output))
}

/// SHA2-256 of the input.
pub fn sha256(input: &[u8], gas_limit: u64) -> PrecompileResult {
    let cost = linear_cost(input.len(), SHA256_BASE, SHA256_WORD, gas_limit)?;
    let digest = Sha256::digest(input);
    Ok(PrecompileOutput::new(cost, Bytes::copy_from_slice(&digest)))
}

/// Returns the input.
pub fn identity(input: &[u8], gas_limit: u64) -> PrecompileResult {
    let cost = linear_cost(input.len(), IDENTITY_BASE, IDENTITY_WORD, gas_limit)?;
    Ok(PrecompileOutput::new(cost, Bytes::copy_from_slice(input)))
}
