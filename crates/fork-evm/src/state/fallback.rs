use std::fmt;

use alloy_primitives::{keccak256, Address, Bytes, KECCAK256_EMPTY, U256};
use auto_impl::auto_impl;

use crate::{Account, StateError};

/// An account as known to an upstream: nonce, balance and code, without a storage root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteAccount {
    /// The account nonce.
    pub nonce: u64,
    /// The account balance.
    pub balance: U256,
    /// The deployed code.
    pub code: Bytes,
}

impl RemoteAccount {
    /// Returns `true` if the upstream reported nothing for this address.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code.is_empty()
    }

    /// Converts into a local account with an empty storage trie.
    pub fn to_account(&self) -> Account {
        let code_hash = if self.code.is_empty() { KECCAK256_EMPTY } else { keccak256(&self.code) };
        Account { nonce: self.nonce, balance: self.balance, code_hash, ..Default::default() }
    }
}

/// The source consulted when a value misses every local layer.
#[auto_impl(Box)]
pub trait Fallback: fmt::Debug {
    /// Whether fetched values are written into the local trie, and so change
    /// [`StateManager::state_root`](crate::StateManager::state_root). A fallback that tracks a
    /// moving upstream keeps them in a cache that can be invalidated instead.
    fn persists(&self) -> bool {
        true
    }

    /// Fetches an account. `None` if the upstream has nothing at `address`.
    fn account(&self, address: Address) -> Result<Option<RemoteAccount>, StateError>;

    /// Fetches a storage slot.
    fn storage(&self, address: Address, slot: U256) -> Result<U256, StateError>;

    /// Fetches the code of an account.
    fn code(&self, address: Address) -> Result<Bytes, StateError>;

    /// Pins the upstream for the duration of a call. Returns `true` if values fetched
    /// before are stale and local read caches must be dropped.
    fn lock(&mut self) -> Result<bool, StateError> {
        Ok(false)
    }

    /// Releases the pin taken by [`lock`](Fallback::lock).
    fn unlock(&mut self) {}
}

/// A fallback chosen at runtime.
pub type DynFallback = Box<dyn Fallback + Send + Sync>;

/// The fallback of a purely local session: every miss is final.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl Fallback for NoFallback {
    fn account(&self, _address: Address) -> Result<Option<RemoteAccount>, StateError> {
        Ok(None)
    }

    fn storage(&self, _address: Address, _slot: U256) -> Result<U256, StateError> {
        Ok(U256::ZERO)
    }

    fn code(&self, _address: Address) -> Result<Bytes, StateError> {
        Ok(Bytes::new())
    }
}
