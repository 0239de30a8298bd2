use std::collections::HashMap;

use alloy_primitives::{keccak256, Address, Bytes, B256, KECCAK256_EMPTY, U256};
use tracing::{debug, trace};

use super::{Checkpoint, DynFallback, Fallback, NoFallback, StateCache, StateReader, StateWriter};
use crate::{trie::WorldState, Account, StateError};

/// Fields of an account to overwrite. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFields {
    /// New nonce.
    pub nonce: Option<u64>,
    /// New balance.
    pub balance: Option<U256>,
    /// New deployed code.
    pub code: Option<Bytes>,
}

/// The state manager of one session: a layered [`StateCache`] over a [`WorldState`], backed
/// by a [`Fallback`] for values that are not known locally.
///
/// Read order is: pending layers (top-down), the clean read cache, the tries, and finally the
/// fallback. A value fetched from the fallback never overrides a local one.
#[derive(Debug, Clone)]
pub struct StateManager<F = NoFallback> {
    world: WorldState,
    cache: StateCache,
    clean_accounts: HashMap<Address, Option<Account>>,
    clean_storage: HashMap<(Address, U256), U256>,
    fallback: F,
}

impl StateManager<NoFallback> {
    /// Creates a session without an upstream.
    pub fn new() -> Self {
        Self::with_fallback(NoFallback)
    }
}

impl Default for StateManager<NoFallback> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Fallback> StateManager<F> {
    /// Creates an empty session backed by `fallback`.
    pub fn with_fallback(fallback: F) -> Self {
        Self::from_world(WorldState::new(), fallback)
    }

    /// Creates a session over an existing world state.
    pub fn from_world(world: WorldState, fallback: F) -> Self {
        Self {
            world,
            cache: StateCache::default(),
            clean_accounts: HashMap::new(),
            clean_storage: HashMap::new(),
            fallback,
        }
    }

    /// The fallback of this session.
    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    pub(crate) fn fallback_mut(&mut self) -> &mut F {
        &mut self.fallback
    }

    /// The committed world state. Pending writes are not visible until flushed.
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    /// The number of pending checkpoints.
    pub fn checkpoint_depth(&self) -> usize {
        self.cache.depth()
    }

    /// Returns `true` if an account exists at `address`.
    pub fn account_exists(&mut self, address: Address) -> Result<bool, StateError> {
        Ok(self.get_account(address)?.is_some())
    }

    /// Overwrites selected fields of an account, creating it if needed.
    pub fn modify_account_fields(
        &mut self,
        address: Address,
        fields: AccountFields,
    ) -> Result<(), StateError> {
        let mut account = self.get_account(address)?.unwrap_or_default();
        if let Some(nonce) = fields.nonce {
            account.nonce = nonce;
        }
        if let Some(balance) = fields.balance {
            account.balance = balance;
        }
        if let Some(code) = fields.code {
            account.code_hash = self.store_code(code);
        }
        self.put_account(address, account);
        Ok(())
    }

    /// Pins the upstream for the duration of a call, dropping cached upstream values if they
    /// went stale. A no-op for sessions with a pinned or no upstream.
    pub fn lock(&mut self) -> Result<(), StateError> {
        if self.fallback.lock()? {
            self.clear_caches();
        }
        Ok(())
    }

    /// Releases the pin taken by [`lock`](Self::lock).
    pub fn unlock(&mut self) {
        self.fallback.unlock();
    }

    /// Drops the clean read cache. Pending writes are kept.
    pub fn clear_caches(&mut self) {
        self.clean_accounts.clear();
        self.clean_storage.clear();
    }

    /// Returns an independent copy of this session sharing the (immutable) trie nodes and the
    /// fallback.
    pub fn deep_copy(&self) -> Self
    where
        F: Clone,
    {
        self.clone()
    }

    /// Erases the fallback type.
    pub fn boxed(self) -> StateManager<DynFallback>
    where
        F: Send + Sync + 'static,
    {
        StateManager {
            world: self.world,
            cache: self.cache,
            clean_accounts: self.clean_accounts,
            clean_storage: self.clean_storage,
            fallback: Box::new(self.fallback),
        }
    }

    /// The root of the committed world state.
    ///
    /// In a forked session every account and non-zero slot fetched from the upstream is
    /// committed into the local trie as it is read, so reads can move the root. The root
    /// covers the upstream state observed so far, not the upstream block's full state.
    /// Proxied sessions keep fetched values in the clean caches and leave the root alone.
    pub fn state_root(&mut self) -> Result<B256, StateError> {
        self.world.state_root()
    }

    /// Flushes pending writes and returns a snapshot of the world state.
    pub fn snapshot(&mut self) -> Result<WorldState, StateError> {
        self.flush()?;
        Ok(self.world.clone())
    }

    /// Replaces the world state with a snapshot, dropping pending writes and caches.
    ///
    /// # Panics
    ///
    /// Panics if a checkpoint is pending.
    pub fn restore(&mut self, world: WorldState) {
        assert_eq!(self.cache.depth(), 0, "restore with pending checkpoints");
        self.world = world;
        self.cache = StateCache::default();
        self.clear_caches();
    }

    /// Opens a checkpoint on the world state itself, so that a flush can be undone.
    pub fn checkpoint_world(&mut self) {
        self.world.checkpoint();
    }

    /// Keeps the flushes made since [`checkpoint_world`](Self::checkpoint_world).
    pub fn commit_world(&mut self) {
        self.world.commit();
    }

    /// Undoes the flushes made since [`checkpoint_world`](Self::checkpoint_world).
    pub fn revert_world(&mut self) {
        self.world.revert();
        self.clear_caches();
    }

    fn store_code(&mut self, code: Bytes) -> B256 {
        if code.is_empty() {
            return KECCAK256_EMPTY;
        }
        let hash = keccak256(&code);
        self.cache.put_code(hash, code);
        hash
    }

    fn code_by_hash(&self, hash: B256) -> Option<Bytes> {
        self.cache.code(hash).or_else(|| self.world.code_by_hash(hash))
    }
}

impl<F: Fallback> StateReader for StateManager<F> {
    fn get_account(&mut self, address: Address) -> Result<Option<Account>, StateError> {
        if let Some(account) = self.cache.account(address) {
            return Ok(account);
        }
        if let Some(account) = self.clean_accounts.get(&address) {
            return Ok(*account);
        }
        let mut account = self.world.get_account(address)?;
        if account.is_none() && !self.world.is_authoritative(address) {
            if let Some(remote) = self.fallback.account(address)? {
                trace!(target: "state", %address, nonce = remote.nonce, balance = %remote.balance, "Fetched account");
                let fetched = remote.to_account();
                // code is content addressed, so it is safe to keep even for a moving upstream
                self.world.put_code(remote.code);
                if self.fallback.persists() {
                    self.world.put_account(address, fetched);
                }
                account = Some(fetched);
            }
        }
        self.clean_accounts.insert(address, account);
        Ok(account)
    }

    fn get_storage(&mut self, address: Address, slot: U256) -> Result<U256, StateError> {
        if let Some(value) = self.cache.storage(address, slot) {
            return Ok(value);
        }
        if let Some(value) = self.clean_storage.get(&(address, slot)) {
            return Ok(*value);
        }
        let value = match self.world.get_storage(address, slot)? {
            Some(value) => value,
            None if self.world.is_authoritative(address) => U256::ZERO,
            None => {
                let value = self.fallback.storage(address, slot)?;
                trace!(target: "state", %address, %slot, %value, "Fetched storage slot");
                if self.fallback.persists() && !value.is_zero() {
                    self.world.put_storage(address, slot, value);
                }
                value
            }
        };
        self.clean_storage.insert((address, slot), value);
        Ok(value)
    }

    fn get_code(&mut self, address: Address) -> Result<Bytes, StateError> {
        let Some(account) = self.get_account(address)? else { return Ok(Bytes::new()) };
        if account.code_hash == KECCAK256_EMPTY {
            return Ok(Bytes::new());
        }
        if let Some(code) = self.code_by_hash(account.code_hash) {
            return Ok(code);
        }
        let code = self.fallback.code(address)?;
        debug!(target: "state", %address, len = code.len(), "Fetched code");
        self.world.put_code(code.clone());
        Ok(code)
    }
}

impl<F: Fallback> StateWriter for StateManager<F> {
    fn put_account(&mut self, address: Address, account: Account) {
        self.cache.put_account(address, Some(account));
    }

    fn delete_account(&mut self, address: Address) {
        self.cache.put_account(address, None);
        self.cache.clear_storage(address);
    }

    fn put_storage(&mut self, address: Address, slot: U256, value: U256) {
        self.cache.put_storage(address, slot, value);
    }

    fn clear_storage(&mut self, address: Address) {
        self.cache.clear_storage(address);
    }

    fn put_code(&mut self, address: Address, code: Bytes) -> Result<B256, StateError> {
        let mut account = self.get_account(address)?.unwrap_or_default();
        account.code_hash = self.store_code(code);
        self.put_account(address, account);
        Ok(account.code_hash)
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.cache.checkpoint()
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        self.cache.commit(checkpoint);
    }

    fn revert(&mut self, checkpoint: Checkpoint) {
        self.cache.revert(checkpoint);
    }

    fn flush(&mut self) -> Result<B256, StateError> {
        let pending = self.cache.take_pending();
        for address in pending.cleared {
            self.world.clear_storage(address);
            self.clean_storage.retain(|(a, _), _| *a != address);
        }
        for (address, slots) in pending.storage {
            for (slot, value) in slots {
                self.world.put_storage(address, slot, value);
                self.clean_storage.insert((address, slot), value);
            }
        }
        for code in pending.code.into_values() {
            self.world.put_code(code);
        }
        for (address, account) in pending.accounts {
            match account {
                Some(account) => self.world.put_account(address, account),
                None => self.world.delete_account(address),
            }
            self.clean_accounts.insert(address, account);
        }
        let root = self.world.state_root()?;
        debug!(target: "state", %root, "Flushed state");
        Ok(root)
    }
}
