use std::collections::{HashMap, HashSet};

use alloy_primitives::{keccak256, Address, Bytes, B256, KECCAK256_EMPTY, U256};
use alloy_rlp::Decodable;
use alloy_trie::EMPTY_ROOT_HASH;

use super::MerkleTrie;
use crate::{Account, StateError};

/// The committed world state: the account trie, the per-account storage tries and the code
/// store.
///
/// Accounts are keyed by `keccak256(address)` and storage slots by `keccak256(slot)`. The
/// preimages are kept so the state can be enumerated for dumps.
///
/// Cloning a world state is cheap (tries share their nodes) and yields an independent
/// snapshot.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    accounts: MerkleTrie,
    storage: HashMap<Address, MerkleTrie>,
    code: HashMap<B256, Bytes>,
    address_preimages: HashMap<B256, Address>,
    slot_preimages: HashMap<B256, U256>,
    /// Accounts whose storage changed since their account leaf was last written.
    dirty: HashSet<Address>,
    /// Accounts whose state is fully known locally: a miss is final and never forwarded
    /// to an upstream.
    authoritative: HashSet<Address>,
    /// Slots zeroed locally. They are absent from the trie but must not be re-fetched.
    zeroed: HashSet<(Address, U256)>,
    checkpoints: Vec<WorldCheckpoint>,
}

#[derive(Debug, Clone)]
struct WorldCheckpoint {
    storage: HashMap<Address, MerkleTrie>,
    dirty: HashSet<Address>,
    authoritative: HashSet<Address>,
    zeroed: HashSet<(Address, U256)>,
}

impl WorldState {
    /// Creates an empty world state.
    pub fn new() -> Self {
        Self::default()
    }

    fn hashed_address(&mut self, address: Address) -> B256 {
        let key = keccak256(address);
        self.address_preimages.entry(key).or_insert(address);
        key
    }

    /// Reads an account.
    pub fn get_account(&self, address: Address) -> Result<Option<Account>, StateError> {
        let key = keccak256(address);
        self.accounts
            .get(key.as_slice())
            .map(|raw| Account::decode_rlp(raw).map_err(|source| StateError::Decode { key, source }))
            .transpose()
    }

    /// Writes an account. Its storage root is taken from the account's storage trie, not from
    /// the passed value.
    pub fn put_account(&mut self, address: Address, mut account: Account) {
        account.storage_root = self.storage_root(address);
        let key = self.hashed_address(address);
        self.accounts.insert(key.as_slice(), account.encode_rlp());
        self.dirty.remove(&address);
    }

    /// Removes an account and its storage, and marks the account as authoritative.
    pub fn delete_account(&mut self, address: Address) {
        self.accounts.remove(keccak256(address).as_slice());
        self.storage.remove(&address);
        self.zeroed.retain(|(a, _)| *a != address);
        self.dirty.remove(&address);
        self.authoritative.insert(address);
    }

    /// Reads a storage slot. `None` means the slot is not stored locally.
    pub fn get_storage(&self, address: Address, slot: U256) -> Result<Option<U256>, StateError> {
        if self.zeroed.contains(&(address, slot)) {
            return Ok(Some(U256::ZERO));
        }
        let Some(trie) = self.storage.get(&address) else { return Ok(None) };
        let key = keccak256(slot.to_be_bytes::<32>());
        trie.get(key.as_slice())
            .map(|mut raw| U256::decode(&mut raw).map_err(|source| StateError::Decode { key, source }))
            .transpose()
    }

    /// Writes a storage slot. A zero value removes the slot.
    pub fn put_storage(&mut self, address: Address, slot: U256, value: U256) {
        let key = keccak256(slot.to_be_bytes::<32>());
        self.slot_preimages.entry(key).or_insert(slot);
        let trie = self.storage.entry(address).or_default();
        if value.is_zero() {
            trie.remove(key.as_slice());
            self.zeroed.insert((address, slot));
        } else {
            trie.insert(key.as_slice(), alloy_rlp::encode(value));
            self.zeroed.remove(&(address, slot));
        }
        self.dirty.insert(address);
    }

    /// Removes all storage of an account and marks the account as authoritative.
    pub fn clear_storage(&mut self, address: Address) {
        self.storage.remove(&address);
        self.zeroed.retain(|(a, _)| *a != address);
        self.dirty.insert(address);
        self.authoritative.insert(address);
    }

    /// Returns `true` if the account is fully known locally, so a missing account or slot is
    /// absent rather than unknown.
    pub fn is_authoritative(&self, address: Address) -> bool {
        self.authoritative.contains(&address)
    }

    /// Marks the account as fully known locally.
    pub fn mark_authoritative(&mut self, address: Address) {
        self.authoritative.insert(address);
    }

    /// Stores code and returns its hash.
    pub fn put_code(&mut self, code: Bytes) -> B256 {
        if code.is_empty() {
            return KECCAK256_EMPTY;
        }
        let hash = keccak256(&code);
        self.code.entry(hash).or_insert(code);
        hash
    }

    /// Looks up code by hash.
    pub fn code_by_hash(&self, hash: B256) -> Option<Bytes> {
        if hash == KECCAK256_EMPTY {
            return Some(Bytes::new());
        }
        self.code.get(&hash).cloned()
    }

    /// The root of an account's storage trie.
    pub fn storage_root(&self, address: Address) -> B256 {
        self.storage.get(&address).map_or(EMPTY_ROOT_HASH, MerkleTrie::root)
    }

    /// Folds pending storage changes into the account leaves and returns the state root.
    pub fn state_root(&mut self) -> Result<B256, StateError> {
        let dirty: Vec<_> = self.dirty.drain().collect();
        for address in dirty {
            if let Some(account) = self.get_account(address)? {
                self.put_account(address, account);
            }
        }
        Ok(self.accounts.root())
    }

    /// Returns every account in hashed-key order.
    pub fn accounts(&self) -> Result<Vec<(Address, Account)>, StateError> {
        self.accounts
            .iter()
            .filter_map(|(key, raw)| {
                let key = B256::from_slice(&key);
                let address = *self.address_preimages.get(&key)?;
                Some(
                    Account::decode_rlp(&raw)
                        .map(|account| (address, account))
                        .map_err(|source| StateError::Decode { key, source }),
                )
            })
            .collect()
    }

    /// Returns every non-zero storage slot of an account.
    pub fn storage_entries(&self, address: Address) -> Result<Vec<(U256, U256)>, StateError> {
        let Some(trie) = self.storage.get(&address) else { return Ok(Vec::new()) };
        trie.iter()
            .filter_map(|(key, raw)| {
                let key = B256::from_slice(&key);
                let slot = *self.slot_preimages.get(&key)?;
                Some(
                    U256::decode(&mut raw.as_slice())
                        .map(|value| (slot, value))
                        .map_err(|source| StateError::Decode { key, source }),
                )
            })
            .collect()
    }

    /// Records the current state so later changes can be reverted.
    pub fn checkpoint(&mut self) {
        self.accounts.checkpoint();
        self.checkpoints.push(WorldCheckpoint {
            storage: self.storage.clone(),
            dirty: self.dirty.clone(),
            authoritative: self.authoritative.clone(),
            zeroed: self.zeroed.clone(),
        });
    }

    /// Keeps all changes since the last checkpoint.
    ///
    /// # Panics
    ///
    /// Panics if there is no pending checkpoint.
    pub fn commit(&mut self) {
        assert!(self.checkpoints.pop().is_some(), "world state commit without a checkpoint");
        self.accounts.commit();
    }

    /// Discards all changes since the last checkpoint. Stored code is content addressed and
    /// is kept.
    ///
    /// # Panics
    ///
    /// Panics if there is no pending checkpoint.
    pub fn revert(&mut self) {
        let Some(checkpoint) = self.checkpoints.pop() else {
            panic!("world state revert without a checkpoint");
        };
        self.accounts.revert();
        self.storage = checkpoint.storage;
        self.dirty = checkpoint.dirty;
        self.authoritative = checkpoint.authoritative;
        self.zeroed = checkpoint.zeroed;
    }

    /// Returns `true` if a checkpoint is pending.
    pub fn has_checkpoints(&self) -> bool {
        !self.checkpoints.is_empty()
    }
}
