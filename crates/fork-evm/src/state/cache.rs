use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, Bytes, B256, U256};

use crate::Account;

/// An opaque marker returned by [`StateCache::checkpoint`].
///
/// It must be handed back to exactly one of `commit` or `revert`, in strict LIFO order.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a checkpoint must be committed or reverted"]
pub struct Checkpoint {
    depth: usize,
}

/// The writes recorded by one layer of the cache.
#[derive(Debug, Clone, Default)]
pub(crate) struct Layer {
    /// `None` marks a deleted account.
    pub(crate) accounts: HashMap<Address, Option<Account>>,
    pub(crate) storage: HashMap<Address, HashMap<U256, U256>>,
    /// Accounts whose storage was wiped in this layer. Slots written after the wipe live in
    /// `storage`.
    pub(crate) cleared: HashSet<Address>,
    pub(crate) code: HashMap<B256, Bytes>,
}

impl Layer {
    fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.storage.is_empty()
            && self.cleared.is_empty()
            && self.code.is_empty()
    }

    /// Applies `top` on top of `self`.
    fn merge(&mut self, top: Self) {
        self.accounts.extend(top.accounts);
        for address in top.cleared {
            self.storage.remove(&address);
            self.cleared.insert(address);
        }
        for (address, slots) in top.storage {
            self.storage.entry(address).or_default().extend(slots);
        }
        self.code.extend(top.code);
    }
}

/// The layered write cache in front of the world state.
///
/// The bottom layer holds the writes that have not been flushed yet. Every checkpoint pushes
/// a layer; reads walk from the top layer down and report a miss only if no layer knows the
/// key.
#[derive(Debug, Clone)]
pub struct StateCache {
    layers: Vec<Layer>,
}

impl Default for StateCache {
    fn default() -> Self {
        Self { layers: vec![Layer::default()] }
    }
}

impl StateCache {
    fn top(&mut self) -> &mut Layer {
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    /// Looks up an account. `Some(None)` means the account is known to be deleted.
    pub fn account(&self, address: Address) -> Option<Option<Account>> {
        self.layers.iter().rev().find_map(|layer| layer.accounts.get(&address).copied())
    }

    /// Looks up a storage slot.
    pub fn storage(&self, address: Address, slot: U256) -> Option<U256> {
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.storage.get(&address).and_then(|slots| slots.get(&slot)) {
                return Some(*value);
            }
            if layer.cleared.contains(&address) {
                return Some(U256::ZERO);
            }
        }
        None
    }

    /// Looks up code by hash.
    pub fn code(&self, hash: B256) -> Option<Bytes> {
        self.layers.iter().rev().find_map(|layer| layer.code.get(&hash).cloned())
    }

    /// Returns `true` if the account's storage was wiped in any live layer.
    pub fn is_cleared(&self, address: Address) -> bool {
        self.layers.iter().any(|layer| layer.cleared.contains(&address))
    }

    /// Writes an account, or a deletion marker.
    pub fn put_account(&mut self, address: Address, account: Option<Account>) {
        self.top().accounts.insert(address, account);
    }

    /// Writes a storage slot.
    pub fn put_storage(&mut self, address: Address, slot: U256, value: U256) {
        self.top().storage.entry(address).or_default().insert(slot, value);
    }

    /// Wipes the storage of an account.
    pub fn clear_storage(&mut self, address: Address) {
        let top = self.top();
        top.storage.remove(&address);
        top.cleared.insert(address);
    }

    /// Stores code under its hash.
    pub fn put_code(&mut self, hash: B256, code: Bytes) {
        self.top().code.insert(hash, code);
    }

    /// Pushes a new layer.
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.layers.push(Layer::default());
        Checkpoint { depth: self.layers.len() - 1 }
    }

    /// Merges the top layer into the one beneath it.
    ///
    /// # Panics
    ///
    /// Panics if `checkpoint` is not the most recent pending checkpoint.
    pub fn commit(&mut self, checkpoint: Checkpoint) {
        self.assert_top(&checkpoint, "commit");
        if let Some(top) = self.layers.pop() {
            self.top().merge(top);
        }
    }

    /// Discards the top layer.
    ///
    /// # Panics
    ///
    /// Panics if `checkpoint` is not the most recent pending checkpoint.
    pub fn revert(&mut self, checkpoint: Checkpoint) {
        self.assert_top(&checkpoint, "revert");
        self.layers.pop();
    }

    fn assert_top(&self, checkpoint: &Checkpoint, op: &str) {
        assert!(
            checkpoint.depth > 0 && checkpoint.depth == self.layers.len() - 1,
            "checkpoint {op} out of order: checkpoint at depth {}, {} pending",
            checkpoint.depth,
            self.layers.len() - 1,
        );
    }

    /// The number of pending checkpoints.
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    /// Returns `true` if there are no pending writes and no pending checkpoints.
    pub fn is_empty(&self) -> bool {
        self.layers.len() == 1 && self.layers[0].is_empty()
    }

    /// Takes the unflushed writes.
    ///
    /// # Panics
    ///
    /// Panics if a checkpoint is pending.
    pub(crate) fn take_pending(&mut self) -> Layer {
        assert!(self.layers.len() == 1, "flush with {} pending checkpoints", self.layers.len() - 1);
        std::mem::take(&mut self.layers[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");

    #[test]
    fn test_reads_see_latest_layer() {
        let mut cache = StateCache::default();
        cache.put_storage(ALICE, U256::from(1), U256::from(1));
        let checkpoint = cache.checkpoint();
        cache.put_storage(ALICE, U256::from(1), U256::from(2));
        assert_eq!(cache.storage(ALICE, U256::from(1)), Some(U256::from(2)));
        cache.revert(checkpoint);
        assert_eq!(cache.storage(ALICE, U256::from(1)), Some(U256::from(1)));
    }

    #[test]
    fn test_clear_then_write_in_same_layer() {
        let mut cache = StateCache::default();
        cache.put_storage(ALICE, U256::from(1), U256::from(1));
        cache.put_storage(ALICE, U256::from(2), U256::from(2));
        let checkpoint = cache.checkpoint();
        cache.clear_storage(ALICE);
        cache.put_storage(ALICE, U256::from(2), U256::from(3));
        cache.commit(checkpoint);

        assert_eq!(cache.storage(ALICE, U256::from(1)), Some(U256::ZERO));
        assert_eq!(cache.storage(ALICE, U256::from(2)), Some(U256::from(3)));
        assert_eq!(cache.storage(ALICE, U256::from(3)), Some(U256::ZERO));
        assert!(cache.is_cleared(ALICE));
    }

    #[test]
    fn test_deleted_account_is_known() {
        let mut cache = StateCache::default();
        assert_eq!(cache.account(ALICE), None);
        cache.put_account(ALICE, None);
        assert_eq!(cache.account(ALICE), Some(None));
    }

    #[test]
    #[should_panic(expected = "checkpoint commit out of order")]
    fn test_commit_out_of_order_panics() {
        let mut cache = StateCache::default();
        let outer = cache.checkpoint();
        let _inner = cache.checkpoint();
        cache.commit(outer);
    }

    #[test]
    #[should_panic(expected = "flush with 1 pending checkpoints")]
    fn test_take_pending_with_checkpoint_panics() {
        let mut cache = StateCache::default();
        let _checkpoint = cache.checkpoint();
        cache.take_pending();
    }
}
