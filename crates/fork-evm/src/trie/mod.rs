//! The Merkle-Patricia trie storage layer.
//!
//! [`MerkleTrie`] is a persistent, in-memory trie whose root hash follows the Ethereum
//! encoding, so it can be cross-checked against any other Ethereum trie implementation.
//! Nodes are reference counted and never mutated in place: cloning a trie or taking a
//! checkpoint is O(1) and shares every node with the original.
//!
//! [`WorldState`] composes an account trie, one storage trie per account and a code store.

mod nibbles;
pub use nibbles::Nibbles;

mod node;
use node::{Node, NodeRef};

mod world;
pub use world::*;

use alloy_primitives::B256;

/// A Merkle-Patricia trie over raw byte keys.
///
/// Callers that need the "secure" layout hash their keys before calling in (see
/// [`WorldState`]).
#[derive(Debug, Clone)]
pub struct MerkleTrie {
    root: NodeRef,
    checkpoints: Vec<NodeRef>,
}

impl Default for MerkleTrie {
    fn default() -> Self {
        Self { root: Node::empty(), checkpoints: Vec::new() }
    }
}

impl MerkleTrie {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        node::get(&self.root, Nibbles::unpack(key).as_slice())
    }

    /// Stores `value` under `key`. An empty value deletes the key.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        if value.is_empty() {
            self.remove(key);
            return;
        }
        self.root = node::insert(&self.root, Nibbles::unpack(key).as_slice(), value);
    }

    /// Removes `key`. Returns `true` if it was present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        match node::delete(&self.root, Nibbles::unpack(key).as_slice()) {
            Some(root) => {
                self.root = root;
                true
            }
            None => false,
        }
    }

    /// Returns `true` if the trie holds no entries.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The root hash. Depends only on the set of key/value pairs, not on insertion order.
    pub fn root(&self) -> B256 {
        self.root.hash()
    }

    /// Returns every key/value pair in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> {
        let mut entries = Vec::new();
        node::collect(&self.root, &mut Vec::new(), &mut entries);
        entries.into_iter().map(|(path, value)| (path.pack(), value))
    }

    /// Records the current root so later changes can be reverted.
    pub fn checkpoint(&mut self) {
        self.checkpoints.push(self.root.clone());
    }

    /// Keeps all changes since the last checkpoint.
    ///
    /// # Panics
    ///
    /// Panics if there is no pending checkpoint.
    pub fn commit(&mut self) {
        assert!(self.checkpoints.pop().is_some(), "trie commit without a checkpoint");
    }

    /// Discards all changes since the last checkpoint.
    ///
    /// # Panics
    ///
    /// Panics if there is no pending checkpoint.
    pub fn revert(&mut self) {
        match self.checkpoints.pop() {
            Some(root) => self.root = root,
            None => panic!("trie revert without a checkpoint"),
        }
    }

    /// Returns `true` if a checkpoint is pending.
    pub fn has_checkpoints(&self) -> bool {
        !self.checkpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{keccak256, U256};
    use alloy_trie::{HashBuilder, EMPTY_ROOT_HASH};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn reference_root(entries: &BTreeMap<Vec<u8>, Vec<u8>>) -> B256 {
        let mut builder = HashBuilder::default();
        for (key, value) in entries {
            builder.add_leaf(alloy_trie::Nibbles::unpack(key), value);
        }
        builder.root()
    }

    #[test]
    fn test_empty_root() {
        assert_eq!(MerkleTrie::new().root(), EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_get_insert_remove() {
        let mut trie = MerkleTrie::new();
        trie.insert(b"do", b"verb".to_vec());
        trie.insert(b"dog", b"puppy".to_vec());
        trie.insert(b"doge", b"coin".to_vec());
        trie.insert(b"horse", b"stallion".to_vec());

        assert_eq!(trie.get(b"dog"), Some(&b"puppy"[..]));
        assert_eq!(trie.get(b"do"), Some(&b"verb"[..]));
        assert_eq!(trie.get(b"d"), None);

        assert!(trie.remove(b"dog"));
        assert!(!trie.remove(b"dog"));
        assert_eq!(trie.get(b"dog"), None);
        assert_eq!(trie.get(b"doge"), Some(&b"coin"[..]));
    }

    #[test]
    fn test_known_root() {
        // The classic "doe/dog/dogglesworth" example.
        let mut trie = MerkleTrie::new();
        trie.insert(b"doe", b"reindeer".to_vec());
        trie.insert(b"dog", b"puppy".to_vec());
        trie.insert(b"dogglesworth", b"cat".to_vec());
        assert_eq!(
            trie.root(),
            alloy_primitives::b256!(
                "8aad789dff2f538bca5d8ea56e8abe10f4c7ba3a5dea95fea4cd6e7c3a1168d3"
            )
        );
    }

    #[test]
    fn test_removing_everything_restores_empty_root() {
        let mut trie = MerkleTrie::new();
        for i in 0u64..64 {
            trie.insert(keccak256(i.to_be_bytes()).as_slice(), vec![i as u8 + 1]);
        }
        for i in 0u64..64 {
            assert!(trie.remove(keccak256(i.to_be_bytes()).as_slice()));
        }
        assert!(trie.is_empty());
        assert_eq!(trie.root(), EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_checkpoint_revert_restores_root() {
        let mut trie = MerkleTrie::new();
        trie.insert(&[1; 32], vec![1]);
        let before = trie.root();

        trie.checkpoint();
        trie.insert(&[2; 32], vec![2]);
        trie.remove(&[1; 32]);
        assert_ne!(trie.root(), before);
        trie.revert();

        assert_eq!(trie.root(), before);
        assert_eq!(trie.get(&[1; 32]), Some(&[1u8][..]));
        assert!(!trie.has_checkpoints());
    }

    #[test]
    #[should_panic(expected = "trie commit without a checkpoint")]
    fn test_commit_without_checkpoint_panics() {
        MerkleTrie::new().commit();
    }

    #[test]
    fn test_iter_is_sorted() {
        let mut trie = MerkleTrie::new();
        for key in [[3u8; 32], [1u8; 32], [2u8; 32]] {
            trie.insert(&key, vec![key[0]]);
        }
        let keys: Vec<_> = trie.iter().map(|(k, _)| k[0]).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    proptest! {
        #[test]
        fn proptest_root_matches_hash_builder(
            entries in prop::collection::btree_map(any::<u64>(), 1u64..u64::MAX, 1..64)
        ) {
            let entries: BTreeMap<Vec<u8>, Vec<u8>> = entries
                .into_iter()
                .map(|(k, v)| (keccak256(k.to_be_bytes()).to_vec(), alloy_rlp::encode(U256::from(v))))
                .collect();
            let mut trie = MerkleTrie::new();
            for (key, value) in entries.iter().rev() {
                trie.insert(key, value.clone());
            }
            prop_assert_eq!(trie.root(), reference_root(&entries));
        }

        #[test]
        fn proptest_root_is_order_independent(
            keys in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..6), 1..32),
            seed in any::<u64>(),
        ) {
            let mut forward = MerkleTrie::new();
            for (i, key) in keys.iter().enumerate() {
                forward.insert(key, vec![i as u8 + 1]);
            }
            // Re-insert the final value of each key in a shuffled order.
            let mut last = BTreeMap::new();
            for (i, key) in keys.iter().enumerate() {
                last.insert(key.clone(), vec![i as u8 + 1]);
            }
            let mut shuffled: Vec<_> = last.into_iter().collect();
            let len = shuffled.len();
            for i in 0..len {
                shuffled.swap(i, (seed as usize).wrapping_add(i * 7) % len);
            }
            let mut backward = MerkleTrie::new();
            for (key, value) in shuffled {
                backward.insert(&key, value);
            }
            prop_assert_eq!(forward.root(), backward.root());
        }
    }
}
