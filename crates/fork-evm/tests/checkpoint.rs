//! Properties of the checkpointed state and of the trie.

use std::collections::BTreeMap;

use alloy_primitives::{keccak256, Address, U256};
use alloy_trie::HashBuilder;
use fork_evm::{
    trie::MerkleTrie, Account, Checkpoint, NormalStateManager, StateReader, StateWriter,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Balance(u8, u64),
    Storage(u8, u8, u64),
    Delete(u8),
    Checkpoint,
    Commit,
    Revert,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..3u8, 0..5u64).prop_map(|(a, v)| Op::Balance(a, v)),
        3 => (0..3u8, 0..4u8, 0..3u64).prop_map(|(a, s, v)| Op::Storage(a, s, v)),
        1 => (0..3u8).prop_map(Op::Delete),
        2 => Just(Op::Checkpoint),
        1 => Just(Op::Commit),
        1 => Just(Op::Revert),
    ]
}

/// The expected state: balances of existing accounts and non-zero slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Model {
    accounts: BTreeMap<u8, u64>,
    storage: BTreeMap<(u8, u8), u64>,
}

fn address(index: u8) -> Address {
    Address::with_last_byte(index + 1)
}

fn slot(index: u8) -> U256 {
    U256::from(index)
}

fn apply(state: &mut NormalStateManager, model: &mut Model, op: &Op) {
    match *op {
        Op::Balance(a, v) => {
            let account = state.get_account(address(a)).unwrap().unwrap_or_default();
            state.put_account(address(a), Account { balance: U256::from(v), ..account });
            model.accounts.insert(a, v);
        }
        Op::Storage(a, s, v) => {
            state.put_storage(address(a), slot(s), U256::from(v));
            if v == 0 {
                model.storage.remove(&(a, s));
            } else {
                model.storage.insert((a, s), v);
            }
        }
        Op::Delete(a) => {
            state.delete_account(address(a));
            model.accounts.remove(&a);
            model.storage.retain(|(address, _), _| *address != a);
        }
        Op::Checkpoint | Op::Commit | Op::Revert => unreachable!("handled by the driver"),
    }
}

fn assert_matches(state: &mut NormalStateManager, model: &Model) {
    for a in 0..3u8 {
        let account = state.get_account(address(a)).unwrap();
        assert_eq!(account.map(|account| account.balance), model.accounts.get(&a).map(|v| U256::from(*v)));
        for s in 0..4u8 {
            let expected = model.storage.get(&(a, s)).copied().unwrap_or_default();
            assert_eq!(state.get_storage(address(a), slot(s)).unwrap(), U256::from(expected));
        }
    }
}

fn build(model: &Model) -> NormalStateManager {
    let mut state = NormalStateManager::new();
    for (a, balance) in &model.accounts {
        state.put_account(address(*a), Account::with_balance(U256::from(*balance)));
    }
    for ((a, s), value) in &model.storage {
        state.put_storage(address(*a), slot(*s), U256::from(*value));
    }
    state
}

proptest! {
    #[test]
    fn proptest_checkpoints_match_model(ops in prop::collection::vec(op(), 1..60)) {
        let mut state = NormalStateManager::new();
        let mut model = Model::default();
        let mut pending: Vec<(Checkpoint, Model)> = Vec::new();

        for op in &ops {
            match op {
                Op::Checkpoint => pending.push((state.checkpoint(), model.clone())),
                Op::Commit => {
                    if let Some((checkpoint, _)) = pending.pop() {
                        state.commit(checkpoint);
                    }
                }
                Op::Revert => {
                    if let Some((checkpoint, saved)) = pending.pop() {
                        state.revert(checkpoint);
                        model = saved;
                    }
                }
                op => apply(&mut state, &mut model, op),
            }
            assert_matches(&mut state, &model);
        }
        while let Some((checkpoint, _)) = pending.pop() {
            state.commit(checkpoint);
        }

        let root = state.flush().unwrap();
        assert_matches(&mut state, &model);
        prop_assert_eq!(root, build(&model).flush().unwrap());
    }

    #[test]
    fn proptest_revert_to_start_restores_root(
        setup in prop::collection::vec(op(), 0..20),
        ops in prop::collection::vec(op(), 0..40),
    ) {
        let mut state = NormalStateManager::new();
        let mut model = Model::default();
        for op in setup.iter().filter(|op| matches!(op, Op::Balance(..) | Op::Storage(..) | Op::Delete(..))) {
            apply(&mut state, &mut model, op);
        }
        let root = state.flush().unwrap();

        let checkpoint = state.checkpoint();
        let mut scratch = model.clone();
        for op in ops.iter().filter(|op| matches!(op, Op::Balance(..) | Op::Storage(..) | Op::Delete(..))) {
            apply(&mut state, &mut scratch, op);
        }
        state.revert(checkpoint);

        assert_matches(&mut state, &model);
        prop_assert_eq!(state.flush().unwrap(), root);
    }

    #[test]
    fn proptest_trie_root_is_order_independent(
        entries in prop::collection::btree_map(any::<u64>(), prop::collection::vec(any::<u8>(), 1..40), 1..50),
    ) {
        let entries: BTreeMap<_, _> =
            entries.into_iter().map(|(key, value)| (keccak256(key.to_be_bytes()), value)).collect();

        let mut forward = MerkleTrie::new();
        for (key, value) in &entries {
            forward.insert(key.as_slice(), value.clone());
        }
        let mut backward = MerkleTrie::new();
        for (key, value) in entries.iter().rev() {
            backward.insert(key.as_slice(), value.clone());
        }
        prop_assert_eq!(forward.root(), backward.root());

        let mut reference = HashBuilder::default();
        for (key, value) in &entries {
            reference.add_leaf(alloy_trie::Nibbles::unpack(key), value);
        }
        prop_assert_eq!(forward.root(), reference.root());
    }
}
