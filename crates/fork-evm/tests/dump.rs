//! Dumping a state to JSON and loading it back.

use alloy_primitives::{address, Address, Bytes, U256};
use fork_evm::{
    create_address,
    evm::BlockEnv,
    fork::{BlockRef, BlockingBridge, ForkConfig},
    runner::{run_tx, BlockContext},
    test_utils::{BytecodeBuilder, MockUpstream},
    Account, EvmConfig, ForkStateManager, NoOpInspector, NormalStateManager, StateDump,
    StateReader, StateWriter, Transaction,
};

const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
const TOKEN: Address = address!("00000000000000000000000000000000000070c0");

fn execute(state: &mut NormalStateManager, tx: &Transaction) {
    let config = EvmConfig::default();
    let block = BlockEnv::default();
    let ctx = BlockContext { config: &config, block: &block, hashes: &() };
    let outcome = run_tx(state, ctx, tx, NoOpInspector).unwrap();
    assert!(outcome.result.is_success(), "{:?}", outcome.result);
}

#[test]
fn test_round_trip_preserves_root() {
    let mut state = NormalStateManager::new();
    state.put_account(ALICE, Account::with_balance(U256::from(10).pow(U256::from(18))));
    // a contract that stores 7 in slot 1 on every call, deployed by a transaction
    let runtime = BytecodeBuilder::default().sstore(1, U256::from(7)).build();
    let init_code = BytecodeBuilder::default().sstore(0, U256::from(3)).into_init_code(&runtime);
    execute(&mut state, &Transaction::create(ALICE, init_code));
    let contract = create_address(ALICE, 0);
    execute(&mut state, &Transaction::call(ALICE, contract, Bytes::new()));

    let dump = state.dump_state().unwrap();
    let root = state.state_root().unwrap();
    assert_eq!(dump.len(), 2);
    assert_eq!(dump[&contract].code.as_ref(), Some(&runtime));
    assert_eq!(dump[&contract].storage.len(), 2);

    let json = serde_json::to_string_pretty(&dump).unwrap();
    let parsed: StateDump = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, dump);

    let mut loaded = NormalStateManager::new();
    assert_eq!(loaded.load_state(&parsed).unwrap(), root);
    assert_eq!(loaded.get_storage(contract, U256::ZERO).unwrap(), U256::from(3));
    assert_eq!(loaded.get_code(contract).unwrap(), runtime);
    assert_eq!(loaded.get_account(ALICE).unwrap().unwrap().nonce, 2);
    assert_eq!(loaded.dump_state().unwrap(), dump);
}

#[test]
fn test_load_replaces_existing_storage() {
    let mut state = NormalStateManager::new();
    state.put_account(TOKEN, Account::with_balance(U256::from(1)));
    state.put_storage(TOKEN, U256::from(1), U256::from(1));
    let dump = state.dump_state().unwrap();

    let mut target = NormalStateManager::new();
    target.put_account(TOKEN, Account::default());
    target.put_storage(TOKEN, U256::from(2), U256::from(2));
    target.flush().unwrap();

    let root = target.load_state(&dump).unwrap();
    assert_eq!(root, state.state_root().unwrap());
    assert_eq!(target.get_storage(TOKEN, U256::from(1)).unwrap(), U256::from(1));
    assert_eq!(target.get_storage(TOKEN, U256::from(2)).unwrap(), U256::ZERO);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_forked_values_survive_dump() {
    let upstream = MockUpstream::start(10).await;
    upstream.set_balance(TOKEN, U256::from(99));
    upstream.set_code(TOKEN, Bytes::from_static(&[0x00]));
    upstream.set_storage(TOKEN, U256::from(4), U256::from(44));

    let config = ForkConfig::new(upstream.url(), BlockRef::Latest);
    let bridge = BlockingBridge::current().unwrap();
    let mut forked = ForkStateManager::fork(&config, bridge).await.unwrap();
    assert_eq!(forked.get_account(TOKEN).unwrap().unwrap().balance, U256::from(99));
    assert_eq!(forked.get_storage(TOKEN, U256::from(4)).unwrap(), U256::from(44));
    let dump = forked.dump_state().unwrap();
    assert_eq!(dump[&TOKEN].balance, U256::from(99));
    assert_eq!(dump[&TOKEN].storage.get(&U256::from(4)), Some(&U256::from(44)));

    let mut local = NormalStateManager::new();
    local.load_state(&dump).unwrap();
    assert_eq!(local.get_storage(TOKEN, U256::from(4)).unwrap(), U256::from(44));
    assert_eq!(local.get_code(TOKEN).unwrap(), Bytes::from_static(&[0x00]));
}
