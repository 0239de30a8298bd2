//! End-to-end execution scenarios: gas accounting, frame reverts, creation and logs.

use alloy_primitives::{address, Address, Bloom, BloomInput, Bytes, B256, U256};
use fork_evm::{
    create_address,
    evm::BlockEnv,
    runner::{run_call, run_tx, BlockContext, TxOutcome},
    test_utils::BytecodeBuilder,
    Account, EvmConfig, ExecutionResult, HaltReason, NoOpInspector, NormalStateManager,
    StateReader, StateWriter, Transaction,
};
use proptest::prelude::*;
use revm_bytecode::opcode::{
    ADD, ADDRESS, CALL, DUP1, GAS, JUMP, JUMPDEST, LOG1, PUSH0, PUSH1, SELFDESTRUCT, SLOAD,
    SSTORE, STATICCALL, STOP, SWAP1, TLOAD, TSTORE,
};

const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
const BOB: Address = address!("0000000000000000000000000000000000000b0b");
const CONTRACT: Address = address!("000000000000000000000000000000000000c0de");
const OTHER: Address = address!("000000000000000000000000000000000000c0df");

fn state() -> NormalStateManager {
    let mut state = NormalStateManager::new();
    state.put_account(ALICE, Account::with_balance(U256::from(10).pow(U256::from(18))));
    state
}

fn execute(state: &mut NormalStateManager, tx: &Transaction) -> TxOutcome {
    let config = EvmConfig::default();
    let block = BlockEnv::default();
    let ctx = BlockContext { config: &config, block: &block, hashes: &() };
    run_tx(state, ctx, tx, NoOpInspector).unwrap()
}

fn execute_with(
    state: &mut NormalStateManager,
    config: &EvmConfig,
    block: &BlockEnv,
    tx: &Transaction,
) -> TxOutcome {
    let ctx = BlockContext { config, block, hashes: &() };
    run_tx(state, ctx, tx, NoOpInspector).unwrap()
}

fn call(gas_limit: u64) -> Transaction {
    Transaction { gas_limit, ..Transaction::call(ALICE, CONTRACT, Bytes::new()) }
}

fn word(value: u64) -> Bytes {
    Bytes::copy_from_slice(B256::from(U256::from(value)).as_slice())
}

#[test]
fn test_cold_sstore_gas() {
    let mut state = state();
    state.put_code(CONTRACT, BytecodeBuilder::default().sstore(0, U256::from(1)).build()).unwrap();

    let outcome = execute(&mut state, &call(100_000));
    // PUSH1 + PUSH0 + cold SSTORE of a zero slot
    assert_eq!(outcome.gas_used(), 21_000 + 3 + 2 + 22_100);
    assert_eq!(state.get_storage(CONTRACT, U256::ZERO).unwrap(), U256::from(1));
}

#[test]
fn test_clearing_slot_refunds() {
    let mut state = state();
    state.put_code(CONTRACT, BytecodeBuilder::default().sstore(0, U256::ZERO).build()).unwrap();
    state.put_storage(CONTRACT, U256::ZERO, U256::from(1));
    state.flush().unwrap();

    let outcome = execute(&mut state, &call(100_000));
    let spent = 21_000 + 2 + 2 + 5_000;
    match outcome.result {
        ExecutionResult::Success { gas_used, gas_refunded, .. } => {
            assert_eq!(gas_refunded, 4_800);
            assert_eq!(gas_used, spent - 4_800);
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(state.get_storage(CONTRACT, U256::ZERO).unwrap(), U256::ZERO);
}

#[test]
fn test_revert_discards_writes_but_charges_gas() {
    let mut state = state();
    let code = BytecodeBuilder::default().sstore(0, U256::from(1)).revert().build();
    state.put_code(CONTRACT, code).unwrap();

    let outcome = execute(&mut state, &call(100_000));
    assert!(matches!(outcome.result, ExecutionResult::Revert { .. }));
    assert_eq!(outcome.gas_used(), 21_000 + 3 + 2 + 22_100 + 2 + 2);
    assert_eq!(state.get_storage(CONTRACT, U256::ZERO).unwrap(), U256::ZERO);
    // the nonce bump survives the revert
    assert_eq!(state.get_account(ALICE).unwrap().unwrap().nonce, 1);
}

#[test]
fn test_infinite_loop_runs_out_of_gas() {
    let mut state = state();
    state.put_code(CONTRACT, Bytes::from_static(&[JUMPDEST, PUSH0, JUMP])).unwrap();

    let outcome = execute(&mut state, &call(50_000));
    assert_eq!(
        outcome.result,
        ExecutionResult::Halt { reason: HaltReason::OutOfGas, gas_used: 50_000 }
    );
    assert!(!outcome.receipt.receipt.status.coerce_status());
}

#[test]
fn test_create_deploys_runtime() {
    let mut state = state();
    let runtime = BytecodeBuilder::default().return_with_data([0x2a]).build();
    let init_code = BytecodeBuilder::default().into_init_code(&runtime);

    let outcome = execute(&mut state, &Transaction::create(ALICE, init_code));
    let expected = create_address(ALICE, 0);
    assert_eq!(outcome.contract_address(), Some(expected));
    assert_eq!(state.get_code(expected).unwrap(), runtime);
    assert_eq!(state.get_account(expected).unwrap().unwrap().nonce, 1);
    assert_eq!(state.get_account(ALICE).unwrap().unwrap().nonce, 1);

    let called = execute(&mut state, &Transaction::call(ALICE, expected, Bytes::new()));
    assert_eq!(called.result.output().unwrap().as_ref(), &[0x2a]);
}

#[test]
fn test_constructor_storage_is_visible_to_getter() {
    let mut state = state();
    let getter = BytecodeBuilder::default().sload(0).return_top().build();
    let init_code = BytecodeBuilder::default().sstore(0, U256::from(20)).into_init_code(&getter);

    let deployed = execute(&mut state, &Transaction::create(ALICE, init_code));
    let contract = deployed.contract_address().unwrap();
    let called = execute(&mut state, &Transaction::call(ALICE, contract, Bytes::new()));
    assert_eq!(called.result.output(), Some(&word(20)));
}

#[test]
fn test_reverted_subcall_keeps_outer_writes() {
    let mut state = state();
    state.put_code(OTHER, BytecodeBuilder::default().sstore(0, U256::from(7)).revert().build()).unwrap();
    let outer = BytecodeBuilder::default()
        .sstore(0, U256::from(1))
        .call(OTHER, U256::ZERO)
        .sstore(1, U256::from(2))
        .return_top()
        .build();
    state.put_code(CONTRACT, outer).unwrap();

    let outcome = execute(&mut state, &call(200_000));
    assert!(outcome.result.is_success());
    // the sub-call failed
    assert_eq!(outcome.result.output(), Some(&word(0)));
    assert_eq!(state.get_storage(CONTRACT, U256::ZERO).unwrap(), U256::from(1));
    assert_eq!(state.get_storage(CONTRACT, U256::from(1)).unwrap(), U256::from(2));
    assert_eq!(state.get_storage(OTHER, U256::ZERO).unwrap(), U256::ZERO);
}

#[test]
fn test_selfdestruct_in_creating_transaction_removes_contract() {
    let mut state = state();
    let init_code = BytecodeBuilder::default().push_address(BOB).append(SELFDESTRUCT).build();
    let tx = Transaction { value: U256::from(5), ..Transaction::create(ALICE, init_code) };

    let outcome = execute(&mut state, &tx);
    assert!(outcome.result.is_success());
    assert_eq!(state.get_account(create_address(ALICE, 0)).unwrap(), None);
    assert_eq!(state.get_account(BOB).unwrap().unwrap().balance, U256::from(5));
}

#[test]
fn test_transient_storage_is_cleared_between_transactions() {
    let mut state = state();
    let writer = BytecodeBuilder::default()
        .push_number(7u8)
        .append_many([PUSH0, TSTORE, PUSH0, TLOAD])
        .return_top()
        .build();
    let reader = BytecodeBuilder::default().append_many([PUSH0, TLOAD]).return_top().build();
    state.put_code(CONTRACT, writer).unwrap();
    state.put_code(OTHER, reader).unwrap();

    let written = execute(&mut state, &call(100_000));
    assert_eq!(written.result.output(), Some(&word(7)));

    let read = execute(&mut state, &Transaction::call(ALICE, OTHER, Bytes::new()));
    assert_eq!(read.result.output(), Some(&word(0)));
}

#[test]
fn test_static_call_cannot_write() {
    let mut state = state();
    state.put_code(OTHER, Bytes::from_static(&[PUSH0, PUSH0, SSTORE])).unwrap();
    let caller = BytecodeBuilder::default()
        .append_many([PUSH0, PUSH0, PUSH0, PUSH0])
        .push_address(OTHER)
        .append_many([GAS, STATICCALL])
        .return_top()
        .build();
    state.put_code(CONTRACT, caller).unwrap();

    let outcome = execute(&mut state, &call(200_000));
    // the outer frame survives and observes the failure
    assert!(outcome.result.is_success());
    assert_eq!(outcome.result.output(), Some(&word(0)));
}

#[test]
fn test_logs_land_in_receipt_bloom() {
    let mut state = state();
    let topic = B256::repeat_byte(0x42);
    let code = BytecodeBuilder::default()
        .push_bytes(topic)
        .append_many([PUSH0, PUSH0, LOG1])
        .build();
    state.put_code(CONTRACT, code).unwrap();

    let outcome = execute(&mut state, &call(100_000));
    let logs = outcome.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].address, CONTRACT);
    assert_eq!(logs[0].topics(), &[topic]);

    let bloom: Bloom = outcome.receipt.logs_bloom;
    assert!(bloom.contains_input(BloomInput::Raw(CONTRACT.as_slice())));
    assert!(bloom.contains_input(BloomInput::Raw(topic.as_slice())));
}

#[test]
fn test_identity_precompile() {
    let mut state = state();
    let identity = Address::with_last_byte(4);
    let tx = Transaction::call(ALICE, identity, Bytes::from_static(&[1, 2, 3]));

    let config = EvmConfig::default();
    let block = BlockEnv::default();
    let ctx = BlockContext { config: &config, block: &block, hashes: &() };
    let outcome = run_call(&mut state, ctx, &tx, NoOpInspector).unwrap();
    assert_eq!(outcome.result.output().unwrap().as_ref(), &[1, 2, 3]);
    // eth_call semantics: nothing is committed
    assert_eq!(state.get_account(ALICE).unwrap().unwrap().nonce, 0);
}

/// Calls itself with all remaining gas, ignoring the result.
const SELF_CALL: [u8; 9] = [PUSH0, PUSH0, PUSH0, PUSH0, PUSH0, ADDRESS, GAS, CALL, STOP];

/// Increments slot 0, calls itself, and stores the call's success flag at the new count.
const COUNTING_SELF_CALL: [u8; 18] = [
    PUSH0, SLOAD, PUSH1, 1, ADD, DUP1, PUSH0, SSTORE, PUSH0, PUSH0, PUSH0, PUSH0, PUSH0, ADDRESS,
    GAS, CALL, SWAP1, SSTORE,
];

#[test]
fn test_unbounded_self_call_completes() {
    let mut state = state();
    state.put_code(CONTRACT, Bytes::from_static(&SELF_CALL)).unwrap();

    let outcome = execute(&mut state, &call(30_000_000));
    assert!(outcome.result.is_success());
}

#[test]
fn test_call_past_depth_limit_fails_and_caller_continues() {
    let mut state = state();
    let mut code = COUNTING_SELF_CALL.to_vec();
    code.push(STOP);
    state.put_code(CONTRACT, Bytes::from(code)).unwrap();
    let config = EvmConfig { call_depth_limit: 16, ..Default::default() };

    let outcome = execute_with(&mut state, &config, &BlockEnv::default(), &call(10_000_000));
    assert!(outcome.result.is_success());
    // the top-level frame plus sixteen nested ones ran
    assert_eq!(state.get_storage(CONTRACT, U256::ZERO).unwrap(), U256::from(17));
    // the innermost frame saw its call fail
    assert_eq!(state.get_storage(CONTRACT, U256::from(17)).unwrap(), U256::ZERO);
    for depth in 1..17 {
        assert_eq!(state.get_storage(CONTRACT, U256::from(depth)).unwrap(), U256::from(1));
    }
}

#[test]
fn test_default_depth_limit_allows_1025_frames() {
    let mut state = state();
    let code = [PUSH0, SLOAD, PUSH1, 1, ADD, PUSH0, SSTORE]
        .into_iter()
        .chain(SELF_CALL)
        .collect::<Vec<_>>();
    state.put_code(CONTRACT, Bytes::from(code)).unwrap();
    let gas_limit = 1_000_000_000_000;
    let block = BlockEnv { gas_limit, ..Default::default() };

    let outcome = execute_with(&mut state, &EvmConfig::default(), &block, &call(gas_limit));
    assert!(outcome.result.is_success());
    assert_eq!(state.get_storage(CONTRACT, U256::ZERO).unwrap(), U256::from(1025));
}

#[test]
fn test_jump_to_non_jumpdest_halts() {
    let mut state = state();
    state.put_code(CONTRACT, Bytes::from_static(&[PUSH1, 3, JUMP, STOP, STOP])).unwrap();

    let outcome = execute(&mut state, &call(50_000));
    assert_eq!(
        outcome.result,
        ExecutionResult::Halt { reason: HaltReason::InvalidJump, gas_used: 50_000 }
    );
}

#[test]
fn test_jumpdest_inside_push_data_is_not_a_target() {
    let mut state = state();
    // byte 1 is 0x5b, but only as the operand of PUSH1
    state.put_code(CONTRACT, Bytes::from_static(&[PUSH1, JUMPDEST, PUSH1, 1, JUMP])).unwrap();

    let outcome = execute(&mut state, &call(50_000));
    assert_eq!(
        outcome.result,
        ExecutionResult::Halt { reason: HaltReason::InvalidJump, gas_used: 50_000 }
    );
}

#[test]
fn test_undefined_opcode_consumes_all_gas() {
    let mut state = state();
    state.put_code(CONTRACT, Bytes::from_static(&[PUSH0, 0x0c])).unwrap();

    let outcome = execute(&mut state, &call(50_000));
    assert_eq!(
        outcome.result,
        ExecutionResult::Halt { reason: HaltReason::InvalidOpcode(0x0c), gas_used: 50_000 }
    );
    assert_eq!(state.get_account(ALICE).unwrap().unwrap().nonce, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn proptest_gas_stays_within_limit(
        code in prop::collection::vec(any::<u8>(), 0..64),
        gas_limit in 21_000u64..300_000,
    ) {
        let mut state = state();
        state.put_code(CONTRACT, Bytes::from(code)).unwrap();
        state.put_storage(CONTRACT, U256::ZERO, U256::from(1));
        state.flush().unwrap();

        let outcome = execute(&mut state, &call(gas_limit));
        prop_assert!(outcome.gas_used() <= gas_limit);
        if let ExecutionResult::Success { gas_used, gas_refunded, .. } = outcome.result {
            prop_assert!(gas_refunded <= (gas_used + gas_refunded) / 5);
        }
    }
}
