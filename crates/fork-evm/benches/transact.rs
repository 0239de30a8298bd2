//! Benchmarks for [`run_tx`] over an in-memory state.
//!
//! Each iteration executes one transaction against a freshly built state so that cold and warm
//! caches do not leak between samples.
#![allow(missing_docs)]

use alloy_primitives::{address, Address, Bytes, U256};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use fork_evm::{
    evm::BlockEnv,
    runner::{run_tx, BlockContext},
    test_utils::BytecodeBuilder,
    Account, EvmConfig, NoOpInspector, NormalStateManager, StateWriter, Transaction,
};
use revm_bytecode::opcode::{ADD, DUP2, GT, JUMPDEST, JUMPI, POP, PUSH0};

const CALLER: Address = address!("0000000000000000000000000000000000100000");
const CALLEE: Address = address!("0000000000000000000000000000000000100001");

/// A state holding a funded caller and, optionally, code at the callee.
fn setup(code: Option<Bytes>) -> NormalStateManager {
    let mut state = NormalStateManager::new();
    state.put_account(CALLER, Account::with_balance(U256::from(10).pow(U256::from(20))));
    if let Some(code) = code {
        state.put_code(CALLEE, code).unwrap();
    }
    state.flush().unwrap();
    state
}

fn execute(state: &mut NormalStateManager, tx: &Transaction) {
    let config = EvmConfig::default();
    let block = BlockEnv::default();
    let ctx = BlockContext { config: &config, block: &block, hashes: &() };
    let outcome = run_tx(state, ctx, black_box(tx), NoOpInspector).unwrap();
    assert!(outcome.result.is_success());
    black_box(outcome);
}

/// Counts down from 1000 to 0 on the stack.
fn countdown() -> Bytes {
    BytecodeBuilder::default()
        .push_number(1000u16)
        .append(JUMPDEST)
        // counter - 1
        .push_u256(U256::MAX)
        .append(ADD)
        .append_many([PUSH0, DUP2, GT])
        .push_number(3u8)
        .append(JUMPI)
        .append(POP)
        .return_empty()
        .build()
}

fn transact_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("transact");

    let transfer = Transaction {
        value: U256::from(1),
        gas_limit: 21_000,
        ..Transaction::call(CALLER, CALLEE, Bytes::new())
    };
    group.bench_function("transfer", |b| {
        b.iter_batched(|| setup(None), |mut state| execute(&mut state, &transfer), BatchSize::SmallInput)
    });

    let store = BytecodeBuilder::default()
        .sstore(0, U256::from(1))
        .sstore(1, U256::from(2))
        .sload(0)
        .return_top()
        .build();
    let call = Transaction { gas_limit: 200_000, ..Transaction::call(CALLER, CALLEE, Bytes::new()) };
    group.bench_function("storage", |b| {
        b.iter_batched(
            || setup(Some(store.clone())),
            |mut state| execute(&mut state, &call),
            BatchSize::SmallInput,
        )
    });

    let call = Transaction { gas_limit: 1_000_000, ..call };
    group.bench_function("loop", |b| {
        b.iter_batched(
            || setup(Some(countdown())),
            |mut state| execute(&mut state, &call),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, transact_benchmarks);
criterion_main!(benches);
