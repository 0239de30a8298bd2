//! Forked and proxied sessions against a mock upstream node.

use std::{sync::Arc, time::Duration};

use alloy_primitives::{address, Address, Bytes, B256, U256};
use fork_evm::{
    evm::BlockEnv,
    fork::{BlockRef, BlockingBridge, ForkConfig, ForkMode, ForkResolver},
    runner::{run_call, run_tx, BlockContext, RunTxError},
    test_utils::{BytecodeBuilder, MockUpstream},
    EvmConfig, ExecutionResult, ForkError, ForkStateManager, Node, NodeConfig, NoOpInspector,
    ProxyStateManager, StateError, StateReader, StateWriter, Transaction,
};
use serde_json::json;

const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
const BOB: Address = address!("0000000000000000000000000000000000000b0b");
const CONTRACT: Address = address!("000000000000000000000000000000000000c0de");

fn bridge() -> BlockingBridge {
    BlockingBridge::current().expect("multi-threaded test runtime")
}

fn ether() -> U256 {
    U256::from(10).pow(U256::from(18))
}

/// A contract returning storage slot 0.
fn slot_reader() -> Bytes {
    BytecodeBuilder::default().sload(0).return_top().build()
}

fn read_slot(tx_gas: u64) -> Transaction {
    Transaction { gas_limit: tx_gas, ..Transaction::call(ALICE, CONTRACT, Bytes::new()) }
}

async fn upstream() -> MockUpstream {
    let upstream = MockUpstream::start(100).await;
    upstream.set_balance(ALICE, ether());
    upstream.set_code(CONTRACT, slot_reader());
    upstream.set_storage(CONTRACT, U256::ZERO, U256::from(42));
    upstream
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fork_fetches_each_slot_once() {
    let upstream = upstream().await;
    let config = ForkConfig::new(upstream.url(), BlockRef::Latest);
    let mut state = ForkStateManager::fork(&config, bridge()).await.unwrap();
    assert_eq!(state.fork_block(), 100);

    let evm = EvmConfig::default();
    let block = BlockEnv::default();
    let ctx = BlockContext { config: &evm, block: &block, hashes: &() };
    for _ in 0..2 {
        let outcome = run_call(&mut state, ctx, &read_slot(100_000), NoOpInspector).unwrap();
        match outcome.result {
            ExecutionResult::Success { output, .. } => {
                assert_eq!(output.data().as_ref(), B256::from(U256::from(42)).as_slice());
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
    assert_eq!(state.get_storage(CONTRACT, U256::ZERO).unwrap(), U256::from(42));

    assert_eq!(upstream.requests("eth_getStorageAt"), 1);
    // every read is pinned to the fork block
    for params in upstream.params("eth_getBalance") {
        assert_eq!(params[1], json!("0x64"));
    }
    assert_eq!(state.fallback().resolver().upstream_requests() as usize, upstream.total_requests());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_local_writes_shadow_upstream() {
    let upstream = upstream().await;
    let config = ForkConfig::new(upstream.url(), BlockRef::Number(90));
    let mut state = ForkStateManager::fork(&config, bridge()).await.unwrap();
    assert_eq!(state.fork_block(), 90);
    assert_eq!(upstream.requests("eth_blockNumber"), 0);

    state.put_storage(CONTRACT, U256::from(1), U256::from(7));
    assert_eq!(state.get_storage(CONTRACT, U256::from(1)).unwrap(), U256::from(7));

    state.clear_storage(CONTRACT);
    assert_eq!(state.get_storage(CONTRACT, U256::ZERO).unwrap(), U256::ZERO);
    state.flush().unwrap();
    assert_eq!(state.get_storage(CONTRACT, U256::ZERO).unwrap(), U256::ZERO);
    assert_eq!(upstream.requests("eth_getStorageAt"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fork_by_block_hash() {
    let upstream = upstream().await;
    let hash = B256::repeat_byte(0x11);
    upstream.add_block(hash, 77);

    let config = ForkConfig::new(upstream.url(), BlockRef::Hash(hash));
    let state = ForkStateManager::fork(&config, bridge()).await.unwrap();
    assert_eq!(state.fork_block(), 77);

    let missing = ForkConfig::new(upstream.url(), BlockRef::Hash(B256::repeat_byte(0x22)));
    let err = ForkStateManager::fork(&missing, bridge()).await.unwrap_err();
    assert!(matches!(err, ForkError::BlockNotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upstream_failure_aborts_transaction() {
    let upstream = upstream().await;
    let config = ForkConfig::new(upstream.url(), BlockRef::Latest);
    let mut state = ForkStateManager::fork(&config, bridge()).await.unwrap();
    // the sender is known before the upstream goes away
    assert_eq!(state.get_account(ALICE).unwrap().unwrap().balance, ether());

    upstream.set_failing(true);
    let evm = EvmConfig::default();
    let block = BlockEnv::default();
    let ctx = BlockContext { config: &evm, block: &block, hashes: &() };
    let tx = Transaction { nonce: Some(0), ..read_slot(100_000) };
    let err = run_tx(&mut state, ctx, &tx, NoOpInspector).unwrap_err();
    assert!(matches!(err, RunTxError::State(StateError::Fork(_))));
    assert_eq!(state.checkpoint_depth(), 0);
    assert_eq!(state.get_account(ALICE).unwrap().unwrap().nonce, 0);

    // failed fetches are not cached
    upstream.set_failing(false);
    let outcome = run_tx(&mut state, ctx, &tx, NoOpInspector).unwrap();
    assert!(outcome.result.is_success());
    assert_eq!(state.get_account(ALICE).unwrap().unwrap().nonce, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_proxy_follows_head() {
    let upstream = upstream().await;
    let config = ForkConfig::new(upstream.url(), BlockRef::Latest);
    let mut state = ProxyStateManager::proxy(&config, Duration::ZERO, bridge()).await.unwrap();
    assert_eq!(state.fallback().block_number(), 100);

    state.lock().unwrap();
    assert_eq!(state.get_storage(CONTRACT, U256::ZERO).unwrap(), U256::from(42));
    state.unlock();

    upstream.set_head(101);
    upstream.set_storage(CONTRACT, U256::ZERO, U256::from(43));
    state.lock().unwrap();
    assert!(state.fallback().is_locked());
    assert_eq!(state.fallback().block_number(), 101);
    assert_eq!(state.get_storage(CONTRACT, U256::ZERO).unwrap(), U256::from(43));
    state.unlock();
    assert!(!state.fallback().is_locked());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_forked_node_starts_at_fork_block() {
    let upstream = upstream().await;
    let fork = ForkConfig { mode: ForkMode::Fork, ..ForkConfig::new(upstream.url(), BlockRef::Latest) };
    let node = Node::new(NodeConfig::default().with_fork(fork)).await.unwrap();
    assert_eq!(node.block_number(), 100);

    let balance = node.read_state(|state| state.get_account(ALICE)).unwrap().unwrap().balance;
    assert_eq!(balance, ether());

    let hash = node
        .send_transaction(Transaction {
            value: U256::from(1),
            gas_limit: 21_000,
            ..Transaction::call(ALICE, BOB, Bytes::new())
        })
        .unwrap();
    assert_eq!(node.block_number(), 101);
    assert_eq!(node.transaction(hash).unwrap().block_number, 101);
}

#[tokio::test]
async fn test_forked_node_on_current_thread_runtime() {
    let upstream = upstream().await;
    let node = Node::new(NodeConfig::default().with_fork(ForkConfig::new(upstream.url(), BlockRef::Latest)))
        .await
        .unwrap();

    let balance = node.read_state(|state| state.get_account(ALICE)).unwrap().unwrap().balance;
    assert_eq!(balance, ether());

    let outcome = node.call(&read_slot(100_000)).unwrap();
    match outcome.result {
        ExecutionResult::Success { output, .. } => {
            assert_eq!(output.data().as_ref(), B256::from(U256::from(42)).as_slice());
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(upstream.requests("eth_getStorageAt"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fetches_share_one_request() {
    let upstream = upstream().await;
    upstream.set_delay(Duration::from_millis(200));
    let config = ForkConfig::new(upstream.url(), BlockRef::Number(90));
    let resolver = Arc::new(ForkResolver::connect(config.provider().unwrap(), config.block).await.unwrap());

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.fetch_storage(CONTRACT, U256::ZERO).await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), U256::from(42));
    }

    assert_eq!(upstream.requests("eth_getStorageAt"), 1);
    assert_eq!(resolver.fetch_storage(CONTRACT, U256::ZERO).await.unwrap(), U256::from(42));
    assert_eq!(upstream.requests("eth_getStorageAt"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fork_reads_commit_to_state_root() {
    let upstream = upstream().await;
    let config = ForkConfig::new(upstream.url(), BlockRef::Latest);

    let mut forked = ForkStateManager::fork(&config, bridge()).await.unwrap();
    let empty = forked.state_root().unwrap();
    assert_eq!(forked.get_account(ALICE).unwrap().unwrap().balance, ether());
    let observed = forked.state_root().unwrap();
    assert_ne!(observed, empty);
    // served locally, so the root stays put
    assert_eq!(forked.get_account(ALICE).unwrap().unwrap().balance, ether());
    assert_eq!(forked.state_root().unwrap(), observed);
    assert_eq!(upstream.requests("eth_getBalance"), 1);

    let mut proxied = ProxyStateManager::proxy(&config, Duration::ZERO, bridge()).await.unwrap();
    let empty = proxied.state_root().unwrap();
    proxied.lock().unwrap();
    assert_eq!(proxied.get_account(ALICE).unwrap().unwrap().balance, ether());
    proxied.unlock();
    assert_eq!(proxied.state_root().unwrap(), empty);
}
