use std::collections::{BTreeMap, BTreeSet, HashSet};

use alloy_primitives::{Address, Bytes, B256, U256};
use revm_bytecode::opcode::{
    BALANCE, CALL, CALLCODE, DELEGATECALL, EXTCODECOPY, EXTCODEHASH, EXTCODESIZE, SELFDESTRUCT,
    SLOAD, SSTORE, STATICCALL,
};
use serde::{Deserialize, Serialize};

use crate::{
    evm::Inspector,
    interpreter::{to_address, CallInputs, CreateInputs, Interpreter},
    StateError, StateReader,
};

/// An account before execution, in the layout of geth's `prestateTracer`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrestateAccount {
    /// Balance.
    pub balance: U256,
    /// Nonce, omitted when zero.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub nonce: u64,
    /// Code, omitted when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
    /// Every slot the transaction accessed, with its value before execution.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<B256, B256>,
}

const fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// The accounts a transaction touched, as they were before it ran.
pub type PrestateTrace = BTreeMap<Address, PrestateAccount>;

/// Records which accounts and slots a transaction touches.
///
/// Values are read afterwards from the state the transaction ran against, so the
/// transaction must have been reverted (as [`run_call`](crate::runner::run_call) does)
/// before calling [`into_trace`](Self::into_trace).
#[derive(Debug, Default)]
pub struct PrestateTracer {
    accounts: BTreeMap<Address, BTreeSet<U256>>,
    created: HashSet<Address>,
}

impl PrestateTracer {
    /// Creates an empty tracer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes an account that execution may not visit, such as the block beneficiary.
    pub fn touch(&mut self, address: Address) {
        self.accounts.entry(address).or_default();
    }

    fn touch_slot(&mut self, address: Address, slot: U256) {
        self.accounts.entry(address).or_default().insert(slot);
    }

    /// Reads the recorded accounts and slots from `state`.
    ///
    /// Contracts created by the transaction that did not exist before are left out.
    pub fn into_trace<S: StateReader>(self, state: &mut S) -> Result<PrestateTrace, StateError> {
        let mut trace = PrestateTrace::new();
        for (address, slots) in self.accounts {
            let account = state.get_account(address)?;
            if account.is_none() && self.created.contains(&address) {
                continue;
            }
            let account = account.unwrap_or_default();
            let code = state.get_code(address)?;
            let mut storage = BTreeMap::new();
            for slot in slots {
                let value = state.get_storage(address, slot)?;
                storage.insert(B256::from(slot), B256::from(value));
            }
            trace.insert(
                address,
                PrestateAccount {
                    balance: account.balance,
                    nonce: account.nonce,
                    code: super::non_empty(&code),
                    storage,
                },
            );
        }
        Ok(trace)
    }
}

impl Inspector for PrestateTracer {
    fn step(&mut self, interpreter: &Interpreter, opcode: u8) {
        let stack = &interpreter.stack;
        match opcode {
            SLOAD | SSTORE => {
                if let Some(slot) = stack.peek(0) {
                    self.touch_slot(interpreter.contract().address, slot);
                }
            }
            BALANCE | EXTCODESIZE | EXTCODECOPY | EXTCODEHASH | SELFDESTRUCT => {
                if let Some(word) = stack.peek(0) {
                    self.touch(to_address(word));
                }
            }
            CALL | CALLCODE | DELEGATECALL | STATICCALL => {
                if let Some(word) = stack.peek(1) {
                    self.touch(to_address(word));
                }
            }
            _ => {}
        }
    }

    fn call(&mut self, inputs: &CallInputs, _depth: usize) {
        self.touch(inputs.caller);
        self.touch(inputs.target_address);
        self.touch(inputs.bytecode_address);
    }

    fn create(&mut self, inputs: &CreateInputs, address: Address, _depth: usize) {
        self.touch(inputs.caller);
        self.touch(address);
        self.created.insert(address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        evm::{BlockEnv, EvmConfig},
        runner::{run_call, BlockContext, Transaction},
        test_utils::BytecodeBuilder,
        Account, NormalStateManager, StateWriter,
    };
    use alloy_primitives::address;

    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
    const COUNTER: Address = address!("1000000000000000000000000000000000000001");
    const COINBASE: Address = address!("000000000000000000000000000000000000c0ba");

    #[test]
    fn test_prestate_reports_values_before_execution() {
        let mut state = NormalStateManager::new();
        let funds = U256::from(10).pow(U256::from(18));
        state.put_account(ALICE, Account { nonce: 2, ..Account::with_balance(funds) });
        let code = BytecodeBuilder::default()
            .sstore(1, U256::from(2))
            .sload(3)
            .append(revm_bytecode::opcode::POP)
            .return_empty()
            .build();
        state.put_code(COUNTER, code.clone()).unwrap();
        state.put_storage(COUNTER, U256::from(1), U256::from(1));

        let config = EvmConfig::default();
        let block = BlockEnv { coinbase: COINBASE, ..Default::default() };
        let ctx = BlockContext { config: &config, block: &block, hashes: &() };
        let tx = Transaction { gas_limit: 100_000, ..Transaction::call(ALICE, COUNTER, Bytes::new()) };
        let mut tracer = PrestateTracer::new();
        tracer.touch(COINBASE);
        let outcome = run_call(&mut state, ctx, &tx, &mut tracer).unwrap();
        assert!(outcome.result.is_success());

        let trace = tracer.into_trace(&mut state).unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[&ALICE].balance, funds);
        assert_eq!(trace[&ALICE].nonce, 2);
        assert_eq!(trace[&COUNTER].code, Some(code));
        assert_eq!(
            trace[&COUNTER].storage,
            BTreeMap::from([
                (B256::from(U256::from(1)), B256::from(U256::from(1))),
                (B256::from(U256::from(3)), B256::ZERO),
            ])
        );
        assert_eq!(trace[&COINBASE], PrestateAccount::default());

        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json[ALICE.to_string().to_lowercase()]["nonce"], 2);
        assert!(json[COINBASE.to_string().to_lowercase()].get("nonce").is_none());
    }

    #[test]
    fn test_created_contract_is_omitted() {
        let mut state = NormalStateManager::new();
        state.put_account(ALICE, Account::with_balance(U256::from(10).pow(U256::from(18))));
        let config = EvmConfig::default();
        let block = BlockEnv::default();
        let ctx = BlockContext { config: &config, block: &block, hashes: &() };
        let init = BytecodeBuilder::default().into_init_code([0x00]);
        let tx = Transaction { gas_limit: 100_000, ..Transaction::create(ALICE, init) };

        let mut tracer = PrestateTracer::new();
        let outcome = run_call(&mut state, ctx, &tx, &mut tracer).unwrap();
        assert!(outcome.contract_address().is_some());

        let trace = tracer.into_trace(&mut state).unwrap();
        assert_eq!(trace.keys().copied().collect::<Vec<_>>(), vec![ALICE]);
    }
}
