//! Frame dispatch over a [`StateWriter`].
//!
//! # Architecture
//!
//! [`Evm`] is the [`Host`] of every [`Interpreter`] it spawns. Each message call or
//! creation runs in its own frame:
//!
//! 1. a checkpoint is opened on the state and on the transaction [`journal`](JournalOutput);
//! 2. value is transferred, and the code (or a precompile) is run;
//! 3. the checkpoint is committed if the frame succeeded and reverted otherwise.
//!
//! Frames live on an explicit stack rather than the Rust call stack, so a contract calling
//! itself up to the depth limit needs no more native stack than a single call. State access
//! failures are not EVM outcomes: they unwind every open frame (reverting it) and surface as
//! a [`StateError`].

mod env;
pub use env::*;

mod inspector;
pub use inspector::*;

mod journal;
pub use journal::JournalOutput;
use journal::{Journal, JournalCheckpoint};

pub mod precompiles;
pub use precompiles::{Precompile, PrecompileError, PrecompileOutput, Precompiles};

mod result;
pub use result::*;

use std::{collections::HashMap, rc::Rc};

use alloy_primitives::{keccak256, Address, Bytes, Log, B256, KECCAK256_EMPTY, U256};
use tracing::trace;

use crate::{
    constants::{gas, limits::BLOCK_HASH_HISTORY},
    create2_address, create_address,
    interpreter::{
        instruction_table, CallInputs, Contract, CreateInputs, CreateOutcome, CreateScheme,
        FrameResult, Gas, Host, InstructionTable, Interpreter, InterpreterAction,
        InterpreterResult, JumpTable, Outcome, SStoreResult, SelfDestructResult, StateLoad,
    },
    Account, StateError, StateWriter,
};

/// Runs frames of one transaction against a state.
///
/// An `Evm` lives for one transaction: the access sets, transient storage, logs and the
/// EIP-6780 bookkeeping it collects are handed back by [`Evm::finish`].
#[allow(missing_debug_implementations)]
pub struct Evm<'a, S, I = NoOpInspector> {
    state: &'a mut S,
    inspector: I,
    config: &'a EvmConfig,
    hashes: &'a dyn BlockHashes,
    block: BlockEnv,
    tx: TxEnv,
    journal: Journal,
    jump_tables: HashMap<B256, JumpTable>,
    table: Rc<InstructionTable<Self>>,
    depth: usize,
}

impl<'a, S: StateWriter, I: Inspector> Evm<'a, S, I> {
    /// Creates an EVM for one transaction.
    pub fn new(
        state: &'a mut S,
        config: &'a EvmConfig,
        hashes: &'a dyn BlockHashes,
        block: BlockEnv,
        tx: TxEnv,
        inspector: I,
    ) -> Self {
        Self {
            state,
            inspector,
            config,
            hashes,
            block,
            tx,
            journal: Journal::default(),
            jump_tables: HashMap::new(),
            table: Rc::new(instruction_table()),
            depth: 0,
        }
    }

    /// The state the frames run against.
    pub fn state(&mut self) -> &mut S {
        self.state
    }

    /// The inspector.
    pub fn inspector(&mut self) -> &mut I {
        &mut self.inspector
    }

    /// Adds an account to the access set (EIP-2929/2930).
    pub fn warm_account(&mut self, address: Address) {
        self.journal.warm_account(address);
    }

    /// Adds a storage slot to the access set (EIP-2929/2930).
    pub fn warm_slot(&mut self, address: Address, slot: U256) {
        self.journal.warm_slot(address, slot);
    }

    /// Ends the transaction, returning what the journal collected and the inspector.
    pub fn finish(self) -> (JournalOutput, I) {
        (self.journal.finish(), self.inspector)
    }

    fn checkpoint(&mut self) -> JournalCheckpoint {
        self.journal.checkpoint(self.state.checkpoint())
    }

    fn commit(&mut self, checkpoint: JournalCheckpoint) {
        self.state.commit(checkpoint.state);
    }

    fn revert(&mut self, checkpoint: JournalCheckpoint) {
        let state = self.journal.revert(checkpoint);
        self.state.revert(state);
    }

    /// Moves `value` from `from` to `to`. Returns `Ok(false)` if `from` cannot afford it.
    fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<bool, StateError> {
        let mut sender = self.state.get_account(from)?.unwrap_or_default();
        if sender.balance < value {
            return Ok(false);
        }
        self.journal.touch(to);
        if value.is_zero() {
            return Ok(true);
        }
        sender.balance -= value;
        self.state.put_account(from, sender);
        let mut receiver = self.state.get_account(to)?.unwrap_or_default();
        receiver.balance += value;
        self.state.put_account(to, receiver);
        Ok(true)
    }

    fn jump_table(&mut self, code_hash: B256, code: &Bytes) -> JumpTable {
        self.jump_tables.entry(code_hash).or_insert_with(|| JumpTable::analyze(code)).clone()
    }

    /// Runs a message call, and every frame it spawns, to completion.
    pub fn call(&mut self, inputs: CallInputs) -> Result<InterpreterResult, StateError> {
        let started = self.start_call(inputs)?;
        Ok(self.run_frames(started)?.into_parts().0)
    }

    /// Runs a contract creation, and every frame it spawns, to completion.
    pub fn create(&mut self, inputs: CreateInputs) -> Result<CreateOutcome, StateError> {
        let started = self.start_create(inputs)?;
        let (result, address) = self.run_frames(started)?.into_parts();
        Ok(CreateOutcome { result, address })
    }

    /// Drives frames off an explicit stack until the first one returns. Only the frame on
    /// top runs; its parents are suspended on the sub-call that spawned it.
    fn run_frames(&mut self, started: Started) -> Result<FrameResult, StateError> {
        let mut current = match started {
            Started::Frame(frame) => *frame,
            Started::Done(result) => return Ok(result),
        };
        let table = Rc::clone(&self.table);
        let mut parents: Vec<Frame> = Vec::new();
        loop {
            let action = match current.interpreter.run(&table, self) {
                Ok(action) => action,
                Err(err) => {
                    parents.push(current);
                    return Err(self.unwind(parents, err));
                }
            };
            let started = match action {
                InterpreterAction::Call(inputs) => self.start_call(*inputs),
                InterpreterAction::Create(inputs) => self.start_create(*inputs),
                InterpreterAction::Return(result) => {
                    let returned = match self.finish_frame(current, result) {
                        Ok(returned) => returned,
                        Err(err) => return Err(self.unwind(parents, err)),
                    };
                    match parents.pop() {
                        Some(parent) => {
                            current = parent;
                            current.interpreter.insert_result(returned);
                            continue;
                        }
                        None => return Ok(returned),
                    }
                }
            };
            match started {
                Ok(Started::Frame(child)) => parents.push(std::mem::replace(&mut current, *child)),
                Ok(Started::Done(result)) => current.interpreter.insert_result(result),
                Err(err) => {
                    parents.push(current);
                    return Err(self.unwind(parents, err));
                }
            }
        }
    }

    /// Reverts the open frames, innermost first, after a state access failure.
    fn unwind(&mut self, frames: Vec<Frame>, err: StateError) -> StateError {
        for frame in frames.into_iter().rev() {
            self.depth -= 1;
            self.revert(frame.checkpoint);
        }
        err
    }

    fn push_frame(
        &mut self,
        contract: Contract,
        gas_limit: u64,
        is_static: bool,
        checkpoint: JournalCheckpoint,
        kind: FrameKind,
    ) -> Started {
        self.depth += 1;
        Started::Frame(Box::new(Frame {
            interpreter: Interpreter::new(contract, gas_limit, is_static),
            checkpoint,
            kind,
        }))
    }

    fn start_call(&mut self, inputs: CallInputs) -> Result<Started, StateError> {
        self.inspector.call(&inputs, self.depth);
        let gas_limit = inputs.gas_limit;
        if self.depth > self.config.call_depth_limit {
            let result = InterpreterResult::new(
                Outcome::Halt(HaltReason::CallDepthExceeded),
                Bytes::new(),
                gas_limit,
            );
            return Ok(Started::Done(self.call_end(&inputs, result)));
        }

        let checkpoint = self.checkpoint();
        match self.enter_call(&inputs) {
            Ok(Entered::Run(contract)) => {
                let is_static = inputs.is_static;
                let kind = FrameKind::Call(inputs);
                Ok(self.push_frame(contract, gas_limit, is_static, checkpoint, kind))
            }
            Ok(Entered::Done(result)) => {
                if result.outcome.is_success() {
                    self.commit(checkpoint);
                } else {
                    self.revert(checkpoint);
                }
                Ok(Started::Done(self.call_end(&inputs, result)))
            }
            Err(err) => {
                self.revert(checkpoint);
                Err(err)
            }
        }
    }

    /// Moves the value and resolves the code of a call. Calls into precompiles and accounts
    /// without code finish right away.
    fn enter_call(&mut self, inputs: &CallInputs) -> Result<Entered, StateError> {
        let gas_limit = inputs.gas_limit;
        if inputs.transfer && !self.transfer(inputs.caller, inputs.target_address, inputs.value)? {
            return Ok(Entered::Done(InterpreterResult::new(
                Outcome::Halt(HaltReason::OutOfFunds),
                Bytes::new(),
                gas_limit,
            )));
        }

        if let Some(precompile) = self.config.precompiles.get(&inputs.bytecode_address) {
            return Ok(Entered::Done(run_precompile(precompile.as_ref(), &inputs.input, gas_limit)));
        }

        let code_hash = self
            .state
            .get_account(inputs.bytecode_address)?
            .map_or(KECCAK256_EMPTY, |account| account.code_hash);
        if code_hash == KECCAK256_EMPTY {
            return Ok(Entered::Done(InterpreterResult::new(
                Outcome::Success,
                Bytes::new(),
                gas_limit,
            )));
        }
        let code = self.state.get_code(inputs.bytecode_address)?;
        Ok(Entered::Run(Contract {
            address: inputs.target_address,
            caller: inputs.caller,
            value: inputs.value,
            input: inputs.input.clone(),
            jump_table: self.jump_table(code_hash, &code),
            code,
        }))
    }

    fn call_end(&mut self, inputs: &CallInputs, result: InterpreterResult) -> FrameResult {
        trace!(
            target: "evm",
            scheme = inputs.scheme.name(),
            to = %inputs.target_address,
            depth = self.depth,
            outcome = ?result.outcome,
            "Call returned"
        );
        self.inspector.call_end(inputs, &result);
        FrameResult::Call(result)
    }

    fn start_create(&mut self, inputs: CreateInputs) -> Result<Started, StateError> {
        let mut creator = self.state.get_account(inputs.caller)?.unwrap_or_default();
        let address = match inputs.scheme {
            CreateScheme::Create => create_address(inputs.caller, creator.nonce),
            CreateScheme::Create2 { salt } => create2_address(
                inputs.caller,
                B256::from(salt.to_be_bytes::<32>()),
                keccak256(&inputs.init_code),
            ),
        };
        self.inspector.create(&inputs, address, self.depth);

        let gas_limit = inputs.gas_limit;
        let failed = |reason, gas: Gas| CreateOutcome {
            result: InterpreterResult { outcome: Outcome::Halt(reason), output: Bytes::new(), gas },
            address: None,
        };
        if self.depth > self.config.call_depth_limit {
            let outcome = failed(HaltReason::CallDepthExceeded, Gas::new(gas_limit));
            return Ok(Started::Done(self.create_end(&inputs, address, outcome)));
        }
        if creator.balance < inputs.value {
            let outcome = failed(HaltReason::OutOfFunds, Gas::new(gas_limit));
            return Ok(Started::Done(self.create_end(&inputs, address, outcome)));
        }
        let Some(nonce) = creator.nonce.checked_add(1) else {
            let outcome = failed(HaltReason::NonceOverflow, Gas::new(gas_limit));
            return Ok(Started::Done(self.create_end(&inputs, address, outcome)));
        };
        creator.nonce = nonce;
        self.state.put_account(inputs.caller, creator);

        self.journal.warm_account(address);
        let existing = self.state.get_account(address)?;
        if existing.is_some_and(|account| account.nonce != 0 || account.is_contract()) {
            trace!(target: "evm", %address, "Create collision");
            let outcome = failed(HaltReason::CreateCollision, Gas::new_spent(gas_limit));
            return Ok(Started::Done(self.create_end(&inputs, address, outcome)));
        }

        let checkpoint = self.checkpoint();
        match self.enter_create(&inputs, address, existing.unwrap_or_default()) {
            Ok(contract) => Ok(self.push_frame(
                contract,
                gas_limit,
                false,
                checkpoint,
                FrameKind::Create { inputs, address },
            )),
            Err(err) => {
                self.revert(checkpoint);
                Err(err)
            }
        }
    }

    fn enter_create(
        &mut self,
        inputs: &CreateInputs,
        address: Address,
        account: Account,
    ) -> Result<Contract, StateError> {
        self.journal.mark_created(address);
        self.state.clear_storage(address);
        // A pre-funded address keeps its balance.
        self.state.put_account(
            address,
            Account { nonce: 1, code_hash: KECCAK256_EMPTY, ..account },
        );
        self.transfer(inputs.caller, address, inputs.value)?;

        Ok(Contract {
            address,
            caller: inputs.caller,
            value: inputs.value,
            input: Bytes::new(),
            jump_table: JumpTable::analyze(&inputs.init_code),
            code: inputs.init_code.clone(),
        })
    }

    /// Settles a frame that ran code: commits or reverts its checkpoint and, for a creation,
    /// deploys the returned code.
    fn finish_frame(
        &mut self,
        frame: Frame,
        mut result: InterpreterResult,
    ) -> Result<FrameResult, StateError> {
        let Frame { checkpoint, kind, .. } = frame;
        self.depth -= 1;
        let (inputs, address) = match kind {
            FrameKind::Call(inputs) => {
                if result.outcome.is_success() {
                    self.commit(checkpoint);
                } else {
                    self.revert(checkpoint);
                }
                return Ok(self.call_end(&inputs, result));
            }
            FrameKind::Create { inputs, address } => (inputs, address),
        };

        if !result.outcome.is_success() {
            self.revert(checkpoint);
            let outcome = CreateOutcome { result, address: None };
            return Ok(self.create_end(&inputs, address, outcome));
        }
        let code = std::mem::take(&mut result.output);
        let rejected = if code.len() > self.config.max_code_size {
            Some(HaltReason::CodeSizeLimit)
        } else if code.first() == Some(&0xEF) {
            Some(HaltReason::InvalidCodePrefix)
        } else if !result.gas.record_cost(gas::CODEDEPOSIT * code.len() as u64) {
            Some(HaltReason::OutOfGas)
        } else {
            None
        };
        if let Some(reason) = rejected {
            self.revert(checkpoint);
            result.outcome = Outcome::Halt(reason);
            result.gas.spend_all();
            let outcome = CreateOutcome { result, address: None };
            return Ok(self.create_end(&inputs, address, outcome));
        }

        if let Err(err) = self.state.put_code(address, code.clone()) {
            self.revert(checkpoint);
            return Err(err);
        }
        self.commit(checkpoint);
        result.output = code;
        let outcome = CreateOutcome { result, address: Some(address) };
        Ok(self.create_end(&inputs, address, outcome))
    }

    fn create_end(
        &mut self,
        inputs: &CreateInputs,
        address: Address,
        outcome: CreateOutcome,
    ) -> FrameResult {
        trace!(
            target: "evm",
            %address,
            depth = self.depth,
            outcome = ?outcome.result.outcome,
            "Create returned"
        );
        self.inspector.create_end(inputs, &outcome);
        FrameResult::Create(outcome)
    }
}

/// A frame running code, or suspended on one of its sub-calls.
struct Frame {
    interpreter: Interpreter,
    checkpoint: JournalCheckpoint,
    kind: FrameKind,
}

enum FrameKind {
    Call(CallInputs),
    Create { inputs: CreateInputs, address: Address },
}

/// What starting a call or creation led to.
enum Started {
    /// A frame that has to run code.
    Frame(Box<Frame>),
    /// The call finished without running code.
    Done(FrameResult),
}

enum Entered {
    Run(Contract),
    Done(InterpreterResult),
}

/// Runs a precompile as a frame.
fn run_precompile(precompile: &dyn Precompile, input: &[u8], gas_limit: u64) -> InterpreterResult {
    match precompile.call(input, gas_limit) {
        Ok(output) => {
            let mut gas = Gas::new(gas_limit);
            if !gas.record_cost(output.gas_used) {
                return InterpreterResult {
                    outcome: Outcome::Halt(HaltReason::OutOfGas),
                    output: Bytes::new(),
                    gas: Gas::new_spent(gas_limit),
                };
            }
            let outcome = if output.reverted { Outcome::Revert } else { Outcome::Success };
            InterpreterResult { outcome, output: output.bytes, gas }
        }
        Err(err) => {
            let reason = match err {
                PrecompileError::OutOfGas => HaltReason::OutOfGas,
                PrecompileError::Other(_) => HaltReason::PrecompileFailure,
            };
            InterpreterResult {
                outcome: Outcome::Halt(reason),
                output: Bytes::new(),
                gas: Gas::new_spent(gas_limit),
            }
        }
    }
}

impl<S: StateWriter, I: Inspector> Host for Evm<'_, S, I> {
    fn block(&self) -> &BlockEnv {
        &self.block
    }

    fn tx(&self) -> &TxEnv {
        &self.tx
    }

    fn config(&self) -> &EvmConfig {
        self.config
    }

    fn block_hash(&mut self, number: u64) -> B256 {
        let current = self.block.number;
        if number >= current || current - number > BLOCK_HASH_HISTORY {
            return B256::ZERO;
        }
        self.hashes.block_hash(number).unwrap_or_default()
    }

    fn load_account(&mut self, address: Address) -> Result<StateLoad<Option<Account>>, StateError> {
        let is_cold = self.journal.warm_account(address);
        Ok(StateLoad::new(self.state.get_account(address)?, is_cold))
    }

    fn load_code(&mut self, address: Address) -> Result<StateLoad<Bytes>, StateError> {
        let is_cold = self.journal.warm_account(address);
        Ok(StateLoad::new(self.state.get_code(address)?, is_cold))
    }

    fn sload(&mut self, address: Address, slot: U256) -> Result<StateLoad<U256>, StateError> {
        let is_cold = self.journal.warm_slot(address, slot);
        let value = self.state.get_storage(address, slot)?;
        self.journal.original(address, slot, value);
        Ok(StateLoad::new(value, is_cold))
    }

    fn sstore(
        &mut self,
        address: Address,
        slot: U256,
        value: U256,
    ) -> Result<StateLoad<SStoreResult>, StateError> {
        let is_cold = self.journal.warm_slot(address, slot);
        let present = self.state.get_storage(address, slot)?;
        let original = self.journal.original(address, slot, present);
        self.state.put_storage(address, slot, value);
        Ok(StateLoad::new(SStoreResult { original, present, new: value }, is_cold))
    }

    fn tload(&mut self, address: Address, slot: U256) -> U256 {
        self.journal.tload(address, slot)
    }

    fn tstore(&mut self, address: Address, slot: U256, value: U256) {
        self.journal.tstore(address, slot, value);
    }

    fn log(&mut self, log: Log) {
        self.inspector.log(&log);
        self.journal.log(log);
    }

    fn selfdestruct(
        &mut self,
        address: Address,
        target: Address,
    ) -> Result<StateLoad<SelfDestructResult>, StateError> {
        let is_cold = self.journal.warm_account(target);
        let mut account = self.state.get_account(address)?.unwrap_or_default();
        let beneficiary = self.state.get_account(target)?;
        let balance = account.balance;
        let result = SelfDestructResult {
            had_value: !balance.is_zero(),
            target_exists: beneficiary.is_some_and(|account| !account.is_empty()),
        };
        self.inspector.selfdestruct(address, target, balance);

        if target != address {
            self.journal.touch(target);
            if !balance.is_zero() {
                let mut beneficiary = beneficiary.unwrap_or_default();
                beneficiary.balance += balance;
                self.state.put_account(target, beneficiary);
            }
        }
        // Only a contract created in this transaction is destroyed (EIP-6780). Sending the
        // balance to itself then burns it.
        let created = self.journal.is_created(&address);
        if created {
            self.journal.destroy(address);
        }
        if target != address || created {
            account.balance = U256::ZERO;
            self.state.put_account(address, account);
        }
        Ok(StateLoad::new(result, is_cold))
    }

    fn step(&mut self, interpreter: &Interpreter, opcode: u8) {
        self.inspector.step(interpreter, opcode);
    }
}
