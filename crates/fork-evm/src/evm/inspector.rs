use alloy_primitives::{Address, Log, U256};
use auto_impl::auto_impl;

use crate::interpreter::{CallInputs, CreateInputs, CreateOutcome, Interpreter, InterpreterResult};

/// Hooks into execution, used by the tracers.
///
/// Every hook has an empty default. `call`/`create` are paired with `call_end`/`create_end`
/// for every frame, including frames that fail before running any code.
#[auto_impl(&mut, Box)]
pub trait Inspector {
    /// Called before each instruction, with the program counter still pointing at it.
    fn step(&mut self, _interpreter: &Interpreter, _opcode: u8) {}

    /// Called when a message call frame is entered.
    fn call(&mut self, _inputs: &CallInputs, _depth: usize) {}

    /// Called when a message call frame returns.
    fn call_end(&mut self, _inputs: &CallInputs, _result: &InterpreterResult) {}

    /// Called when a creation frame is entered, with the address it deploys to.
    fn create(&mut self, _inputs: &CreateInputs, _address: Address, _depth: usize) {}

    /// Called when a creation frame returns.
    fn create_end(&mut self, _inputs: &CreateInputs, _outcome: &CreateOutcome) {}

    /// Called for every emitted log.
    fn log(&mut self, _log: &Log) {}

    /// Called when a contract self-destructs.
    fn selfdestruct(&mut self, _contract: Address, _target: Address, _value: U256) {}
}

/// An inspector that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpInspector;

impl Inspector for NoOpInspector {}
