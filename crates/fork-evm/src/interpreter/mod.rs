//! The bytecode interpreter.
//!
//! An [`Interpreter`] runs one call frame. Everything outside the frame (state, block data)
//! is reached through the [`Host`] trait, so the interpreter itself has no notion of
//! checkpoints: the host opens one per frame and commits or reverts it depending on the
//! frame's [`Outcome`].
//!
//! A frame never runs its sub-calls itself. `CALL` and `CREATE` suspend it with an
//! [`InterpreterAction`]; the caller runs the child frame, hands its result back with
//! [`Interpreter::insert_result`] and resumes the frame with another [`Interpreter::run`].
//!
//! Instructions are dispatched through an [`InstructionTable`] indexed by the opcode byte.

mod analysis;
pub use analysis::JumpTable;

mod gas;
pub use gas::{memory_cost, num_words, Gas};

mod host;
pub use host::*;

pub mod instructions;
pub use instructions::{instruction_table, Instruction, InstructionTable};

mod memory;
pub use memory::Memory;

mod stack;
pub use stack::Stack;

use alloy_primitives::{Address, Bytes, B256, U256};
use revm_bytecode::opcode::STOP;

use crate::{HaltReason, StateError};

/// Why a frame stopped executing instructions.
#[derive(Debug)]
pub enum Control {
    /// `STOP`, or running past the end of the code.
    Stop,
    /// `RETURN` with its output.
    Return(Bytes),
    /// `REVERT` with its output.
    Revert(Bytes),
    /// An exceptional halt. All remaining gas is consumed.
    Halt(HaltReason),
    /// State could not be accessed. Aborts the whole top-level call.
    Fatal(StateError),
    /// Suspends the frame on a message call.
    Call(Box<CallInputs>),
    /// Suspends the frame on a contract creation.
    Create(Box<CreateInputs>),
}

impl From<StateError> for Control {
    fn from(err: StateError) -> Self {
        Self::Fatal(err)
    }
}

/// How a frame ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `STOP` or `RETURN`.
    Success,
    /// `REVERT`.
    Revert,
    /// An exceptional halt.
    Halt(HaltReason),
}

impl Outcome {
    /// Returns `true` for [`Outcome::Success`].
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns `true` for [`Outcome::Revert`].
    pub const fn is_revert(&self) -> bool {
        matches!(self, Self::Revert)
    }
}

/// The result of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterResult {
    /// How the frame ended.
    pub outcome: Outcome,
    /// Return or revert data.
    pub output: Bytes,
    /// The frame's gas meter at exit.
    pub gas: Gas,
}

impl InterpreterResult {
    /// A frame that ended before executing any code, returning all of its gas.
    pub fn new(outcome: Outcome, output: Bytes, gas_limit: u64) -> Self {
        Self { outcome, output, gas: Gas::new(gas_limit) }
    }
}

/// Why [`Interpreter::run`] returned.
#[derive(Debug)]
pub enum InterpreterAction {
    /// The frame wants a message call run. Resume it once the result is inserted.
    Call(Box<CallInputs>),
    /// The frame wants a contract created. Resume it once the outcome is inserted.
    Create(Box<CreateInputs>),
    /// The frame is done.
    Return(InterpreterResult),
}

/// The result of a finished child frame, as handed back to its parent.
#[derive(Debug, Clone)]
pub enum FrameResult {
    /// A message call returned.
    Call(InterpreterResult),
    /// A creation returned.
    Create(CreateOutcome),
}

impl FrameResult {
    /// The frame result and, for a successful creation, the created address.
    pub fn into_parts(self) -> (InterpreterResult, Option<Address>) {
        match self {
            Self::Call(result) => (result, None),
            Self::Create(outcome) => (outcome.result, outcome.address),
        }
    }
}

/// The code and message of a frame.
#[derive(Debug, Clone, Default)]
pub struct Contract {
    /// The account the frame runs as (`ADDRESS`).
    pub address: Address,
    /// `CALLER`.
    pub caller: Address,
    /// `CALLVALUE`.
    pub value: U256,
    /// Call data.
    pub input: Bytes,
    /// The code being executed.
    pub code: Bytes,
    /// The valid jump destinations of `code`.
    pub jump_table: JumpTable,
}

/// The execution state of one call frame.
#[derive(Debug)]
pub struct Interpreter {
    pc: usize,
    contract: Contract,
    is_static: bool,
    /// The operand stack.
    pub stack: Stack,
    /// The frame memory.
    pub memory: Memory,
    /// The gas meter.
    pub gas: Gas,
    /// The output of the most recent sub-call.
    pub return_data: Bytes,
    /// Where the output of a suspended call is copied, as `(offset, len)`.
    return_range: (usize, usize),
    resume_with: Option<FrameResult>,
}

impl Interpreter {
    /// Creates a frame running `contract` with `gas_limit` gas.
    pub fn new(contract: Contract, gas_limit: u64, is_static: bool) -> Self {
        Self {
            pc: 0,
            contract,
            is_static,
            stack: Stack::new(),
            memory: Memory::new(),
            gas: Gas::new(gas_limit),
            return_data: Bytes::new(),
            return_range: (0, 0),
            resume_with: None,
        }
    }

    /// The program counter.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// The code and message of this frame.
    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Whether state modifications are forbidden.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// The opcode at the program counter. Code is implicitly followed by `STOP`.
    pub fn current_opcode(&self) -> u8 {
        self.contract.code.get(self.pc).copied().unwrap_or(STOP)
    }

    /// Runs the frame until it stops or suspends on a sub-call.
    ///
    /// Exceptional halts are part of the returned [`Outcome`]; only state access failures
    /// are errors.
    pub fn run<H: Host + ?Sized>(
        &mut self,
        table: &InstructionTable<H>,
        host: &mut H,
    ) -> Result<InterpreterAction, StateError> {
        let resumed = match self.resume_with.take() {
            Some(FrameResult::Call(result)) => instructions::contract::call_return(self, result),
            Some(FrameResult::Create(outcome)) => {
                instructions::contract::create_return(self, outcome)
            }
            None => Ok(()),
        };
        let control = match resumed {
            Err(control) => control,
            Ok(()) => loop {
                let opcode = self.current_opcode();
                host.step(self, opcode);
                self.pc += 1;
                if let Err(control) = table[opcode as usize](self, host) {
                    break control;
                }
            },
        };
        let (outcome, output) = match control {
            Control::Call(inputs) => return Ok(InterpreterAction::Call(inputs)),
            Control::Create(inputs) => return Ok(InterpreterAction::Create(inputs)),
            Control::Stop => (Outcome::Success, Bytes::new()),
            Control::Return(output) => (Outcome::Success, output),
            Control::Revert(output) => (Outcome::Revert, output),
            Control::Halt(reason) => {
                self.gas.spend_all();
                (Outcome::Halt(reason), Bytes::new())
            }
            Control::Fatal(err) => return Err(err),
        };
        Ok(InterpreterAction::Return(InterpreterResult { outcome, output, gas: self.gas }))
    }

    /// Hands the result of the sub-call this frame is suspended on back to it. It takes
    /// effect on the next [`Interpreter::run`].
    pub fn insert_result(&mut self, result: FrameResult) {
        self.resume_with = Some(result);
    }

    pub(crate) fn suspend_call(
        &mut self,
        inputs: CallInputs,
        return_range: (usize, usize),
    ) -> Control {
        self.return_range = return_range;
        Control::Call(Box::new(inputs))
    }

    pub(crate) const fn return_range(&self) -> (usize, usize) {
        self.return_range
    }

    /// Spends `cost` gas, halting with out-of-gas if not enough is left.
    #[inline]
    pub fn charge(&mut self, cost: u64) -> Result<(), Control> {
        if self.gas.record_cost(cost) {
            Ok(())
        } else {
            Err(Control::Halt(HaltReason::OutOfGas))
        }
    }

    /// Halts if the frame is static.
    #[inline]
    pub fn require_non_static(&self) -> Result<(), Control> {
        if self.is_static {
            Err(Control::Halt(HaltReason::StateChangeDuringStaticCall))
        } else {
            Ok(())
        }
    }

    /// Expands memory to cover `len` bytes at `offset`, charging for the expansion.
    ///
    /// Returns the range as `(offset, len)`. An empty range touches nothing and its offset
    /// is not checked.
    pub fn memory_range(&mut self, offset: U256, len: U256) -> Result<(usize, usize), Control> {
        let len = as_usize(len)?;
        if len == 0 {
            return Ok((0, 0));
        }
        let offset = as_usize(offset)?;
        self.expand_memory(offset, len)?;
        Ok((offset, len))
    }

    fn expand_memory(&mut self, offset: usize, len: usize) -> Result<(), Control> {
        let end = offset as u64 + len as u64;
        if end <= self.memory.len() as u64 {
            return Ok(());
        }
        let words = num_words(end);
        let current = num_words(self.memory.len() as u64);
        self.charge(memory_cost(words) - memory_cost(current))?;
        self.memory.resize((words * 32) as usize);
        Ok(())
    }

    pub(crate) fn jump(&mut self, target: U256) -> Result<(), Control> {
        let target = target.saturating_to::<usize>();
        if !self.contract.jump_table.is_valid(target) {
            return Err(Control::Halt(HaltReason::InvalidJump));
        }
        self.pc = target;
        Ok(())
    }

    /// Reads `N` immediate bytes after the current opcode, zero padded past the end of
    /// the code, and skips them.
    pub(crate) fn read_immediate<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        let code = &self.contract.code;
        let start = self.pc.min(code.len());
        let end = (self.pc + N).min(code.len());
        out[..end - start].copy_from_slice(&code[start..end]);
        self.pc += N;
        out
    }
}

/// Converts a stack word to a memory offset or length. Anything above `u32::MAX` could
/// never be paid for and halts with out-of-gas.
#[inline]
pub fn as_usize(value: U256) -> Result<usize, Control> {
    let value = value.saturating_to::<u64>();
    if value > u32::MAX as u64 {
        return Err(Control::Halt(HaltReason::OutOfGas));
    }
    Ok(value as usize)
}

/// The address held in the low 20 bytes of a stack word.
#[inline]
pub fn to_address(word: U256) -> Address {
    Address::from_word(B256::from(word.to_be_bytes::<32>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_expansion_is_charged_once() {
        let mut interpreter = Interpreter::new(Contract::default(), 1_000, false);
        let (offset, len) = interpreter.memory_range(U256::from(0), U256::from(64)).unwrap();
        assert_eq!((offset, len), (0, 64));
        assert_eq!(interpreter.gas.spent(), memory_cost(2));
        interpreter.memory_range(U256::from(32), U256::from(32)).unwrap();
        assert_eq!(interpreter.gas.spent(), memory_cost(2));
        assert_eq!(interpreter.memory.len(), 64);
    }

    #[test]
    fn test_huge_offset_halts() {
        let mut interpreter = Interpreter::new(Contract::default(), 1_000, false);
        assert!(matches!(
            interpreter.memory_range(U256::MAX, U256::from(1)),
            Err(Control::Halt(HaltReason::OutOfGas))
        ));
        assert_eq!(interpreter.memory_range(U256::MAX, U256::ZERO).unwrap(), (0, 0));
    }

    #[test]
    fn test_read_immediate_pads_past_end() {
        let contract = Contract { code: Bytes::from_static(&[0x61, 0xaa]), ..Default::default() };
        let mut interpreter = Interpreter::new(contract, 1_000, false);
        interpreter.pc = 1;
        assert_eq!(interpreter.read_immediate::<2>(), [0xaa, 0x00]);
        assert_eq!(interpreter.pc(), 3);
        assert_eq!(interpreter.current_opcode(), STOP);
    }
}
