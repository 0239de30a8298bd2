use alloy_primitives::{Address, Bytes, Log, B256, U256};

use super::{Interpreter, InterpreterResult};
use crate::{
    evm::{BlockEnv, EvmConfig, TxEnv},
    Account, StateError,
};

/// A value read from state together with its EIP-2929 access status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateLoad<T> {
    /// The value.
    pub data: T,
    /// Whether this was the first access in the transaction.
    pub is_cold: bool,
}

impl<T> StateLoad<T> {
    /// Wraps `data`.
    pub const fn new(data: T, is_cold: bool) -> Self {
        Self { data, is_cold }
    }
}

/// The storage values involved in an `SSTORE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SStoreResult {
    /// The value at the start of the transaction.
    pub original: U256,
    /// The value before this write.
    pub present: U256,
    /// The value written.
    pub new: U256,
}

/// What a `SELFDESTRUCT` touched, for gas accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelfDestructResult {
    /// The destroyed account held a non-zero balance.
    pub had_value: bool,
    /// The beneficiary existed and was not empty.
    pub target_exists: bool,
}

/// The flavour of a message call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallScheme {
    /// `CALL`
    Call,
    /// `CALLCODE`
    CallCode,
    /// `DELEGATECALL`
    DelegateCall,
    /// `STATICCALL`
    StaticCall,
}

impl CallScheme {
    /// The opcode name, as used by call traces.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Call => "CALL",
            Self::CallCode => "CALLCODE",
            Self::DelegateCall => "DELEGATECALL",
            Self::StaticCall => "STATICCALL",
        }
    }
}

/// A message call into another frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInputs {
    /// How the call was made.
    pub scheme: CallScheme,
    /// `CALLER` of the child frame.
    pub caller: Address,
    /// The account whose storage and balance the child frame runs against.
    pub target_address: Address,
    /// The account whose code is executed.
    pub bytecode_address: Address,
    /// `CALLVALUE` of the child frame.
    pub value: U256,
    /// Whether `value` is moved from `caller` to `target_address`. `DELEGATECALL` only
    /// forwards the apparent value.
    pub transfer: bool,
    /// Call data.
    pub input: Bytes,
    /// Gas handed to the child frame, stipend included.
    pub gas_limit: u64,
    /// Whether the child frame may modify state.
    pub is_static: bool,
}

/// How a contract address is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreateScheme {
    /// From the creator's nonce.
    Create,
    /// From a salt and the init code hash.
    Create2 {
        /// The salt.
        salt: U256,
    },
}

/// A contract creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInputs {
    /// The creating account.
    pub caller: Address,
    /// How the new address is derived.
    pub scheme: CreateScheme,
    /// The endowment.
    pub value: U256,
    /// The init code.
    pub init_code: Bytes,
    /// Gas handed to the init code frame.
    pub gas_limit: u64,
}

/// The result of a creation: the frame result and, on success, the new address.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    /// The init code frame result. Its output is the deployed code on success and the revert
    /// data on failure.
    pub result: InterpreterResult,
    /// The created contract, if the creation succeeded.
    pub address: Option<Address>,
}

/// Everything an instruction needs from outside its own frame. Sub-calls are not part of it:
/// they suspend the frame instead.
pub trait Host {
    /// The block being executed.
    fn block(&self) -> &BlockEnv;

    /// The transaction being executed.
    fn tx(&self) -> &TxEnv;

    /// The execution configuration.
    fn config(&self) -> &EvmConfig;

    /// The chain id.
    fn chain_id(&self) -> u64 {
        self.config().chain_id
    }

    /// The hash of one of the 256 most recent blocks, zero otherwise.
    fn block_hash(&mut self, number: u64) -> B256;

    /// Loads an account and marks it warm.
    fn load_account(&mut self, address: Address) -> Result<StateLoad<Option<Account>>, StateError>;

    /// Loads the code of an account and marks it warm.
    fn load_code(&mut self, address: Address) -> Result<StateLoad<Bytes>, StateError>;

    /// Reads a storage slot and marks it warm.
    fn sload(&mut self, address: Address, slot: U256) -> Result<StateLoad<U256>, StateError>;

    /// Writes a storage slot and marks it warm.
    fn sstore(
        &mut self,
        address: Address,
        slot: U256,
        value: U256,
    ) -> Result<StateLoad<SStoreResult>, StateError>;

    /// Reads transient storage (EIP-1153).
    fn tload(&mut self, address: Address, slot: U256) -> U256;

    /// Writes transient storage (EIP-1153).
    fn tstore(&mut self, address: Address, slot: U256, value: U256);

    /// Emits a log.
    fn log(&mut self, log: Log);

    /// Destroys `address` in favour of `target` (EIP-6780 semantics).
    fn selfdestruct(
        &mut self,
        address: Address,
        target: Address,
    ) -> Result<StateLoad<SelfDestructResult>, StateError>;

    /// Called before every instruction.
    fn step(&mut self, _interpreter: &Interpreter, _opcode: u8) {}
}
