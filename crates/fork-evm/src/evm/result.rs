use alloy_primitives::{Address, Bytes, Log};

/// Why a frame halted exceptionally.
///
/// A halt consumes all gas of the frame and reverts its state changes. It is an EVM outcome
/// handed to the parent frame, not a Rust error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum HaltReason {
    /// Not enough gas.
    #[display("out of gas")]
    OutOfGas,
    /// An instruction needed more operands than the stack holds.
    #[display("stack underflow")]
    StackUnderflow,
    /// The stack would exceed 1024 words.
    #[display("stack limit reached 1024")]
    StackOverflow,
    /// The opcode is not assigned.
    #[display("invalid opcode: {_0:#04x}")]
    InvalidOpcode(u8),
    /// A jump to something other than a `JUMPDEST`.
    #[display("invalid jump destination")]
    InvalidJump,
    /// A state modification inside a static frame.
    #[display("write protection")]
    StateChangeDuringStaticCall,
    /// The call depth limit was reached.
    #[display("max call depth exceeded")]
    CallDepthExceeded,
    /// The caller cannot cover the transferred value.
    #[display("insufficient balance for transfer")]
    OutOfFunds,
    /// A contract already exists at the derived address.
    #[display("contract address collision")]
    CreateCollision,
    /// The deployed code exceeds the size limit (EIP-170).
    #[display("max code size exceeded")]
    CodeSizeLimit,
    /// The deployed code starts with `0xEF` (EIP-3541).
    #[display("invalid code: must not begin with 0xef")]
    InvalidCodePrefix,
    /// The init code exceeds the size limit (EIP-3860).
    #[display("max initcode size exceeded")]
    InitcodeSizeLimit,
    /// The creator's nonce would overflow.
    #[display("nonce uint64 overflow")]
    NonceOverflow,
    /// `RETURNDATACOPY` past the end of the return data.
    #[display("return data out of bounds")]
    ReturnDataOutOfBounds,
    /// A precompile failed.
    #[display("precompile failed")]
    PrecompileFailure,
}

/// What a successful top-level frame produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// The return data of a call.
    Call(Bytes),
    /// The deployed code and address of a creation.
    Create(Bytes, Option<Address>),
}

impl Output {
    /// The return data or deployed code.
    pub fn data(&self) -> &Bytes {
        match self {
            Self::Call(data) | Self::Create(data, _) => data,
        }
    }

    /// The created address, if any.
    pub fn address(&self) -> Option<Address> {
        match self {
            Self::Call(_) => None,
            Self::Create(_, address) => *address,
        }
    }
}

/// The outcome of executing a transaction or call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The top-level frame returned.
    Success {
        /// Gas used, after refunds.
        gas_used: u64,
        /// Gas refunded.
        gas_refunded: u64,
        /// Logs emitted by frames that were not reverted.
        logs: Vec<Log>,
        /// Return data or deployment.
        output: Output,
    },
    /// The top-level frame reverted.
    Revert {
        /// Gas used.
        gas_used: u64,
        /// Revert data.
        output: Bytes,
    },
    /// The top-level frame halted exceptionally.
    Halt {
        /// Why it halted.
        reason: HaltReason,
        /// Gas used: the whole gas limit.
        gas_used: u64,
    },
}

impl ExecutionResult {
    /// Returns `true` for [`ExecutionResult::Success`].
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The gas charged to the sender.
    pub const fn gas_used(&self) -> u64 {
        match self {
            Self::Success { gas_used, .. }
            | Self::Revert { gas_used, .. }
            | Self::Halt { gas_used, .. } => *gas_used,
        }
    }

    /// The logs, empty unless successful.
    pub fn logs(&self) -> &[Log] {
        match self {
            Self::Success { logs, .. } => logs,
            _ => &[],
        }
    }

    /// The return or revert data.
    pub fn output(&self) -> Option<&Bytes> {
        match self {
            Self::Success { output, .. } => Some(output.data()),
            Self::Revert { output, .. } => Some(output),
            Self::Halt { .. } => None,
        }
    }
}
