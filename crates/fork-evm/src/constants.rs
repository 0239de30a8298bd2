//! Constants for the EVM core.
//!
//! It groups the gas schedule, the execution limits and the transaction-level costs as
//! sub-modules.

/// The gas schedule of the interpreter (Cancun).
pub mod gas {
    /// Cost of `JUMPDEST`.
    pub const JUMPDEST: u64 = 1;
    /// The "zero" tier (`STOP`, `RETURN`, `REVERT`).
    pub const ZERO: u64 = 0;
    /// The "base" tier (`ADDRESS`, `ORIGIN`, `CALLER`, `POP`, ...).
    pub const BASE: u64 = 2;
    /// The "very low" tier (`ADD`, `SUB`, `PUSH*`, `DUP*`, `SWAP*`, `MLOAD`, ...).
    pub const VERYLOW: u64 = 3;
    /// The "low" tier (`MUL`, `DIV`, `MOD`, `SIGNEXTEND`, ...).
    pub const LOW: u64 = 5;
    /// The "mid" tier (`ADDMOD`, `MULMOD`, `JUMP`).
    pub const MID: u64 = 8;
    /// The "high" tier (`JUMPI`).
    pub const HIGH: u64 = 10;
    /// Base cost of `EXP`.
    pub const EXP: u64 = 10;
    /// Cost of `EXP` per byte of the exponent.
    pub const EXP_BYTE: u64 = 50;
    /// Base cost of `KECCAK256`.
    pub const KECCAK256: u64 = 30;
    /// Cost of `KECCAK256` per word of input.
    pub const KECCAK256WORD: u64 = 6;
    /// Cost per word copied by the `*COPY` family.
    pub const COPY: u64 = 3;
    /// Cost of `BLOCKHASH`.
    pub const BLOCKHASH: u64 = 20;
    /// Base cost of `LOG*`.
    pub const LOG: u64 = 375;
    /// Cost of `LOG*` per byte of data.
    pub const LOGDATA: u64 = 8;
    /// Cost of `LOG*` per topic.
    pub const LOGTOPIC: u64 = 375;
    /// Base cost of `CREATE`/`CREATE2`.
    pub const CREATE: u64 = 32_000;
    /// Cost per word of init code (EIP-3860), also charged for `CREATE2` hashing.
    pub const INITCODE_WORD_COST: u64 = 2;
    /// Cost per byte of deployed code.
    pub const CODEDEPOSIT: u64 = 200;
    /// Additional cost of a call transferring value.
    pub const CALLVALUE: u64 = 9_000;
    /// Gas given to the callee for free when value is transferred.
    pub const CALL_STIPEND: u64 = 2_300;
    /// Additional cost of a value transfer creating a new account.
    pub const NEWACCOUNT: u64 = 25_000;
    /// Base cost of `SELFDESTRUCT`.
    pub const SELFDESTRUCT: u64 = 5_000;
    /// Cost of a memory word, linear component.
    pub const MEMORY: u64 = 3;
    /// Quadratic denominator of the memory cost.
    pub const MEMORY_QUAD_DIVISOR: u64 = 512;

    /// Access cost of an account already in the access set (EIP-2929).
    pub const WARM_STORAGE_READ_COST: u64 = 100;
    /// Access cost of an account not yet in the access set (EIP-2929).
    pub const COLD_ACCOUNT_ACCESS_COST: u64 = 2_600;
    /// Access cost of a storage slot not yet in the access set (EIP-2929).
    pub const COLD_SLOAD_COST: u64 = 2_100;
    /// `SSTORE` fails if less than this is left (EIP-2200).
    pub const SSTORE_SENTRY: u64 = 2_300;
    /// Cost of setting a zero slot to non-zero.
    pub const SSTORE_SET: u64 = 20_000;
    /// Cost of changing a non-zero slot, minus the cold surcharge.
    pub const SSTORE_RESET: u64 = 5_000 - COLD_SLOAD_COST;
    /// Refund for clearing a slot (EIP-3529).
    pub const SSTORE_CLEARS_SCHEDULE: i64 = 4_800;
    /// Cost of `TLOAD`/`TSTORE` (EIP-1153).
    pub const TRANSIENT: u64 = 100;
    /// Refunds are capped at `gas_used / MAX_REFUND_QUOTIENT` (EIP-3529).
    pub const MAX_REFUND_QUOTIENT: u64 = 5;
}

/// Intrinsic transaction costs.
pub mod intrinsic {
    /// Base cost of every transaction.
    pub const TX_BASE: u64 = 21_000;
    /// Additional base cost of a contract creation transaction.
    pub const TX_CREATE: u64 = 32_000;
    /// Cost per zero byte of calldata.
    pub const TX_DATA_ZERO: u64 = 4;
    /// Cost per non-zero byte of calldata.
    pub const TX_DATA_NON_ZERO: u64 = 16;
    /// Cost per address of the access list (EIP-2930).
    pub const ACCESS_LIST_ADDRESS: u64 = 2_400;
    /// Cost per storage key of the access list (EIP-2930).
    pub const ACCESS_LIST_STORAGE_KEY: u64 = 1_900;
}

/// Execution limits.
pub mod limits {
    /// Maximum number of words on the operand stack.
    pub const STACK_LIMIT: usize = 1024;
    /// Default maximum call depth.
    pub const CALL_DEPTH_LIMIT: usize = 1024;
    /// Maximum size of deployed code (EIP-170).
    pub const MAX_CODE_SIZE: usize = 0x6000;
    /// Maximum size of init code (EIP-3860).
    pub const MAX_INITCODE_SIZE: usize = 2 * MAX_CODE_SIZE;
    /// Number of recent blocks visible to `BLOCKHASH`.
    pub const BLOCK_HASH_HISTORY: u64 = 256;
}
