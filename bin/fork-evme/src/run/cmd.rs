use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use alloy_primitives::{hex, Address, Bytes, U256};
use clap::Parser;
use fork_evm::{
    evm::BlockEnv,
    runner::{run_tx, BlockContext, TxOutcome},
    tracers::CallTracer,
    DynStateManager, EvmConfig, ExecutionResult, NoOpInspector, StateWriter, Transaction,
};
use tracing::debug;

use crate::common::{load_hex, PreStateArgs, Result, StateDumpArgs};

/// Block and chain environment arguments
#[derive(Parser, Debug, Clone)]
#[command(next_help_heading = "Environment Options")]
pub struct EnvArgs {
    /// `ChainID` to use
    #[arg(long = "state.chainid", default_value_t = fork_evm::evm::DEFAULT_CHAIN_ID)]
    pub chain_id: u64,

    /// Block number
    #[arg(long = "block.number", default_value = "1")]
    pub block_number: u64,

    /// Block coinbase/beneficiary address
    #[arg(long = "block.coinbase", default_value = "0x0000000000000000000000000000000000000000")]
    pub block_coinbase: Address,

    /// Block timestamp
    #[arg(long = "block.timestamp", default_value = "1")]
    pub block_timestamp: u64,

    /// Block gas limit
    #[arg(long = "block.gaslimit", default_value = "30000000")]
    pub block_gas_limit: u64,

    /// Block base fee per gas (EIP-1559)
    #[arg(long = "block.basefee", default_value = "0")]
    pub block_basefee: u64,
}

impl EnvArgs {
    /// The execution parameters of the run.
    pub fn evm_config(&self) -> EvmConfig {
        EvmConfig { chain_id: self.chain_id, ..Default::default() }
    }

    /// The block the run executes in.
    pub fn block_env(&self) -> BlockEnv {
        BlockEnv {
            number: self.block_number,
            coinbase: self.block_coinbase,
            timestamp: self.block_timestamp,
            gas_limit: self.block_gas_limit,
            basefee: self.block_basefee,
            ..Default::default()
        }
    }
}

/// Trace configuration arguments
#[derive(Parser, Debug, Clone)]
#[command(next_help_heading = "Trace Options")]
pub struct TraceArgs {
    /// Print the call tree in geth `callTracer` format
    #[arg(long = "trace")]
    pub trace: bool,

    /// Output file for trace data (if not specified, prints to console)
    #[arg(long = "trace.output")]
    pub trace_output_file: Option<PathBuf>,
}

/// Run arbitrary EVM bytecode
#[derive(Parser, Debug)]
pub struct Cmd {
    /// EVM bytecode as hex string (positional argument)
    #[arg(value_name = "CODE")]
    pub code: Option<String>,

    /// File containing EVM code. If '-' is specified, code is read from stdin
    #[arg(long = "codefile")]
    pub codefile: Option<String>,

    /// Indicates the action should be create rather than call
    #[arg(long = "create")]
    pub create: bool,

    /// Gas limit for the evm
    #[arg(long = "gas", default_value = "10000000")]
    pub gas: u64,

    /// Input for the EVM (hex string)
    #[arg(long = "input")]
    pub input: Option<String>,

    /// File containing input for the EVM
    #[arg(long = "inputfile")]
    pub inputfile: Option<String>,

    /// Price set for the evm (gas price)
    #[arg(long = "price", default_value = "0")]
    pub price: u128,

    /// The transaction receiver (execution context)
    #[arg(long = "receiver", visible_aliases = ["to"], default_value = "0x0000000000000000000000000000000000000000")]
    pub receiver: Address,

    /// The transaction origin
    #[arg(long = "sender", visible_aliases = ["from"], default_value = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")]
    pub sender: Address,

    /// Value set for the evm
    #[arg(long = "value", default_value = "0")]
    pub value: U256,

    /// Pre-execution state configuration
    #[command(flatten)]
    pub prestate_args: PreStateArgs,

    /// Environment configuration
    #[command(flatten)]
    pub env_args: EnvArgs,

    /// State dump configuration
    #[command(flatten)]
    pub dump_args: StateDumpArgs,

    /// Trace configuration
    #[command(flatten)]
    pub trace_args: TraceArgs,
}

/// Execution result with optional trace data
#[derive(Debug)]
pub struct RunResult {
    /// The outcome of the transaction.
    pub outcome: TxOutcome,
    /// Wall time spent executing.
    pub exec_time: Duration,
    /// The call tree as pretty JSON.
    pub trace: Option<String>,
}

impl Cmd {
    /// Execute the run command
    pub async fn run(&self) -> Result<()> {
        let code = load_hex(self.code.as_deref(), self.codefile.as_deref())?.unwrap_or_default();
        let input =
            load_hex(self.input.as_deref(), self.inputfile.as_deref())?.unwrap_or_default();

        let mut state = self.prestate_args.create_initial_state(self.sender).await?;
        let result = self.execute(&mut state, code, input)?;
        self.output_results(&result)?;
        self.dump_args.dump_state(&mut state)
    }

    /// The transaction of the run. In create mode `code` is the init code with `input`
    /// appended; otherwise `input` is the calldata sent to the receiver.
    pub fn transaction(&self, code: &[u8], input: Bytes) -> Transaction {
        let tx = if self.create {
            let mut init_code = code.to_vec();
            init_code.extend_from_slice(&input);
            Transaction::create(self.sender, init_code.into())
        } else {
            Transaction::call(self.sender, self.receiver, input)
        };
        Transaction {
            value: self.value,
            gas_limit: self.gas,
            gas_price: Some(self.price),
            ..tx
        }
    }

    /// Installs the code (unless creating) and executes the transaction, committing its
    /// changes to `state`.
    pub fn execute(
        &self,
        state: &mut DynStateManager,
        code: Bytes,
        input: Bytes,
    ) -> Result<RunResult> {
        let tx = self.transaction(&code, input);
        if !self.create && !code.is_empty() {
            let hash = state.put_code(self.receiver, code)?;
            debug!(receiver = %self.receiver, code_hash = %hash, "Installed code");
        }

        let config = self.env_args.evm_config();
        let block = self.env_args.block_env();
        let ctx = BlockContext { config: &config, block: &block, hashes: &() };

        let start = Instant::now();
        let (outcome, trace) = if self.trace_args.trace {
            let mut tracer = CallTracer::new();
            let outcome = run_tx(state, ctx, &tx, &mut tracer)?;
            let frame = tracer.into_trace(&tx, outcome.gas_used());
            (outcome, Some(serde_json::to_string_pretty(&frame)?))
        } else {
            (run_tx(state, ctx, &tx, NoOpInspector)?, None)
        };
        Ok(RunResult { outcome, exec_time: start.elapsed(), trace })
    }

    /// Output execution results
    fn output_results(&self, result: &RunResult) -> Result<()> {
        let output = result.outcome.result.output().cloned().unwrap_or_default();
        println!("0x{}", hex::encode(&output));

        match &result.outcome.result {
            ExecutionResult::Success { .. } => {}
            ExecutionResult::Revert { .. } => eprintln!(" error: execution reverted"),
            ExecutionResult::Halt { reason, .. } => eprintln!(" error: {reason}"),
        }
        if let Some(address) = result.outcome.contract_address() {
            eprintln!(" contract: {address}");
        }

        eprintln!();
        eprintln!("EVM gas used:    {}", result.outcome.gas_used());
        eprintln!("execution time:  {:?}", result.exec_time);

        if let Some(trace) = &result.trace {
            match &self.trace_args.trace_output_file {
                Some(path) => {
                    std::fs::write(path, trace)?;
                    eprintln!();
                    eprintln!("Trace written to: {}", path.display());
                }
                None => {
                    eprintln!();
                    eprintln!("=== Execution Trace ===");
                    eprintln!("{trace}");
                }
            }
        }
        Ok(())
    }
}
