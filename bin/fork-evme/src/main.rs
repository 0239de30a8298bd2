//! `fork-evme`: run EVM bytecode against a local or forked state, or serve the node's
//! JSON-RPC procedures over stdio.

use clap::Parser;

mod cmd;
pub use cmd::*;

mod common;
mod rpc;
mod run;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Error> {
    set_thread_panic_hook();
    let cmd = MainCmd::parse();
    cmd.log_args.init()?;
    cmd.run().await.inspect_err(|e| eprintln!("{e}"))
}

/// Sets thread panic hook so a panic on any worker exits the process.
fn set_thread_panic_hook() {
    use std::{
        backtrace::Backtrace,
        panic::{set_hook, take_hook},
        process::exit,
    };
    let orig_hook = take_hook();
    set_hook(Box::new(move |panic_info| {
        eprintln!("Custom backtrace: {}", Backtrace::capture());
        orig_hook(panic_info);
        exit(1);
    }));
}
