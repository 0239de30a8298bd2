use alloy_primitives::Address;
use clap::Parser;
use fork_evm::{
    evm::DEFAULT_CHAIN_ID,
    node::{MiningMode, DEFAULT_BASE_FEE, DEFAULT_BLOCK_GAS_LIMIT},
    rpc::RpcHandler,
    Node, NodeConfig,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::common::{parse_balance_entry, ForkArgs, Result};

/// Serve JSON-RPC requests, one per stdin line, answering one per stdout line
#[derive(Parser, Debug)]
pub struct Cmd {
    /// `ChainID` reported by `eth_chainId` and seen by `CHAINID`
    #[arg(long = "chain-id", default_value_t = DEFAULT_CHAIN_ID)]
    pub chain_id: u64,

    /// When transactions are mined: `auto`, `manual`, or an interval in milliseconds
    #[arg(long = "mining", default_value = "auto")]
    pub mining: MiningMode,

    /// Block coinbase/beneficiary address
    #[arg(long = "block.coinbase", default_value = "0x0000000000000000000000000000000000000000")]
    pub coinbase: Address,

    /// Base fee per gas of every block
    #[arg(long = "block.basefee", default_value_t = DEFAULT_BASE_FEE)]
    pub base_fee: u64,

    /// Gas limit of every block
    #[arg(long = "block.gaslimit", default_value_t = DEFAULT_BLOCK_GAS_LIMIT)]
    pub gas_limit: u64,

    /// Fund an account before the first block. Each entry format: `ADDRESS=VALUE`
    /// VALUE can be: plain number (wei), or number with suffix (ether, gwei, wei).
    #[arg(long = "account")]
    pub accounts: Vec<String>,

    /// Upstream to fork
    #[command(flatten)]
    pub fork_args: ForkArgs,
}

impl Cmd {
    /// The node configuration selected by the arguments.
    pub fn node_config(&self) -> Result<NodeConfig> {
        let mut config = NodeConfig {
            mining: self.mining,
            coinbase: self.coinbase,
            gas_limit: self.gas_limit,
            base_fee: self.base_fee,
            chain_id: self.chain_id,
            fork: self.fork_args.config(),
            ..Default::default()
        };
        for entry in &self.accounts {
            let (address, balance) = parse_balance_entry(entry)?;
            config = config.with_account(address, balance);
        }
        Ok(config)
    }

    /// Execute the rpc command
    pub async fn run(&self) -> Result<()> {
        let node = Node::new(self.node_config()?).await?;
        info!(chain_id = node.chain_id(), block = node.block_number(), "Serving JSON-RPC on stdio");
        let handler = RpcHandler::new(node);
        serve(&handler, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
    }
}

/// Answers every non-blank line of `reader` with one line on `writer`, until end of input.
pub async fn serve<R, W>(handler: &RpcHandler, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = handler.handle_json(line);
        writer.write_all(response.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    debug!("Input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn cmd(args: &[&str]) -> Cmd {
        #[derive(Parser, Debug)]
        struct Wrapper {
            #[command(flatten)]
            cmd: Cmd,
        }
        Wrapper::parse_from(std::iter::once("rpc").chain(args.iter().copied())).cmd
    }

    #[test]
    fn test_node_config() {
        let config = cmd(&[
            "--chain-id",
            "7",
            "--mining",
            "manual",
            "--account",
            "0x00000000000000000000000000000000000a11ce=1ether",
        ])
        .node_config()
        .unwrap();
        assert_eq!(config.chain_id, 7);
        assert_eq!(config.mining, MiningMode::Manual);
        assert_eq!(config.accounts.len(), 1);
        assert!(config.fork.is_none());
    }

    #[tokio::test]
    async fn test_serve_answers_each_line() {
        let config = cmd(&["--account", "0x00000000000000000000000000000000000a11ce=5"])
            .node_config()
            .unwrap();
        let handler = RpcHandler::new(Node::local(config).unwrap());

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"eth_chainId","params":[]}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"eth_getBalance","params":["0x00000000000000000000000000000000000a11ce","latest"]}"#,
            "\n",
            "not json\n",
        );
        let mut output = Vec::new();
        serve(&handler, input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["result"], "0x384");
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"], "0x5");
        assert_eq!(responses[2]["error"]["code"], -32700);
    }
}
