//! Initial state of a run: optional upstream, prestate file and per-account overrides.

use std::{path::PathBuf, str::FromStr};

use alloy_primitives::{utils::parse_units, Address, U256};
use clap::Parser;
use fork_evm::{
    fork::{BlockingBridge, ForkMode},
    AccountFields, DynStateManager, ForkStateManager, NormalStateManager, ProxyStateManager,
    StateDump, StateWriter,
};
use tracing::{debug, info};

use super::{EvmeError, ForkArgs, Result};

/// Pre-execution state configuration arguments
#[derive(Parser, Debug, Clone)]
#[command(next_help_heading = "State Options")]
pub struct PreStateArgs {
    /// Upstream to fork
    #[command(flatten)]
    pub fork_args: ForkArgs,

    /// JSON state dump to load before execution. It overrides the forked remote state (if
    /// applicable).
    #[arg(long = "prestate", visible_aliases = ["pre-state"])]
    pub prestate: Option<PathBuf>,

    /// Balance to allocate to the sender account
    #[arg(long = "sender.balance", visible_aliases = ["from.balance"])]
    pub sender_balance: Option<U256>,

    /// Override balance for specified addresses. Each entry format: `ADDRESS=VALUE`
    /// VALUE can be: plain number (wei), or number with suffix (ether, gwei, wei).
    /// Examples: `--balance 0x1234=100ether`
    #[arg(long = "balance")]
    pub balance: Vec<String>,

    /// Override storage slots. Each entry format: `ADDRESS:SLOT=VALUE`
    /// SLOT and VALUE are U256 (hex or decimal).
    /// Examples: `--storage 0x1234:0x0=0x1`
    #[arg(long = "storage")]
    pub storage: Vec<String>,
}

/// Parses an amount of ether: a plain number of wei, or a number with a unit suffix such as
/// `ether` or `gwei`.
pub fn parse_ether_value(s: &str) -> Result<U256> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let unit = if unit.is_empty() { "wei" } else { unit };
    parse_units(number, unit)
        .map(Into::into)
        .map_err(|e| EvmeError::InvalidInput(format!("Invalid ether value '{s}': {e}")))
}

/// Parses an `ADDRESS=VALUE` balance entry.
pub fn parse_balance_entry(entry: &str) -> Result<(Address, U256)> {
    let (address, value) = entry.split_once('=').ok_or_else(|| {
        EvmeError::InvalidInput(format!("Invalid balance entry '{entry}': expected 'ADDRESS=VALUE'"))
    })?;
    Ok((parse_address(address, entry)?, parse_ether_value(value)?))
}

/// Parses an `ADDRESS:SLOT=VALUE` storage entry.
pub fn parse_storage_entry(entry: &str) -> Result<(Address, U256, U256)> {
    let invalid = || {
        EvmeError::InvalidInput(format!(
            "Invalid storage entry '{entry}': expected 'ADDRESS:SLOT=VALUE'"
        ))
    };
    let (address, rest) = entry.split_once(':').ok_or_else(invalid)?;
    let (slot, value) = rest.split_once('=').ok_or_else(invalid)?;
    let word = |s: &str| {
        U256::from_str(s.trim()).map_err(|e| {
            EvmeError::InvalidInput(format!("Invalid word '{s}' in storage entry '{entry}': {e}"))
        })
    };
    Ok((parse_address(address, entry)?, word(slot)?, word(value)?))
}

fn parse_address(s: &str, entry: &str) -> Result<Address> {
    Address::from_str(s.trim()).map_err(|e| {
        EvmeError::InvalidInput(format!("Invalid address '{s}' in entry '{entry}': {e}"))
    })
}

impl PreStateArgs {
    /// Reads the prestate file, if any.
    pub fn load_prestate(&self) -> Result<Option<StateDump>> {
        let Some(path) = &self.prestate else {
            debug!("No prestate file provided");
            return Ok(None);
        };
        info!(prestate_path = ?path, "Loading prestate from file");
        let content = std::fs::read_to_string(path)?;
        let dump = serde_json::from_str(&content).map_err(|e| {
            EvmeError::InvalidInput(format!("Failed to parse prestate JSON: {e}"))
        })?;
        Ok(Some(dump))
    }

    /// Creates the state of a run: a session on the configured upstream (or a local one) with
    /// the prestate file and the overrides applied on top.
    pub async fn create_initial_state(&self, sender: Address) -> Result<DynStateManager> {
        let mut state = match self.fork_args.config() {
            Some(config) => {
                let bridge = BlockingBridge::current_or_new()?;
                match config.mode {
                    ForkMode::Fork => ForkStateManager::fork(&config, bridge).await?.boxed(),
                    ForkMode::Proxy { expected_block_time } => {
                        ProxyStateManager::proxy(&config, expected_block_time, bridge)
                            .await?
                            .boxed()
                    }
                }
            }
            None => {
                debug!("Creating local state");
                NormalStateManager::new().boxed()
            }
        };

        if let Some(dump) = self.load_prestate()? {
            let root = state.load_state(&dump)?;
            debug!(accounts = dump.len(), %root, "Prestate loaded");
        }
        self.apply_overrides(&mut state, sender)?;
        Ok(state)
    }

    /// Applies `--balance`, `--storage` and `--sender.balance`, in that order.
    pub fn apply_overrides(&self, state: &mut DynStateManager, sender: Address) -> Result<()> {
        for entry in &self.balance {
            let (address, balance) = parse_balance_entry(entry)?;
            info!(%address, %balance, "Overriding balance");
            state.modify_account_fields(
                address,
                AccountFields { balance: Some(balance), ..Default::default() },
            )?;
        }
        for entry in &self.storage {
            let (address, slot, value) = parse_storage_entry(entry)?;
            info!(%address, %slot, %value, "Overriding storage");
            // make sure the account exists so the slot is part of the state root
            state.modify_account_fields(address, AccountFields::default())?;
            state.put_storage(address, slot, value);
        }
        if let Some(balance) = self.sender_balance {
            info!(%sender, %balance, "Overriding sender balance");
            state.modify_account_fields(
                sender,
                AccountFields { balance: Some(balance), ..Default::default() },
            )?;
        }
        Ok(())
    }
}

/// State dump configuration arguments
#[derive(Parser, Debug, Clone)]
#[command(next_help_heading = "Dump Options")]
pub struct StateDumpArgs {
    /// Dumps the state after the run
    #[arg(long = "dump")]
    pub dump: bool,

    /// Output file for state dump (if not specified, prints to console)
    #[arg(long = "dump.output")]
    pub dump_output_file: Option<PathBuf>,
}

impl StateDumpArgs {
    /// Writes the dump of `state` to the output file or stderr, if dumping is enabled.
    pub fn dump_state(&self, state: &mut DynStateManager) -> Result<()> {
        if !self.dump {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(&state.dump_state()?)?;
        match &self.dump_output_file {
            Some(path) => {
                std::fs::write(path, json)?;
                eprintln!();
                eprintln!("State dump written to: {}", path.display());
            }
            None => {
                eprintln!();
                eprintln!("=== State Dump ===");
                eprintln!("{json}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use fork_evm::StateReader;
    use rstest::rstest;

    use super::*;

    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");

    #[rstest]
    #[case("1", U256::from(1))]
    #[case("2gwei", U256::from(2_000_000_000u64))]
    #[case("1.5ether", U256::from(1_500_000_000_000_000_000u128))]
    fn test_parse_ether_value(#[case] input: &str, #[case] expected: U256) {
        assert_eq!(parse_ether_value(input).unwrap(), expected);
    }

    #[rstest]
    #[case("0xa11ce")]
    #[case("0x00000000000000000000000000000000000a11ce:1")]
    #[case("nope:1=2")]
    fn test_invalid_storage_entry(#[case] entry: &str) {
        assert!(matches!(parse_storage_entry(entry), Err(EvmeError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_entries() {
        let (address, balance) =
            parse_balance_entry("0x00000000000000000000000000000000000a11ce=3ether").unwrap();
        assert_eq!(address, ALICE);
        assert_eq!(balance, U256::from(3_000_000_000_000_000_000u128));

        let entry = parse_storage_entry("0x00000000000000000000000000000000000a11ce:0x1=10").unwrap();
        assert_eq!(entry, (ALICE, U256::from(1), U256::from(10)));
    }

    #[tokio::test]
    async fn test_overrides_apply_on_top_of_prestate() {
        let mut prestate = NormalStateManager::new();
        prestate.put_account(ALICE, fork_evm::Account::with_balance(U256::from(1)));
        prestate.put_storage(ALICE, U256::from(1), U256::from(1));
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(&prestate.dump_state().unwrap()).unwrap())
            .unwrap();

        let args = PreStateArgs {
            fork_args: ForkArgs {
                fork: false,
                fork_block: Default::default(),
                fork_rpc: String::new(),
                proxy: None,
            },
            prestate: Some(file.path().to_path_buf()),
            sender_balance: Some(U256::from(7)),
            balance: vec![],
            storage: vec!["0x00000000000000000000000000000000000a11ce:2=5".to_string()],
        };
        let mut state = args.create_initial_state(ALICE).await.unwrap();
        assert_eq!(state.get_account(ALICE).unwrap().unwrap().balance, U256::from(7));
        assert_eq!(state.get_storage(ALICE, U256::from(1)).unwrap(), U256::from(1));
        assert_eq!(state.get_storage(ALICE, U256::from(2)).unwrap(), U256::from(5));
    }
}
