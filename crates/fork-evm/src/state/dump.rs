//! The JSON state dump: a flat, address-keyed view of the world state.

use std::collections::BTreeMap;

use alloy_primitives::{keccak256, Address, Bytes, B256, KECCAK256_EMPTY, U256};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Fallback, StateManager, StateWriter};
use crate::{Account, StateError};

/// One account of a [`StateDump`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpedAccount {
    /// The account nonce.
    #[serde(with = "alloy_serde::quantity")]
    pub nonce: u64,
    /// The account balance.
    pub balance: U256,
    /// The root of the account's storage trie. Recomputed on load.
    pub storage_root: B256,
    /// The hash of the account's code.
    pub code_hash: B256,
    /// The deployed code, if known locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
    /// The non-zero storage slots.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<U256, U256>,
}

/// A dump of the world state, keyed by address.
pub type StateDump = BTreeMap<Address, DumpedAccount>;

impl<F: Fallback> StateManager<F> {
    /// Flushes pending writes and dumps every locally known account.
    pub fn dump_state(&mut self) -> Result<StateDump, StateError> {
        self.flush()?;
        let world = self.world();
        let mut dump = StateDump::new();
        for (address, account) in world.accounts()? {
            let storage = world.storage_entries(address)?.into_iter().collect();
            let code = (account.code_hash != KECCAK256_EMPTY)
                .then(|| world.code_by_hash(account.code_hash))
                .flatten();
            dump.insert(
                address,
                DumpedAccount {
                    nonce: account.nonce,
                    balance: account.balance,
                    storage_root: account.storage_root,
                    code_hash: account.code_hash,
                    code,
                    storage,
                },
            );
        }
        Ok(dump)
    }

    /// Loads a dump on top of the current state and returns the new state root.
    ///
    /// Every loaded account replaces any previous account at its address, storage included.
    /// On error nothing is loaded.
    pub fn load_state(&mut self, dump: &StateDump) -> Result<B256, StateError> {
        self.flush()?;
        self.checkpoint_world();
        match self.apply_dump(dump) {
            Ok(root) => {
                self.commit_world();
                self.clear_caches();
                info!(target: "state", accounts = dump.len(), %root, "Loaded state");
                Ok(root)
            }
            Err(err) => {
                self.revert_world();
                Err(err)
            }
        }
    }

    fn apply_dump(&mut self, dump: &StateDump) -> Result<B256, StateError> {
        let world = self.world_mut();
        for (address, entry) in dump {
            if let Some(code) = &entry.code {
                let actual = if code.is_empty() { KECCAK256_EMPTY } else { keccak256(code) };
                if actual != entry.code_hash {
                    return Err(StateError::CodeHashMismatch {
                        address: *address,
                        expected: entry.code_hash,
                        actual,
                    });
                }
                world.put_code(code.clone());
            }
            world.clear_storage(*address);
            for (slot, value) in &entry.storage {
                world.put_storage(*address, *slot, *value);
            }
            world.put_account(
                *address,
                Account {
                    nonce: entry.nonce,
                    balance: entry.balance,
                    code_hash: entry.code_hash,
                    ..Default::default()
                },
            );
        }
        world.state_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NormalStateManager, StateReader};
    use alloy_primitives::address;

    const TOKEN: Address = address!("00000000000000000000000000000000000070c0");

    #[test]
    fn test_dump_layout_uses_hex_quantities() {
        let mut state = NormalStateManager::new();
        state.put_account(TOKEN, Account { nonce: 1, balance: U256::from(255), ..Default::default() });
        state.put_storage(TOKEN, U256::from(2), U256::from(20));
        state.put_code(TOKEN, Bytes::from_static(&[0x60, 0x00])).unwrap();

        let json = serde_json::to_value(state.dump_state().unwrap()).unwrap();
        let entry = &json["0x00000000000000000000000000000000000070c0"];
        assert_eq!(entry["nonce"], "0x1");
        assert_eq!(entry["balance"], "0xff");
        assert_eq!(entry["code"], "0x6000");
        assert_eq!(entry["storage"]["0x2"], "0x14");
    }

    #[test]
    fn test_load_rejects_mismatching_code() {
        let mut state = NormalStateManager::new();
        state.put_code(TOKEN, Bytes::from_static(&[0x60, 0x00])).unwrap();
        let mut dump = state.dump_state().unwrap();
        dump.get_mut(&TOKEN).unwrap().code = Some(Bytes::from_static(&[0x00]));

        let mut fresh = NormalStateManager::new();
        let err = fresh.load_state(&dump).unwrap_err();
        assert!(matches!(err, StateError::CodeHashMismatch { .. }));
        assert_eq!(fresh.get_account(TOKEN).unwrap(), None);
    }
}
