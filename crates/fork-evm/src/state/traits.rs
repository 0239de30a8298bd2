use alloy_primitives::{Address, Bytes, B256, U256};
use auto_impl::auto_impl;

use super::Checkpoint;
use crate::{Account, StateError};

/// Read access to the world state as seen through all pending checkpoints.
///
/// Reads take `&mut self` because a miss may populate caches or fetch from an upstream.
#[auto_impl(&mut, Box)]
pub trait StateReader {
    /// Returns the account at `address`, or `None` if it does not exist.
    fn get_account(&mut self, address: Address) -> Result<Option<Account>, StateError>;

    /// Returns the value of a storage slot. Unset slots read as zero.
    fn get_storage(&mut self, address: Address, slot: U256) -> Result<U256, StateError>;

    /// Returns the code of the account at `address`. Accounts without code return empty bytes.
    fn get_code(&mut self, address: Address) -> Result<Bytes, StateError>;
}

/// Write access to the world state.
///
/// Writes land in the topmost pending layer only; they reach the tries on
/// [`flush`](StateWriter::flush).
#[auto_impl(&mut, Box)]
pub trait StateWriter: StateReader {
    /// Writes an account.
    fn put_account(&mut self, address: Address, account: Account);

    /// Deletes an account together with its storage.
    fn delete_account(&mut self, address: Address);

    /// Writes a storage slot. Writing zero unsets the slot.
    fn put_storage(&mut self, address: Address, slot: U256, value: U256);

    /// Wipes all storage of an account.
    fn clear_storage(&mut self, address: Address);

    /// Deploys `code` at `address`, creating the account if needed. Returns the code hash.
    fn put_code(&mut self, address: Address, code: Bytes) -> Result<B256, StateError>;

    /// Opens a checkpoint.
    fn checkpoint(&mut self) -> Checkpoint;

    /// Commits the most recent checkpoint into its parent.
    fn commit(&mut self, checkpoint: Checkpoint);

    /// Discards every write made since the most recent checkpoint.
    fn revert(&mut self, checkpoint: Checkpoint);

    /// Writes all pending changes into the tries and returns the new state root.
    ///
    /// Must not be called while a checkpoint is pending.
    fn flush(&mut self) -> Result<B256, StateError>;
}
