use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, Log, U256};

use crate::Checkpoint;

/// A transaction-scoped change that is undone when its frame reverts.
#[derive(Debug, Clone, PartialEq, Eq)]
enum JournalEntry {
    AccountWarmed(Address),
    SlotWarmed(Address, U256),
    TransientChanged { address: Address, slot: U256, previous: U256 },
    Created(Address),
    Touched(Address),
    Destroyed(Address),
}

/// The transaction-scoped bookkeeping that lives beside the state: access sets, transient
/// storage, logs and the accounts created, touched or destroyed so far.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    warm_accounts: HashSet<Address>,
    warm_slots: HashSet<(Address, U256)>,
    transient: HashMap<(Address, U256), U256>,
    created: HashSet<Address>,
    touched: HashSet<Address>,
    destroyed: HashSet<Address>,
    /// Slot values at the start of the transaction. Not journaled: a reverted first
    /// access leaves the slot at its original value anyway.
    originals: HashMap<(Address, U256), U256>,
    logs: Vec<Log>,
    entries: Vec<JournalEntry>,
}

/// A frame checkpoint: the state checkpoint plus the journal position.
#[derive(Debug)]
#[must_use = "a checkpoint must be committed or reverted"]
pub(crate) struct JournalCheckpoint {
    pub(crate) state: Checkpoint,
    entries: usize,
    logs: usize,
}

impl Journal {
    /// Marks an account warm. Returns `true` if it was cold.
    pub(crate) fn warm_account(&mut self, address: Address) -> bool {
        let is_cold = self.warm_accounts.insert(address);
        if is_cold {
            self.entries.push(JournalEntry::AccountWarmed(address));
        }
        is_cold
    }

    /// Marks a slot warm. Returns `true` if it was cold.
    pub(crate) fn warm_slot(&mut self, address: Address, slot: U256) -> bool {
        let is_cold = self.warm_slots.insert((address, slot));
        if is_cold {
            self.entries.push(JournalEntry::SlotWarmed(address, slot));
        }
        is_cold
    }

    pub(crate) fn tload(&self, address: Address, slot: U256) -> U256 {
        self.transient.get(&(address, slot)).copied().unwrap_or_default()
    }

    pub(crate) fn tstore(&mut self, address: Address, slot: U256, value: U256) {
        let previous = self.transient.insert((address, slot), value).unwrap_or_default();
        if previous != value {
            self.entries.push(JournalEntry::TransientChanged { address, slot, previous });
        }
    }

    /// Returns the original value of a slot, recording `present` if this is the first
    /// access.
    pub(crate) fn original(&mut self, address: Address, slot: U256, present: U256) -> U256 {
        *self.originals.entry((address, slot)).or_insert(present)
    }

    pub(crate) fn mark_created(&mut self, address: Address) {
        if self.created.insert(address) {
            self.entries.push(JournalEntry::Created(address));
        }
    }

    pub(crate) fn is_created(&self, address: &Address) -> bool {
        self.created.contains(address)
    }

    pub(crate) fn touch(&mut self, address: Address) {
        if self.touched.insert(address) {
            self.entries.push(JournalEntry::Touched(address));
        }
    }

    pub(crate) fn destroy(&mut self, address: Address) {
        if self.destroyed.insert(address) {
            self.entries.push(JournalEntry::Destroyed(address));
        }
    }

    pub(crate) fn log(&mut self, log: Log) {
        self.logs.push(log);
    }

    pub(crate) fn checkpoint(&self, state: Checkpoint) -> JournalCheckpoint {
        JournalCheckpoint { state, entries: self.entries.len(), logs: self.logs.len() }
    }

    /// Undoes everything recorded since `checkpoint` and returns the state checkpoint.
    pub(crate) fn revert(&mut self, checkpoint: JournalCheckpoint) -> Checkpoint {
        for entry in self.entries.drain(checkpoint.entries..).rev() {
            match entry {
                JournalEntry::AccountWarmed(address) => {
                    self.warm_accounts.remove(&address);
                }
                JournalEntry::SlotWarmed(address, slot) => {
                    self.warm_slots.remove(&(address, slot));
                }
                JournalEntry::TransientChanged { address, slot, previous } => {
                    self.transient.insert((address, slot), previous);
                }
                JournalEntry::Created(address) => {
                    self.created.remove(&address);
                }
                JournalEntry::Touched(address) => {
                    self.touched.remove(&address);
                }
                JournalEntry::Destroyed(address) => {
                    self.destroyed.remove(&address);
                }
            }
        }
        self.logs.truncate(checkpoint.logs);
        checkpoint.state
    }

    /// Ends the transaction, returning the logs and the accounts to clean up.
    pub(crate) fn finish(self) -> JournalOutput {
        JournalOutput { logs: self.logs, touched: self.touched, destroyed: self.destroyed }
    }
}

/// What remains of the journal once a transaction is done.
#[derive(Debug, Default)]
pub struct JournalOutput {
    /// Logs of frames that were not reverted, in emission order.
    pub logs: Vec<Log>,
    /// Accounts touched by the transaction (EIP-161).
    pub touched: HashSet<Address>,
    /// Accounts self-destructed in the transaction that created them (EIP-6780).
    pub destroyed: HashSet<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateCache;

    #[test]
    fn test_revert_restores_access_sets_and_transient_storage() {
        let mut cache = StateCache::default();
        let mut journal = Journal::default();
        let a = Address::with_last_byte(1);

        assert!(journal.warm_account(a));
        journal.tstore(a, U256::from(1), U256::from(1));

        let checkpoint = journal.checkpoint(cache.checkpoint());
        assert!(!journal.warm_account(a));
        assert!(journal.warm_slot(a, U256::from(2)));
        journal.tstore(a, U256::from(1), U256::from(9));
        journal.touch(a);
        journal.log(Log::empty());
        cache.revert(journal.revert(checkpoint));

        assert!(!journal.warm_account(a));
        assert!(journal.warm_slot(a, U256::from(2)));
        assert_eq!(journal.tload(a, U256::from(1)), U256::from(1));
        let output = journal.finish();
        assert!(output.touched.is_empty());
        assert!(output.logs.is_empty());
    }
}
