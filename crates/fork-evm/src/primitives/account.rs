use alloy_primitives::{B256, KECCAK256_EMPTY, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use alloy_trie::EMPTY_ROOT_HASH;

/// The state of an account as committed to by the account trie.
///
/// The field order is the RLP order of the account trie leaves:
/// `[nonce, balance, storageRoot, codeHash]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, RlpEncodable, RlpDecodable)]
pub struct Account {
    /// Number of transactions sent (EOA) or contracts created (contract).
    pub nonce: u64,
    /// Balance in wei.
    pub balance: U256,
    /// Root of the account's storage trie.
    pub storage_root: B256,
    /// Keccak hash of the account's code. [`KECCAK256_EMPTY`] when there is no code.
    pub code_hash: B256,
}

impl Default for Account {
    fn default() -> Self {
        Self { nonce: 0, balance: U256::ZERO, storage_root: EMPTY_ROOT_HASH, code_hash: KECCAK256_EMPTY }
    }
}

impl Account {
    /// Creates an account holding only a balance.
    pub fn with_balance(balance: U256) -> Self {
        Self { balance, ..Default::default() }
    }

    /// Returns `true` if the account has code.
    pub fn is_contract(&self) -> bool {
        self.code_hash != KECCAK256_EMPTY
    }

    /// Returns `true` if the account is empty in the EIP-161 sense: zero nonce, zero balance
    /// and no code. Empty accounts that are touched by a transaction are removed.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && !self.is_contract()
    }

    /// Encodes the account as an account trie leaf.
    pub fn encode_rlp(&self) -> Vec<u8> {
        alloy_rlp::encode(self)
    }

    /// Decodes an account trie leaf.
    pub fn decode_rlp(mut data: &[u8]) -> Result<Self, alloy_rlp::Error> {
        <Self as alloy_rlp::Decodable>::decode(&mut data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_account_is_empty() {
        let account = Account::default();
        assert!(account.is_empty());
        assert!(!account.is_contract());
        assert_eq!(account.storage_root, EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_account_with_nonce_is_not_empty() {
        let account = Account { nonce: 1, ..Default::default() };
        assert!(!account.is_empty());
    }

    #[test]
    fn test_account_rlp_field_order() {
        let account = Account {
            nonce: 7,
            balance: U256::from(1_000_000_000_000_000_000u128),
            storage_root: EMPTY_ROOT_HASH,
            code_hash: KECCAK256_EMPTY,
        };
        let encoded = account.encode_rlp();
        // list of 76 bytes: nonce (1) + balance (9) + storage root (33) + code hash (33)
        assert_eq!(encoded[..3], [0xf8, 0x4c, 0x07]);
        assert_eq!(encoded[encoded.len() - 32..], KECCAK256_EMPTY[..]);
        assert_eq!(Account::decode_rlp(&encoded).unwrap(), account);
    }
}
