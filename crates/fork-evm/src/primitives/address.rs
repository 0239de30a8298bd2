use alloy_primitives::{Address, B256};

/// Computes the address of a contract created with `CREATE` by `sender` at `nonce`:
/// `keccak256(rlp([sender, nonce]))[12..]`.
pub fn create_address(sender: Address, nonce: u64) -> Address {
    sender.create(nonce)
}

/// Computes the address of a contract created with `CREATE2`:
/// `keccak256(0xff ++ sender ++ salt ++ init_code_hash)[12..]`.
pub fn create2_address(sender: Address, salt: B256, init_code_hash: B256) -> Address {
    sender.create2(salt, init_code_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, keccak256};

    #[test]
    fn test_create_address_known_vector() {
        // The first contract deployed by this account on mainnet is the canonical example.
        let sender = address!("6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0");
        assert_eq!(create_address(sender, 0), address!("cd234a471b72ba2f1ccf0a70fcaba648a5eecd8d"));
        assert_eq!(create_address(sender, 1), address!("343c43a37d37dff08ae8c4a11544c718abb4fcf8"));
    }

    #[test]
    fn test_create2_address_known_vector() {
        // EIP-1014 example 1.
        let address = create2_address(Address::ZERO, B256::ZERO, keccak256([0x00]));
        assert_eq!(address, address!("4d1a2e2bb4f88f0250f26ffff098b0b30b26bf38"));
    }

    #[test]
    fn test_derivation_is_pure_and_input_sensitive() {
        let sender = address!("00000000000000000000000000000000000000aa");
        let salt = b256!("0000000000000000000000000000000000000000000000000000000000000001");
        let hash = keccak256([0x60, 0x00]);

        assert_eq!(create_address(sender, 3), create_address(sender, 3));
        assert_ne!(create_address(sender, 3), create_address(sender, 4));
        assert_eq!(create2_address(sender, salt, hash), create2_address(sender, salt, hash));
        assert_ne!(create2_address(sender, salt, hash), create2_address(sender, B256::ZERO, hash));
        assert_ne!(create2_address(sender, salt, hash), create2_address(sender, salt, B256::ZERO));
    }
}
