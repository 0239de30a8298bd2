use alloy_eips::eip2930::AccessList;
use alloy_primitives::{keccak256, Address, Bytes, TxKind, B256, U256};
use alloy_rlp::RlpEncodable;

use super::TxError;
use crate::constants::{gas::INITCODE_WORD_COST, intrinsic::*};
use crate::interpreter::num_words;

/// The default gas limit of a transaction that does not set one.
pub const DEFAULT_TX_GAS_LIMIT: u64 = 30_000_000;

/// An unsigned transaction, executed as if signed by `caller`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// The sender.
    pub caller: Address,
    /// Call target, or creation.
    pub kind: TxKind,
    /// Value transferred.
    pub value: U256,
    /// Call data or init code.
    pub input: Bytes,
    /// Gas limit, intrinsic cost included.
    pub gas_limit: u64,
    /// The nonce. `None` takes the sender's current nonce and skips the check.
    pub nonce: Option<u64>,
    /// Legacy gas price.
    pub gas_price: Option<u128>,
    /// EIP-1559 fee cap.
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 tip cap.
    pub max_priority_fee_per_gas: Option<u128>,
    /// EIP-2930 access list.
    pub access_list: AccessList,
    /// Mint whatever the sender lacks to pay for value and gas instead of failing.
    pub skip_balance: bool,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            caller: Address::ZERO,
            kind: TxKind::Create,
            value: U256::ZERO,
            input: Bytes::new(),
            gas_limit: DEFAULT_TX_GAS_LIMIT,
            nonce: None,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            access_list: AccessList::default(),
            skip_balance: false,
        }
    }
}

#[derive(RlpEncodable)]
struct HashedFields {
    caller: Address,
    nonce: u64,
    kind: TxKind,
    value: U256,
    input: Bytes,
    gas_limit: u64,
    fee_cap: u128,
    tip_cap: u128,
}

impl Transaction {
    /// A call from `caller` to `to`.
    pub fn call(caller: Address, to: Address, input: Bytes) -> Self {
        Self { caller, kind: TxKind::Call(to), input, ..Default::default() }
    }

    /// A creation from `caller` running `init_code`.
    pub fn create(caller: Address, init_code: Bytes) -> Self {
        Self { caller, kind: TxKind::Create, input: init_code, ..Default::default() }
    }

    /// Returns `true` for a contract creation.
    pub fn is_create(&self) -> bool {
        self.kind.is_create()
    }

    /// The highest price per gas the sender agreed to pay.
    pub fn fee_cap(&self) -> u128 {
        self.max_fee_per_gas.or(self.gas_price).unwrap_or_default()
    }

    /// The price per gas actually paid in a block with `base_fee`.
    ///
    /// A transaction without any fee field is free and exempt from the base fee.
    pub fn effective_gas_price(&self, base_fee: u64) -> Result<u128, TxError> {
        let base_fee_wide = u128::from(base_fee);
        match (self.gas_price, self.max_fee_per_gas) {
            (None, None) => Ok(0),
            (Some(gas_price), None) => {
                if gas_price < base_fee_wide {
                    return Err(TxError::FeeCapBelowBaseFee { fee_cap: gas_price, base_fee });
                }
                Ok(gas_price)
            }
            (_, Some(max_fee)) => {
                let tip_cap = self.max_priority_fee_per_gas.unwrap_or_default();
                if tip_cap > max_fee {
                    return Err(TxError::PriorityFeeAboveMaxFee);
                }
                if max_fee < base_fee_wide {
                    return Err(TxError::FeeCapBelowBaseFee { fee_cap: max_fee, base_fee });
                }
                Ok(base_fee_wide + tip_cap.min(max_fee - base_fee_wide))
            }
        }
    }

    /// A hash identifying the transaction, derived from its fields and `nonce`.
    ///
    /// Transactions are not signed, so this is not the hash of a signed envelope.
    pub fn hash(&self, nonce: u64) -> B256 {
        let fields = HashedFields {
            caller: self.caller,
            nonce,
            kind: self.kind,
            value: self.value,
            input: self.input.clone(),
            gas_limit: self.gas_limit,
            fee_cap: self.fee_cap(),
            tip_cap: self.max_priority_fee_per_gas.unwrap_or_default(),
        };
        keccak256(alloy_rlp::encode(fields))
    }
}

/// The gas charged before any code runs: the base cost, calldata, access list and, for
/// creations, the creation surcharge and init code words (EIP-3860).
pub fn intrinsic_gas(tx: &Transaction) -> u64 {
    let zeros = tx.input.iter().filter(|byte| **byte == 0).count() as u64;
    let non_zeros = tx.input.len() as u64 - zeros;
    let mut gas = TX_BASE + zeros * TX_DATA_ZERO + non_zeros * TX_DATA_NON_ZERO;
    for item in &tx.access_list.0 {
        gas += ACCESS_LIST_ADDRESS + item.storage_keys.len() as u64 * ACCESS_LIST_STORAGE_KEY;
    }
    if tx.is_create() {
        gas += TX_CREATE + num_words(tx.input.len() as u64) * INITCODE_WORD_COST;
    }
    gas
}

/// Checks that a transaction is well-formed and fits the block, before touching the sender.
pub(crate) fn validate_static(
    tx: &Transaction,
    available_gas: u64,
    base_fee: u64,
    max_initcode_size: usize,
) -> Result<(u64, u128), TxError> {
    let intrinsic = intrinsic_gas(tx);
    if tx.gas_limit < intrinsic {
        return Err(TxError::IntrinsicGasTooLow { gas_limit: tx.gas_limit, intrinsic });
    }
    if tx.gas_limit > available_gas {
        return Err(TxError::GasLimitExceedsBlock { gas_limit: tx.gas_limit, available: available_gas });
    }
    if tx.is_create() && tx.input.len() > max_initcode_size {
        return Err(TxError::InitcodeTooLarge { size: tx.input.len(), limit: max_initcode_size });
    }
    let gas_price = tx.effective_gas_price(base_fee)?;
    Ok((intrinsic, gas_price))
}
