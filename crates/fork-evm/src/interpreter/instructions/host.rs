//! Instructions that read or write state through the [`Host`].

use alloy_primitives::{Bytes, Log, LogData, B256, U256};

use crate::{
    constants::gas::{
        BLOCKHASH, COLD_ACCOUNT_ACCESS_COST, COLD_SLOAD_COST, COPY, LOG, LOGDATA, LOGTOPIC, LOW,
        NEWACCOUNT, SELFDESTRUCT, SSTORE_CLEARS_SCHEDULE, SSTORE_RESET, SSTORE_SENTRY, SSTORE_SET,
        TRANSIENT, WARM_STORAGE_READ_COST,
    },
    interpreter::{as_usize, num_words, to_address, Control, Host, Interpreter, SStoreResult},
    HaltReason,
};

/// EIP-2929 account access cost.
#[inline]
pub const fn account_access_cost(is_cold: bool) -> u64 {
    if is_cold {
        COLD_ACCOUNT_ACCESS_COST
    } else {
        WARM_STORAGE_READ_COST
    }
}

pub fn balance<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    let address = to_address(interp.stack.pop()?);
    let account = host.load_account(address)?;
    interp.charge(account_access_cost(account.is_cold))?;
    interp.stack.push(account.data.map(|account| account.balance).unwrap_or_default())
}

pub fn selfbalance<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(LOW)?;
    let account = host.load_account(interp.contract().address)?;
    interp.stack.push(account.data.map(|account| account.balance).unwrap_or_default())
}

pub fn extcodesize<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    let address = to_address(interp.stack.pop()?);
    let code = host.load_code(address)?;
    interp.charge(account_access_cost(code.is_cold))?;
    interp.stack.push(U256::from(code.data.len()))
}

pub fn extcodecopy<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    let [address, memory_offset, code_offset, len] = interp.stack.popn()?;
    let len = as_usize(len)?;
    let code = host.load_code(to_address(address))?;
    interp.charge(account_access_cost(code.is_cold) + COPY * num_words(len as u64))?;
    if len == 0 {
        return Ok(());
    }
    let (memory_offset, _) = interp.memory_range(memory_offset, U256::from(len))?;
    interp.memory.set_data(memory_offset, code_offset.saturating_to::<usize>(), len, &code.data);
    Ok(())
}

/// Zero for accounts that do not exist or are empty (EIP-1052).
pub fn extcodehash<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    let address = to_address(interp.stack.pop()?);
    let account = host.load_account(address)?;
    interp.charge(account_access_cost(account.is_cold))?;
    let hash = match account.data {
        Some(account) if !account.is_empty() => account.code_hash,
        _ => B256::ZERO,
    };
    interp.stack.push(U256::from_be_bytes(hash.0))
}

pub fn blockhash<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(BLOCKHASH)?;
    let number = interp.stack.pop()?.saturating_to::<u64>();
    let hash = host.block_hash(number);
    interp.stack.push(U256::from_be_bytes(hash.0))
}

pub fn sload<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    let slot = interp.stack.pop()?;
    let value = host.sload(interp.contract().address, slot)?;
    interp.charge(if value.is_cold { COLD_SLOAD_COST } else { WARM_STORAGE_READ_COST })?;
    interp.stack.push(value.data)
}

/// EIP-2200 cost of an `SSTORE`, with the EIP-2929 cold surcharge.
pub fn sstore_cost(values: &SStoreResult, is_cold: bool) -> u64 {
    let SStoreResult { original, present, new } = *values;
    let cold = if is_cold { COLD_SLOAD_COST } else { 0 };
    let cost = if new == present || original != present {
        WARM_STORAGE_READ_COST
    } else if original.is_zero() {
        SSTORE_SET
    } else {
        SSTORE_RESET
    };
    cold + cost
}

/// EIP-3529 refund of an `SSTORE`. Can be negative when an earlier refund is undone.
pub fn sstore_refund(values: &SStoreResult) -> i64 {
    let SStoreResult { original, present, new } = *values;
    if new == present {
        return 0;
    }
    if original == present {
        return if !original.is_zero() && new.is_zero() { SSTORE_CLEARS_SCHEDULE } else { 0 };
    }
    let mut refund = 0;
    if !original.is_zero() {
        if present.is_zero() {
            refund -= SSTORE_CLEARS_SCHEDULE;
        } else if new.is_zero() {
            refund += SSTORE_CLEARS_SCHEDULE;
        }
    }
    if original == new {
        let restored = if original.is_zero() { SSTORE_SET } else { SSTORE_RESET };
        refund += (restored - WARM_STORAGE_READ_COST) as i64;
    }
    refund
}

pub fn sstore<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.require_non_static()?;
    if interp.gas.remaining() <= SSTORE_SENTRY {
        return Err(Control::Halt(HaltReason::OutOfGas));
    }
    let [slot, value] = interp.stack.popn()?;
    let result = host.sstore(interp.contract().address, slot, value)?;
    interp.charge(sstore_cost(&result.data, result.is_cold))?;
    interp.gas.record_refund(sstore_refund(&result.data));
    Ok(())
}

pub fn tload<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(TRANSIENT)?;
    let slot = interp.stack.pop()?;
    let value = host.tload(interp.contract().address, slot);
    interp.stack.push(value)
}

pub fn tstore<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.require_non_static()?;
    interp.charge(TRANSIENT)?;
    let [slot, value] = interp.stack.popn()?;
    host.tstore(interp.contract().address, slot, value);
    Ok(())
}

pub fn log<const N: usize, H: Host + ?Sized>(
    interp: &mut Interpreter,
    host: &mut H,
) -> Result<(), Control> {
    interp.require_non_static()?;
    let [offset, len] = interp.stack.popn()?;
    let len = as_usize(len)?;
    interp.charge(LOG + LOGTOPIC * N as u64 + LOGDATA * len as u64)?;
    let (offset, len) = interp.memory_range(offset, U256::from(len))?;
    let data = Bytes::copy_from_slice(interp.memory.slice(offset, len));
    let topics = interp.stack.popn::<N>()?.map(|topic| B256::from(topic.to_be_bytes::<32>()));
    let log = Log { address: interp.contract().address, data: LogData::new_unchecked(topics.to_vec(), data) };
    host.log(log);
    Ok(())
}

pub fn selfdestruct<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.require_non_static()?;
    let target = to_address(interp.stack.pop()?);
    let result = host.selfdestruct(interp.contract().address, target)?;
    let mut cost = SELFDESTRUCT;
    if result.is_cold {
        cost += COLD_ACCOUNT_ACCESS_COST;
    }
    if result.data.had_value && !result.data.target_exists {
        cost += NEWACCOUNT;
    }
    interp.charge(cost)?;
    Err(Control::Stop)
}
