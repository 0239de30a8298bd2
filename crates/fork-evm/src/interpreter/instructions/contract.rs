//! The `CALL` and `CREATE` families.

use alloy_primitives::{Bytes, U256};

use super::host::account_access_cost;
use crate::{
    constants::gas::{CALLVALUE, CALL_STIPEND, CREATE, INITCODE_WORD_COST, KECCAK256WORD, NEWACCOUNT},
    interpreter::{
        as_usize, num_words, to_address, CallInputs, CallScheme, Control, CreateInputs,
        CreateOutcome, CreateScheme, Host, Interpreter, InterpreterResult, Outcome,
    },
    HaltReason,
};

/// The gas a frame may forward after keeping back 1/64 (EIP-150).
#[inline]
pub const fn all_but_one_64th(gas: u64) -> u64 {
    gas - gas / 64
}

fn call_inner<H: Host + ?Sized>(
    interp: &mut Interpreter,
    host: &mut H,
    scheme: CallScheme,
) -> Result<(), Control> {
    let requested_gas = interp.stack.pop()?;
    let to = to_address(interp.stack.pop()?);
    let value = match scheme {
        CallScheme::Call | CallScheme::CallCode => interp.stack.pop()?,
        CallScheme::DelegateCall | CallScheme::StaticCall => U256::ZERO,
    };
    let transfers_value = !value.is_zero();
    if scheme == CallScheme::Call && transfers_value {
        interp.require_non_static()?;
    }
    let [in_offset, in_len, out_offset, out_len] = interp.stack.popn()?;
    let (in_offset, in_len) = interp.memory_range(in_offset, in_len)?;
    let (out_offset, out_len) = interp.memory_range(out_offset, out_len)?;
    let input = Bytes::copy_from_slice(interp.memory.slice(in_offset, in_len));

    let account = host.load_account(to)?;
    let mut cost = account_access_cost(account.is_cold);
    if transfers_value {
        cost += CALLVALUE;
        if scheme == CallScheme::Call && account.data.is_none_or(|account| account.is_empty()) {
            cost += NEWACCOUNT;
        }
    }
    interp.charge(cost)?;

    let mut gas_limit =
        requested_gas.saturating_to::<u64>().min(all_but_one_64th(interp.gas.remaining()));
    interp.charge(gas_limit)?;
    if transfers_value {
        gas_limit += CALL_STIPEND;
    }

    let contract = interp.contract();
    let inputs = match scheme {
        CallScheme::Call => CallInputs {
            scheme,
            caller: contract.address,
            target_address: to,
            bytecode_address: to,
            value,
            transfer: true,
            input,
            gas_limit,
            is_static: interp.is_static(),
        },
        CallScheme::CallCode => CallInputs {
            scheme,
            caller: contract.address,
            target_address: contract.address,
            bytecode_address: to,
            value,
            transfer: true,
            input,
            gas_limit,
            is_static: interp.is_static(),
        },
        CallScheme::DelegateCall => CallInputs {
            scheme,
            caller: contract.caller,
            target_address: contract.address,
            bytecode_address: to,
            value: contract.value,
            transfer: false,
            input,
            gas_limit,
            is_static: interp.is_static(),
        },
        CallScheme::StaticCall => CallInputs {
            scheme,
            caller: contract.address,
            target_address: to,
            bytecode_address: to,
            value: U256::ZERO,
            transfer: false,
            input,
            gas_limit,
            is_static: true,
        },
    };

    Err(interp.suspend_call(inputs, (out_offset, out_len)))
}

/// Resumes a frame suspended on a message call with the call's result.
pub(crate) fn call_return(
    interp: &mut Interpreter,
    result: InterpreterResult,
) -> Result<(), Control> {
    interp.gas.erase_cost(result.gas.remaining());
    let success = result.outcome.is_success();
    if success {
        interp.gas.record_refund(result.gas.refunded());
    }
    let (out_offset, out_len) = interp.return_range();
    let copied = out_len.min(result.output.len());
    interp.memory.set(out_offset, &result.output[..copied]);
    interp.return_data = result.output;
    interp.stack.push(U256::from(success))
}

pub fn call<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    call_inner(interp, host, CallScheme::Call)
}

pub fn call_code<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    call_inner(interp, host, CallScheme::CallCode)
}

pub fn delegate_call<H: Host + ?Sized>(
    interp: &mut Interpreter,
    host: &mut H,
) -> Result<(), Control> {
    call_inner(interp, host, CallScheme::DelegateCall)
}

pub fn static_call<H: Host + ?Sized>(
    interp: &mut Interpreter,
    host: &mut H,
) -> Result<(), Control> {
    call_inner(interp, host, CallScheme::StaticCall)
}

pub fn create<const IS_CREATE2: bool, H: Host + ?Sized>(
    interp: &mut Interpreter,
    host: &mut H,
) -> Result<(), Control> {
    interp.require_non_static()?;
    let [value, offset, len] = interp.stack.popn()?;
    let scheme = if IS_CREATE2 {
        CreateScheme::Create2 { salt: interp.stack.pop()? }
    } else {
        CreateScheme::Create
    };

    let len = as_usize(len)?;
    if len > host.config().max_initcode_size {
        return Err(Control::Halt(HaltReason::InitcodeSizeLimit));
    }
    let words = num_words(len as u64);
    let mut cost = CREATE + INITCODE_WORD_COST * words;
    if IS_CREATE2 {
        cost += KECCAK256WORD * words;
    }
    interp.charge(cost)?;
    let (offset, len) = interp.memory_range(offset, U256::from(len))?;
    let init_code = Bytes::copy_from_slice(interp.memory.slice(offset, len));

    let gas_limit = all_but_one_64th(interp.gas.remaining());
    interp.charge(gas_limit)?;

    let inputs =
        CreateInputs { caller: interp.contract().address, scheme, value, init_code, gas_limit };
    Err(Control::Create(Box::new(inputs)))
}

/// Resumes a frame suspended on a creation with its outcome.
pub(crate) fn create_return(
    interp: &mut Interpreter,
    outcome: CreateOutcome,
) -> Result<(), Control> {
    interp.gas.erase_cost(outcome.result.gas.remaining());
    let created = match outcome.result.outcome {
        Outcome::Success => {
            interp.gas.record_refund(outcome.result.gas.refunded());
            interp.return_data = Bytes::new();
            outcome.address
        }
        Outcome::Revert => {
            interp.return_data = outcome.result.output;
            None
        }
        Outcome::Halt(_) => {
            interp.return_data = Bytes::new();
            None
        }
    };
    let word = created.map(|address| U256::from_be_slice(address.as_slice())).unwrap_or_default();
    interp.stack.push(word)
}
