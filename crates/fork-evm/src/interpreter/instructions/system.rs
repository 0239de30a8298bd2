use alloy_primitives::{keccak256 as keccak, U256};

use crate::{
    constants::gas::{BASE, COPY, KECCAK256, KECCAK256WORD, VERYLOW},
    interpreter::{as_usize, num_words, Control, Host, Interpreter},
    HaltReason,
};

pub fn keccak256<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    let [offset, len] = interp.stack.popn()?;
    let len = as_usize(len)?;
    interp.charge(KECCAK256 + KECCAK256WORD * num_words(len as u64))?;
    let (offset, len) = interp.memory_range(offset, U256::from(len))?;
    let hash = keccak(interp.memory.slice(offset, len));
    interp.stack.push(U256::from_be_bytes(hash.0))
}

pub fn address<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    let address = interp.contract().address;
    interp.stack.push(U256::from_be_slice(address.as_slice()))
}

pub fn caller<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    let caller = interp.contract().caller;
    interp.stack.push(U256::from_be_slice(caller.as_slice()))
}

pub fn callvalue<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    let value = interp.contract().value;
    interp.stack.push(value)
}

pub fn calldataload<H: Host + ?Sized>(
    interp: &mut Interpreter,
    _host: &mut H,
) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let start = interp.stack.pop()?.saturating_to::<usize>();
    let input = &interp.contract.input;
    let mut word = [0u8; 32];
    if start < input.len() {
        let available = (input.len() - start).min(32);
        word[..available].copy_from_slice(&input[start..start + available]);
    }
    interp.stack.push(U256::from_be_bytes(word))
}

pub fn calldatasize<H: Host + ?Sized>(
    interp: &mut Interpreter,
    _host: &mut H,
) -> Result<(), Control> {
    interp.charge(BASE)?;
    let len = interp.contract().input.len();
    interp.stack.push(U256::from(len))
}

/// Shared body of the `*COPY` instructions that read from a buffer of the frame.
fn copy_to_memory(
    interp: &mut Interpreter,
    source: impl FnOnce(&Interpreter) -> alloy_primitives::Bytes,
) -> Result<(), Control> {
    let [memory_offset, data_offset, len] = interp.stack.popn()?;
    let len = as_usize(len)?;
    interp.charge(VERYLOW + COPY * num_words(len as u64))?;
    if len == 0 {
        return Ok(());
    }
    let (memory_offset, _) = interp.memory_range(memory_offset, U256::from(len))?;
    let data = source(interp);
    interp.memory.set_data(memory_offset, data_offset.saturating_to::<usize>(), len, &data);
    Ok(())
}

pub fn calldatacopy<H: Host + ?Sized>(
    interp: &mut Interpreter,
    _host: &mut H,
) -> Result<(), Control> {
    copy_to_memory(interp, |interp| interp.contract().input.clone())
}

pub fn codesize<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    let len = interp.contract().code.len();
    interp.stack.push(U256::from(len))
}

pub fn codecopy<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    copy_to_memory(interp, |interp| interp.contract().code.clone())
}

pub fn gas<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    let remaining = interp.gas.remaining();
    interp.stack.push(U256::from(remaining))
}

pub fn returndatasize<H: Host + ?Sized>(
    interp: &mut Interpreter,
    _host: &mut H,
) -> Result<(), Control> {
    interp.charge(BASE)?;
    let len = interp.return_data.len();
    interp.stack.push(U256::from(len))
}

/// Unlike the other copies, reading past the end of the return data halts.
pub fn returndatacopy<H: Host + ?Sized>(
    interp: &mut Interpreter,
    _host: &mut H,
) -> Result<(), Control> {
    let [memory_offset, data_offset, len] = interp.stack.popn()?;
    let len = as_usize(len)?;
    interp.charge(VERYLOW + COPY * num_words(len as u64))?;
    let data_offset = data_offset.saturating_to::<usize>();
    if data_offset.saturating_add(len) > interp.return_data.len() {
        return Err(Control::Halt(HaltReason::ReturnDataOutOfBounds));
    }
    if len == 0 {
        return Ok(());
    }
    let (memory_offset, _) = interp.memory_range(memory_offset, U256::from(len))?;
    let data = interp.return_data.clone();
    interp.memory.set(memory_offset, &data[data_offset..data_offset + len]);
    Ok(())
}
