use alloy_primitives::U256;

use crate::{
    constants::gas::{BASE, COPY, VERYLOW},
    interpreter::{as_usize, num_words, Control, Host, Interpreter},
};

pub fn mload<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let offset = interp.stack.pop()?;
    let (offset, _) = interp.memory_range(offset, U256::from(32))?;
    let word = U256::from_be_slice(interp.memory.slice(offset, 32));
    interp.stack.push(word)
}

pub fn mstore<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let [offset, value] = interp.stack.popn()?;
    let (offset, _) = interp.memory_range(offset, U256::from(32))?;
    interp.memory.set(offset, &value.to_be_bytes::<32>());
    Ok(())
}

pub fn mstore8<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let [offset, value] = interp.stack.popn()?;
    let (offset, _) = interp.memory_range(offset, U256::from(1))?;
    interp.memory.set(offset, &[value.byte(0)]);
    Ok(())
}

pub fn msize<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(U256::from(interp.memory.len()))
}

/// `MCOPY` (EIP-5656).
pub fn mcopy<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    let [dst, src, len] = interp.stack.popn()?;
    let len = as_usize(len)?;
    interp.charge(VERYLOW + COPY * num_words(len as u64))?;
    if len == 0 {
        return Ok(());
    }
    let (dst, src) = (as_usize(dst)?, as_usize(src)?);
    interp.memory_range(U256::from(dst.max(src)), U256::from(len))?;
    interp.memory.copy(dst, src, len);
    Ok(())
}
