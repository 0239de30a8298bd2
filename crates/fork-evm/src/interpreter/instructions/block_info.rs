//! Block and transaction environment opcodes.

use alloy_primitives::U256;

use crate::{
    constants::gas::{BASE, VERYLOW},
    interpreter::{Control, Host, Interpreter},
};

pub fn origin<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(U256::from_be_slice(host.tx().origin.as_slice()))
}

pub fn gasprice<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(host.tx().gas_price)
}

pub fn coinbase<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(U256::from_be_slice(host.block().coinbase.as_slice()))
}

pub fn timestamp<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(U256::from(host.block().timestamp))
}

pub fn number<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(U256::from(host.block().number))
}

/// `DIFFICULTY` reads `PREVRANDAO` since the merge.
pub fn prevrandao<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(U256::from_be_bytes(host.block().prevrandao.0))
}

pub fn gaslimit<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(U256::from(host.block().gas_limit))
}

pub fn chainid<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(U256::from(host.chain_id()))
}

pub fn basefee<H: Host + ?Sized>(interp: &mut Interpreter, host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(U256::from(host.block().basefee))
}

/// Transactions carry no blobs: every index reads zero.
pub fn blobhash<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    *interp.stack.top_mut()? = U256::ZERO;
    Ok(())
}

pub fn blobbasefee<H: Host + ?Sized>(
    interp: &mut Interpreter,
    _host: &mut H,
) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(U256::ZERO)
}
