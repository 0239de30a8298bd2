use alloy_primitives::{Bytes, U256};
use revm_bytecode::opcode::INVALID;

use crate::{
    constants::gas::{BASE, HIGH, JUMPDEST, MID},
    interpreter::{Control, Host, Interpreter},
    HaltReason,
};

pub fn stop<H: Host + ?Sized>(_interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    Err(Control::Stop)
}

pub fn jump<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(MID)?;
    let target = interp.stack.pop()?;
    interp.jump(target)
}

pub fn jumpi<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(HIGH)?;
    let [target, condition] = interp.stack.popn()?;
    if condition.is_zero() {
        return Ok(());
    }
    interp.jump(target)
}

pub fn jumpdest<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(JUMPDEST)
}

pub fn pc<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    // the counter already points past this instruction
    interp.stack.push(U256::from(interp.pc() - 1))
}

fn output(interp: &mut Interpreter) -> Result<Bytes, Control> {
    let [offset, len] = interp.stack.popn()?;
    let (offset, len) = interp.memory_range(offset, len)?;
    Ok(Bytes::copy_from_slice(interp.memory.slice(offset, len)))
}

pub fn ret<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    Err(Control::Return(output(interp)?))
}

pub fn revert<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    Err(Control::Revert(output(interp)?))
}

/// The designated invalid instruction.
pub fn invalid<H: Host + ?Sized>(_interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    Err(Control::Halt(HaltReason::InvalidOpcode(INVALID)))
}

/// Any unassigned opcode.
pub fn unknown<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    let opcode = interp.contract().code.get(interp.pc() - 1).copied().unwrap_or(INVALID);
    Err(Control::Halt(HaltReason::InvalidOpcode(opcode)))
}
