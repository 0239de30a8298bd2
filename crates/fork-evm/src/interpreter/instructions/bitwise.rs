use core::cmp::Ordering;

use alloy_primitives::U256;

use super::i256::{i256_cmp, sign, Sign};
use crate::{
    constants::gas::VERYLOW,
    interpreter::{Control, Host, Interpreter},
};

fn compare(
    interp: &mut Interpreter,
    op: impl FnOnce(&U256, &U256) -> bool,
) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let a = interp.stack.pop()?;
    let b = interp.stack.top_mut()?;
    *b = U256::from(op(&a, b));
    Ok(())
}

pub fn lt<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    compare(interp, |a, b| a < b)
}

pub fn gt<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    compare(interp, |a, b| a > b)
}

pub fn slt<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    compare(interp, |a, b| i256_cmp(a, b) == Ordering::Less)
}

pub fn sgt<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    compare(interp, |a, b| i256_cmp(a, b) == Ordering::Greater)
}

pub fn eq<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    compare(interp, |a, b| a == b)
}

pub fn iszero<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let a = interp.stack.top_mut()?;
    *a = U256::from(a.is_zero());
    Ok(())
}

pub fn bitand<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let a = interp.stack.pop()?;
    let b = interp.stack.top_mut()?;
    *b &= a;
    Ok(())
}

pub fn bitor<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let a = interp.stack.pop()?;
    let b = interp.stack.top_mut()?;
    *b |= a;
    Ok(())
}

pub fn bitxor<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let a = interp.stack.pop()?;
    let b = interp.stack.top_mut()?;
    *b ^= a;
    Ok(())
}

pub fn not<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let a = interp.stack.top_mut()?;
    *a = !*a;
    Ok(())
}

/// The `i`-th byte of `x`, counted from the most significant.
pub fn byte<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let i = interp.stack.pop()?;
    let x = interp.stack.top_mut()?;
    *x = if i < U256::from(32) { U256::from(x.byte(31 - i.to::<usize>())) } else { U256::ZERO };
    Ok(())
}

pub fn shl<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let shift = interp.stack.pop()?;
    let value = interp.stack.top_mut()?;
    *value = if shift < U256::from(256) { *value << shift.to::<usize>() } else { U256::ZERO };
    Ok(())
}

pub fn shr<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let shift = interp.stack.pop()?;
    let value = interp.stack.top_mut()?;
    *value = if shift < U256::from(256) { *value >> shift.to::<usize>() } else { U256::ZERO };
    Ok(())
}

pub fn sar<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let shift = interp.stack.pop()?;
    let value = interp.stack.top_mut()?;
    let negative = sign(value) == Sign::Minus;
    *value = if shift < U256::from(256) {
        value.arithmetic_shr(shift.to::<usize>())
    } else if negative {
        U256::MAX
    } else {
        U256::ZERO
    };
    Ok(())
}
