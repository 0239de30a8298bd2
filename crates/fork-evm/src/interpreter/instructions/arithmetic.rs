use alloy_primitives::U256;

use super::i256::{i256_div, i256_mod};
use crate::{
    constants::gas::{EXP, EXP_BYTE, LOW, MID, VERYLOW},
    interpreter::{Control, Host, Interpreter},
};

pub fn add<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let a = interp.stack.pop()?;
    let b = interp.stack.top_mut()?;
    *b = a.wrapping_add(*b);
    Ok(())
}

pub fn mul<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(LOW)?;
    let a = interp.stack.pop()?;
    let b = interp.stack.top_mut()?;
    *b = a.wrapping_mul(*b);
    Ok(())
}

pub fn sub<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let a = interp.stack.pop()?;
    let b = interp.stack.top_mut()?;
    *b = a.wrapping_sub(*b);
    Ok(())
}

pub fn div<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(LOW)?;
    let a = interp.stack.pop()?;
    let b = interp.stack.top_mut()?;
    *b = a.checked_div(*b).unwrap_or_default();
    Ok(())
}

pub fn sdiv<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(LOW)?;
    let a = interp.stack.pop()?;
    let b = interp.stack.top_mut()?;
    *b = i256_div(a, *b);
    Ok(())
}

pub fn rem<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(LOW)?;
    let a = interp.stack.pop()?;
    let b = interp.stack.top_mut()?;
    *b = a.checked_rem(*b).unwrap_or_default();
    Ok(())
}

pub fn smod<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(LOW)?;
    let a = interp.stack.pop()?;
    let b = interp.stack.top_mut()?;
    *b = i256_mod(a, *b);
    Ok(())
}

pub fn addmod<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(MID)?;
    let [a, b] = interp.stack.popn()?;
    let n = interp.stack.top_mut()?;
    *n = a.add_mod(b, *n);
    Ok(())
}

pub fn mulmod<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(MID)?;
    let [a, b] = interp.stack.popn()?;
    let n = interp.stack.top_mut()?;
    *n = a.mul_mod(b, *n);
    Ok(())
}

pub fn exp<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    let [base, exponent] = interp.stack.popn()?;
    let exponent_bytes = (exponent.bit_len() as u64).div_ceil(8);
    interp.charge(EXP + EXP_BYTE * exponent_bytes)?;
    interp.stack.push(base.wrapping_pow(exponent))
}

/// Extends the sign of the `b`-th byte (counted from the least significant) of `x`.
pub fn signextend<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(LOW)?;
    let b = interp.stack.pop()?;
    let x = interp.stack.top_mut()?;
    if b < U256::from(31) {
        let bit = b.to::<usize>() * 8 + 7;
        let mask = (U256::from(1) << bit) - U256::from(1);
        *x = if x.bit(bit) { *x | !mask } else { *x & mask };
    }
    Ok(())
}
