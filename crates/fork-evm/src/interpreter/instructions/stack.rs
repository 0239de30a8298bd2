use alloy_primitives::U256;

use crate::{
    constants::gas::{BASE, VERYLOW},
    interpreter::{Control, Host, Interpreter},
};

pub fn pop<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.pop().map(drop)
}

pub fn push0<H: Host + ?Sized>(interp: &mut Interpreter, _host: &mut H) -> Result<(), Control> {
    interp.charge(BASE)?;
    interp.stack.push(U256::ZERO)
}

pub fn push<const N: usize, H: Host + ?Sized>(
    interp: &mut Interpreter,
    _host: &mut H,
) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    let bytes = interp.read_immediate::<N>();
    interp.stack.push(U256::from_be_slice(&bytes))
}

pub fn dup<const N: usize, H: Host + ?Sized>(
    interp: &mut Interpreter,
    _host: &mut H,
) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    interp.stack.dup(N)
}

pub fn swap<const N: usize, H: Host + ?Sized>(
    interp: &mut Interpreter,
    _host: &mut H,
) -> Result<(), Control> {
    interp.charge(VERYLOW)?;
    interp.stack.swap(N)
}
