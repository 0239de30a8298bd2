//! Two's complement helpers for the signed opcodes.

use core::cmp::Ordering;

use alloy_primitives::U256;

/// The sign of a 256-bit two's complement word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Sign {
    /// Negative.
    Minus = -1,
    /// Zero.
    Zero = 0,
    /// Positive.
    Plus = 1,
}

/// Returns the sign of `value`.
#[inline]
pub fn sign(value: &U256) -> Sign {
    if value.bit(255) {
        Sign::Minus
    } else if value.is_zero() {
        Sign::Zero
    } else {
        Sign::Plus
    }
}

#[inline]
fn two_compl(value: U256) -> U256 {
    value.wrapping_neg()
}

/// Splits `value` into its sign and absolute value.
#[inline]
fn abs(value: U256) -> (Sign, U256) {
    match sign(&value) {
        Sign::Minus => (Sign::Minus, two_compl(value)),
        sign => (sign, value),
    }
}

/// Signed comparison.
pub fn i256_cmp(first: &U256, second: &U256) -> Ordering {
    let (first_sign, second_sign) = (sign(first), sign(second));
    match first_sign.cmp(&second_sign) {
        Ordering::Equal => first.cmp(second),
        ordering => ordering,
    }
}

/// Signed division, truncating towards zero. Division by zero yields zero and
/// `MIN / -1` overflows to `MIN`.
pub fn i256_div(first: U256, second: U256) -> U256 {
    if second.is_zero() {
        return U256::ZERO;
    }
    let (first_sign, first) = abs(first);
    let (second_sign, second) = abs(second);
    let quotient = first / second;
    if (first_sign == Sign::Minus) != (second_sign == Sign::Minus) {
        two_compl(quotient)
    } else {
        quotient
    }
}

/// Signed remainder, taking the sign of the dividend. Modulo zero yields zero.
pub fn i256_mod(first: U256, second: U256) -> U256 {
    if second.is_zero() {
        return U256::ZERO;
    }
    let (first_sign, first) = abs(first);
    let (_, second) = abs(second);
    let remainder = first % second;
    if first_sign == Sign::Minus {
        two_compl(remainder)
    } else {
        remainder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN_NEGATIVE: U256 = U256::from_limbs([0, 0, 0, 0x8000_0000_0000_0000]);

    fn neg(value: u64) -> U256 {
        two_compl(U256::from(value))
    }

    #[test]
    fn test_div_truncates_towards_zero() {
        assert_eq!(i256_div(neg(7), U256::from(2)), neg(3));
        assert_eq!(i256_div(U256::from(7), neg(2)), neg(3));
        assert_eq!(i256_div(neg(7), neg(2)), U256::from(3));
        assert_eq!(i256_div(MIN_NEGATIVE, U256::MAX), MIN_NEGATIVE);
        assert_eq!(i256_div(U256::from(1), U256::ZERO), U256::ZERO);
    }

    #[test]
    fn test_mod_takes_dividend_sign() {
        assert_eq!(i256_mod(neg(7), U256::from(3)), neg(1));
        assert_eq!(i256_mod(U256::from(7), neg(3)), U256::from(1));
    }

    #[test]
    fn test_cmp() {
        assert_eq!(i256_cmp(&neg(1), &U256::from(1)), Ordering::Less);
        assert_eq!(i256_cmp(&neg(1), &neg(2)), Ordering::Greater);
        assert_eq!(i256_cmp(&U256::ZERO, &U256::ZERO), Ordering::Equal);
    }
}
