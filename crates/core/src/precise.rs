//! Precise units - 18-decimal fixed-point arithmetic on `Decimal`
//!
//! Quantities, position units, rates and percentages are all carried as
//! `Decimal` values with at most 18 fractional digits. Products and
//! quotients are computed exactly on big integers and rounded once back to
//! 18 places with an explicit direction:
//!
//! - `precise_*`: toward zero (floor for non-negative values)
//! - `precise_*_ceil`: toward positive infinity
//! - `conservative_precise_*`: toward negative infinity, so a signed unit is
//!   never rounded in the holder's favour
//!
//! A result that does not fit a `Decimal` at 18 places is `MathError::Overflow`.

use num_bigint::{BigInt, Sign};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Number of fractional digits carried by a precise unit
pub const PRECISION: u32 = 18;

/// Smallest representable precise quantity (1e-18)
pub const MIN_UNIT: Decimal = Decimal::from_parts(1, 0, 0, false, 18);

/// Errors raised by fixed-point arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("Division by zero")]
    DivisionByZero,
}

pub type MathResult = Result<Decimal, MathError>;

#[derive(Debug, Clone, Copy)]
enum Rounding {
    ToZero,
    Up,
    Down,
}

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

fn mantissa(value: Decimal) -> BigInt {
    BigInt::from(value.mantissa())
}

/// `num / den` as a Decimal with 18 places, rounded once
fn quotient(num: BigInt, den: BigInt, rounding: Rounding, op: &'static str) -> MathResult {
    if den.sign() == Sign::NoSign {
        return Err(MathError::DivisionByZero);
    }
    let negative = (num.sign() == Sign::Minus) != (den.sign() == Sign::Minus);
    let mut q = &num / &den;
    if (&num % &den).sign() != Sign::NoSign {
        match rounding {
            Rounding::Up if !negative => q += 1u32,
            Rounding::Down if negative => q -= 1u32,
            _ => {}
        }
    }
    let q = i128::try_from(&q).map_err(|_| MathError::Overflow(op))?;
    Decimal::try_from_i128_with_scale(q, PRECISION)
        .map(|d| d.normalize())
        .map_err(|_| MathError::Overflow(op))
}

fn mul(a: Decimal, b: Decimal, rounding: Rounding) -> MathResult {
    let num = mantissa(a) * mantissa(b) * pow10(PRECISION);
    quotient(num, pow10(a.scale() + b.scale()), rounding, "mul")
}

fn div(a: Decimal, b: Decimal, rounding: Rounding) -> MathResult {
    let num = mantissa(a) * pow10(b.scale() + PRECISION);
    quotient(num, mantissa(b) * pow10(a.scale()), rounding, "div")
}

/// `a * b`, rounded toward zero
pub fn precise_mul(a: Decimal, b: Decimal) -> MathResult {
    mul(a, b, Rounding::ToZero)
}

/// `a * b`, rounded toward positive infinity
pub fn precise_mul_ceil(a: Decimal, b: Decimal) -> MathResult {
    mul(a, b, Rounding::Up)
}

/// `a / b`, rounded toward zero
pub fn precise_div(a: Decimal, b: Decimal) -> MathResult {
    div(a, b, Rounding::ToZero)
}

/// `a / b`, rounded toward positive infinity
pub fn precise_div_ceil(a: Decimal, b: Decimal) -> MathResult {
    div(a, b, Rounding::Up)
}

/// `a * b`, rounded toward negative infinity
pub fn conservative_precise_mul(a: Decimal, b: Decimal) -> MathResult {
    mul(a, b, Rounding::Down)
}

/// `a / b`, rounded toward negative infinity
pub fn conservative_precise_div(a: Decimal, b: Decimal) -> MathResult {
    div(a, b, Rounding::Down)
}

/// `a * b / c` with a single rounding step toward negative infinity
pub fn mul_div_down(a: Decimal, b: Decimal, c: Decimal) -> MathResult {
    let num = mantissa(a) * mantissa(b) * pow10(c.scale() + PRECISION);
    let den = mantissa(c) * pow10(a.scale() + b.scale());
    quotient(num, den, Rounding::Down, "mul_div")
}

/// Truncate an externally supplied value to 18 fractional digits
pub fn to_precise(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRECISION, RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_mul_exact() {
        assert_eq!(precise_mul(dec!(1.5), dec!(2)).unwrap(), dec!(3));
        assert_eq!(precise_mul_ceil(dec!(1.5), dec!(2)).unwrap(), dec!(3));
    }

    #[test]
    fn test_div_rounding_directions() {
        assert_eq!(precise_div(dec!(1), dec!(3)).unwrap(), dec!(0.333333333333333333));
        assert_eq!(precise_div_ceil(dec!(1), dec!(3)).unwrap(), dec!(0.333333333333333334));
    }

    #[test]
    fn test_conservative_rounds_negative_down() {
        assert_eq!(precise_div(dec!(-1), dec!(3)).unwrap(), dec!(-0.333333333333333333));
        assert_eq!(
            conservative_precise_div(dec!(-1), dec!(3)).unwrap(),
            dec!(-0.333333333333333334)
        );
        assert_eq!(
            conservative_precise_mul(dec!(-0.000000000000000001), dec!(0.5)).unwrap(),
            dec!(-0.000000000000000001)
        );
    }

    #[test]
    fn test_mul_ceil_on_sub_unit_product() {
        // 1e-18 * 0.5 = 5e-19, which floors to 0 and ceils to 1e-18
        assert_eq!(precise_mul(MIN_UNIT, dec!(0.5)).unwrap(), Decimal::ZERO);
        assert_eq!(precise_mul_ceil(MIN_UNIT, dec!(0.5)).unwrap(), MIN_UNIT);
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(precise_div(dec!(1), Decimal::ZERO), Err(MathError::DivisionByZero));
        assert_eq!(
            mul_div_down(dec!(1), dec!(1), Decimal::ZERO),
            Err(MathError::DivisionByZero)
        );
    }

    #[test]
    fn test_mul_div_down() {
        // 1 * 100 / 102 = 0.98039215686274509803...
        assert_eq!(
            mul_div_down(dec!(1), dec!(100), dec!(102)).unwrap(),
            dec!(0.980392156862745098)
        );
    }

    #[test]
    fn test_rounding_holds_past_28_significant_digits() {
        // Exact product is 12345.000000000000012346000000000000000001
        let a = dec!(1.000000000000000001);
        let b = dec!(12345.000000000000000001);
        assert_eq!(precise_mul_ceil(a, b).unwrap(), dec!(12345.000000000000012347));
        assert_eq!(precise_mul(a, b).unwrap(), dec!(12345.000000000000012346));

        // Exact product is 12344.999999999999987655999999999999999999
        let a = dec!(0.999999999999999999);
        assert_eq!(precise_mul(a, b).unwrap(), dec!(12344.999999999999987655));
        assert_eq!(precise_mul_ceil(a, b).unwrap(), dec!(12344.999999999999987656));

        assert_eq!(
            precise_mul_ceil(dec!(1.000000000000000001), dec!(1000000000.000000000000000001))
                .unwrap(),
            dec!(1000000000.000000001000000002)
        );
        assert_eq!(
            conservative_precise_mul(dec!(-1.000000000000000001), dec!(12345.000000000000000001))
                .unwrap(),
            dec!(-12345.000000000000012347)
        );
    }

    #[test]
    fn test_mul_div_down_is_exact_on_long_products() {
        // 1.000000000000000001 * 12345.000000000000000001 / 3, floored once
        assert_eq!(
            mul_div_down(dec!(1.000000000000000001), dec!(12345.000000000000000001), dec!(3))
                .unwrap(),
            dec!(4115.000000000000004115)
        );
    }

    #[test]
    fn test_result_out_of_range_overflows() {
        let big = dec!(100000000000000000000);
        assert_eq!(precise_mul(big, big), Err(MathError::Overflow("mul")));
        assert_eq!(precise_div(big, MIN_UNIT), Err(MathError::Overflow("div")));
    }

    #[test]
    fn test_to_precise_truncates() {
        assert_eq!(to_precise(dec!(0.1234567890123456789)), dec!(0.123456789012345678));
    }
}
