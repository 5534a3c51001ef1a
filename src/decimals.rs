//! Decimals
//!
//! Exact decimal helpers shared by the pricing code. Monetary arithmetic always stays in
//! [`Decimal`]; floats only appear at reporting boundaries.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fractional digits used for monetary amounts unless configured otherwise.
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Errors raised while reading or converting decimal values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecimalError {
    /// The text was not a decimal number.
    #[error("invalid decimal literal: {0:?}")]
    Parse(String),

    /// The value does not fit in the minor units of the target currency.
    #[error("{0} cannot be represented in minor currency units")]
    Overflow(Decimal),

    /// An intermediate amount does not fit in a [`Decimal`].
    #[error("{operation} of {lhs} and {rhs} overflows")]
    ArithmeticOverflow {
        /// Operation that overflowed
        operation: &'static str,
        /// Left operand
        lhs: Decimal,
        /// Right operand
        rhs: Decimal,
    },
}

/// Midpoint rounding mode for monetary amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rounding {
    /// Round midpoints away from zero (`0.125` becomes `0.13`).
    #[default]
    HalfAwayFromZero,

    /// Round midpoints to the nearest even digit (`0.125` becomes `0.12`).
    Bankers,
}

impl Rounding {
    const fn strategy(self) -> RoundingStrategy {
        match self {
            Rounding::HalfAwayFromZero => RoundingStrategy::MidpointAwayFromZero,
            Rounding::Bankers => RoundingStrategy::MidpointNearestEven,
        }
    }
}

/// Rounding policy applied to every monetary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PricingConfig {
    /// Number of fractional digits kept on monetary outputs.
    pub decimal_places: u32,

    /// How midpoints are resolved.
    pub rounding: Rounding,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            decimal_places: MONEY_DECIMAL_PLACES,
            rounding: Rounding::HalfAwayFromZero,
        }
    }
}

impl PricingConfig {
    /// Round a value according to this policy.
    pub fn round(self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.decimal_places, self.rounding.strategy())
    }

    /// Divide `numerator` by `denominator` and round the quotient.
    ///
    /// Returns `None` when the denominator is zero or the quotient overflows.
    pub fn quotient(self, numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
        numerator.checked_div(denominator).map(|q| self.round(q))
    }
}

/// Parse a decimal literal such as `"10.00"` or `"-1.5"`.
///
/// # Errors
///
/// Returns [`DecimalError::Parse`] if the text is not a decimal number.
pub fn parse_decimal(text: &str) -> Result<Decimal, DecimalError> {
    text.trim()
        .parse::<Decimal>()
        .map_err(|_err| DecimalError::Parse(text.to_string()))
}

/// Multiply two amounts without panicking.
///
/// # Errors
///
/// Returns [`DecimalError::ArithmeticOverflow`] if the product does not fit in a [`Decimal`].
pub fn checked_product(lhs: Decimal, rhs: Decimal) -> Result<Decimal, DecimalError> {
    lhs.checked_mul(rhs)
        .ok_or(DecimalError::ArithmeticOverflow {
            operation: "product",
            lhs,
            rhs,
        })
}

/// Subtract `rhs` from `lhs` without panicking.
///
/// # Errors
///
/// Returns [`DecimalError::ArithmeticOverflow`] if the difference does not fit in a [`Decimal`].
pub fn checked_difference(lhs: Decimal, rhs: Decimal) -> Result<Decimal, DecimalError> {
    lhs.checked_sub(rhs)
        .ok_or(DecimalError::ArithmeticOverflow {
            operation: "difference",
            lhs,
            rhs,
        })
}

/// Add up amounts without panicking.
///
/// # Errors
///
/// Returns [`DecimalError::ArithmeticOverflow`] at the first partial sum that does not fit.
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal, DecimalError> {
    amounts.into_iter().try_fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount)
            .ok_or(DecimalError::ArithmeticOverflow {
                operation: "sum",
                lhs: acc,
                rhs: amount,
            })
    })
}

/// Lossy conversion for reporting. Never feed the result back into pricing.
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Convert a decimal amount into money of the given currency, rounding to its minor unit.
///
/// # Errors
///
/// Returns [`DecimalError::Overflow`] if the amount does not fit in `i64` minor units.
pub fn to_money(
    value: Decimal,
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, DecimalError> {
    let factor = Decimal::from(10_u64.pow(currency.exponent));

    let minor = value
        .checked_mul(factor)
        .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|scaled| scaled.to_i64())
        .ok_or(DecimalError::Overflow(value))?;

    Ok(Money::from_minor(minor, currency))
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, JPY};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parse_decimal_accepts_signed_literals() -> TestResult {
        assert_eq!(parse_decimal("10.00")?, Decimal::new(1000, 2));
        assert_eq!(parse_decimal(" -1.5 ")?, Decimal::new(-15, 1));

        Ok(())
    }

    #[test]
    fn parse_decimal_rejects_garbage() {
        assert_eq!(
            parse_decimal("ten"),
            Err(DecimalError::Parse("ten".to_string()))
        );
        assert!(matches!(parse_decimal(""), Err(DecimalError::Parse(_))));
    }

    #[test]
    fn default_rounding_is_half_away_from_zero() {
        let config = PricingConfig::default();

        assert_eq!(config.round(Decimal::new(125, 3)), Decimal::new(13, 2));
        assert_eq!(config.round(Decimal::new(-125, 3)), Decimal::new(-13, 2));
    }

    #[test]
    fn bankers_rounding_prefers_even_digit() {
        let config = PricingConfig {
            rounding: Rounding::Bankers,
            ..PricingConfig::default()
        };

        assert_eq!(config.round(Decimal::new(125, 3)), Decimal::new(12, 2));
        assert_eq!(config.round(Decimal::new(135, 3)), Decimal::new(14, 2));
    }

    #[test]
    fn quotient_rounds_and_guards_zero() {
        let config = PricingConfig::default();

        assert_eq!(
            config.quotient(Decimal::new(1067, 2), Decimal::TEN),
            Some(Decimal::new(107, 2))
        );
        assert_eq!(config.quotient(Decimal::ONE, Decimal::ZERO), None);
    }

    #[test]
    fn to_money_uses_currency_exponent() -> TestResult {
        assert_eq!(
            to_money(Decimal::new(10675, 3), GBP)?,
            Money::from_minor(1068, GBP)
        );
        assert_eq!(to_money(Decimal::new(105, 1), JPY)?, Money::from_minor(11, JPY));

        Ok(())
    }

    #[test]
    fn to_money_reports_overflow() {
        assert!(matches!(
            to_money(Decimal::MAX, GBP),
            Err(DecimalError::Overflow(_))
        ));
    }

    #[test]
    fn checked_arithmetic_reports_overflow() -> TestResult {
        assert_eq!(checked_product(Decimal::TEN, Decimal::new(25, 1))?, Decimal::from(25));
        assert_eq!(checked_difference(Decimal::ONE, Decimal::TEN)?, Decimal::from(-9));
        assert_eq!(checked_sum([Decimal::ONE, Decimal::TWO])?, Decimal::from(3));

        assert_eq!(
            checked_product(Decimal::MAX, Decimal::TWO),
            Err(DecimalError::ArithmeticOverflow {
                operation: "product",
                lhs: Decimal::MAX,
                rhs: Decimal::TWO,
            })
        );
        assert!(matches!(
            checked_difference(Decimal::MIN, Decimal::ONE),
            Err(DecimalError::ArithmeticOverflow { operation: "difference", .. })
        ));
        assert!(matches!(
            checked_sum([Decimal::MAX, Decimal::ONE]),
            Err(DecimalError::ArithmeticOverflow { operation: "sum", .. })
        ));

        Ok(())
    }

    #[test]
    fn to_f64_is_close_to_decimal() {
        let value = to_f64(Decimal::new(1067, 2));

        assert!((value - 10.67).abs() < 1e-9);
    }
}
